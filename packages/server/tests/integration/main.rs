mod common;
mod projects;
