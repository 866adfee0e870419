use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use common::Stores;
use console::style;
use dialoguer::Confirm;
use studio::{ProjectManifest, ProjectMetadata, Studio};
use tracing::Level;

mod args;
mod config;

use args::{Cli, Commands};
use config::CliConfig;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let config = CliConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let stores = Stores::open(&config.storage)
        .await
        .with_context(|| format!("Failed to open storage at {}", config.storage.data_dir.display()))?;
    let studio = Studio::new(stores, config.autosave);
    let user = cli.user.as_str();

    match cli.command {
        Commands::List { all } => handle_list(&studio, user, all),
        Commands::Create { title } => handle_create(&studio, user, title),
        Commands::Show { id } => handle_show(&studio, user, &id).await,
        Commands::Delete { id } => handle_delete(&studio, user, &id).await,
        Commands::DeleteAll { yes } => handle_delete_all(&studio, user, yes).await,
        Commands::Export { id, output } => handle_export(&studio, user, &id, output.as_deref()).await,
        Commands::Import { file } => handle_import(&studio, user, &file).await,
        Commands::Reset { yes } => handle_reset(&studio, yes).await,
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn print_project(project: &ProjectMetadata, show_owner: bool) {
    let owner = match (&project.owner_id, show_owner) {
        (Some(id), true) => {
            let label = project.owner_email.as_deref().unwrap_or(id);
            format!(" {}", style(format!("[{label}]")).cyan())
        }
        _ => String::new(),
    };
    println!(
        "{}  {}  {} {}{}",
        style(&project.id).yellow(),
        style(format_time(project.last_modified)).dim().italic(),
        style(&project.title).bold(),
        style(format!("({} scenes)", project.scene_count)).dim(),
        owner,
    );
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

fn handle_list(studio: &Studio, user: &str, all: bool) -> Result<()> {
    let projects = studio.list_projects(user, all);
    if projects.is_empty() {
        println!("{}", style("No projects.").dim());
        return Ok(());
    }
    for project in &projects {
        print_project(project, all);
    }
    Ok(())
}

fn handle_create(studio: &Studio, user: &str, title: Option<String>) -> Result<()> {
    let project = studio.create_project(user, Some(ProjectManifest { title }))?;
    println!("{} {}", style("Created").green(), project.id);
    Ok(())
}

async fn handle_show(studio: &Studio, user: &str, id: &str) -> Result<()> {
    let Some(project) = studio.registry().find(user, id) else {
        bail!("Project '{id}' not found for user '{user}'");
    };
    let data = studio.load_project(id).await;

    print_project(&project, false);
    let with_binary = |present: usize, total: usize| {
        if total == 0 {
            String::new()
        } else {
            format!(" ({present} with media)")
        }
    };
    println!(
        "  cast:   {}{}",
        data.cast.len(),
        with_binary(
            data.cast.iter().filter(|c| c.image.is_some()).count(),
            data.cast.len()
        )
    );
    println!(
        "  scenes: {}{}",
        data.scenes.len(),
        with_binary(
            data.scenes.iter().filter(|s| s.image_url.is_some()).count(),
            data.scenes.len()
        )
    );
    println!(
        "  lines:  {}{}",
        data.voice.lines.len(),
        with_binary(
            data.voice.lines.iter().filter(|l| l.audio_url.is_some()).count(),
            data.voice.lines.len()
        )
    );
    println!(
        "  clips:  {}{}",
        data.motion.len(),
        with_binary(
            data.motion.iter().filter(|j| j.video_url.is_some()).count(),
            data.motion.len()
        )
    );
    if !data.prompt_draft.is_empty() {
        println!("  draft:  {}", style(&data.prompt_draft).italic());
    }
    Ok(())
}

async fn handle_delete(studio: &Studio, user: &str, id: &str) -> Result<()> {
    if studio.registry().find(user, id).is_none() {
        println!("{}", style(format!("No project '{id}' for user '{user}'.")).dim());
        return Ok(());
    }
    studio.delete_project(user, id).await?;
    println!("{} {}", style("Deleted").red(), id);
    Ok(())
}

async fn handle_delete_all(studio: &Studio, user: &str, yes: bool) -> Result<()> {
    let count = studio.list_projects(user, false).len();
    if !yes && !confirm(&format!("Delete all {count} projects of '{user}'?"))? {
        println!("Aborted.");
        return Ok(());
    }
    studio.delete_all(user).await?;
    println!("{} {count} projects", style("Deleted").red());
    Ok(())
}

async fn handle_export(
    studio: &Studio,
    user: &str,
    id: &str,
    output: Option<&Path>,
) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            studio.export_to_writer(user, id, &mut out).await?;
            out.flush()?;
            eprintln!("{} {}", style("Exported to").green(), path.display());
        }
        None => {
            let mut out = BufWriter::new(io::stdout());
            studio.export_to_writer(user, id, &mut out).await?;
            out.flush()?;
        }
    }
    Ok(())
}

async fn handle_import(studio: &Studio, user: &str, file: &Path) -> Result<()> {
    let document =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let project = studio.import_project(user, &document).await?;
    println!(
        "{} {} as {}",
        style("Imported").green(),
        style(&project.title).bold(),
        project.id
    );
    Ok(())
}

async fn handle_reset(studio: &Studio, yes: bool) -> Result<()> {
    if !yes && !confirm("Erase every project of every user?")? {
        println!("Aborted.");
        return Ok(());
    }
    studio.reset().await?;
    println!("{}", style("Storage cleared").red());
    Ok(())
}
