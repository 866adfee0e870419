use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_EMAIL_HEADER: &str = "X-User-Email";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Caller identity, supplied by the fronting auth layer as request headers.
///
/// The id is used only as a storage namespace.
#[derive(Debug, Clone)]
pub struct StudioUser {
    pub id: String,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl StudioUser {
    /// Returns `Ok(())` for admins, `Err(PermissionDenied)` otherwise.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for StudioUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER).ok_or(AppError::UserMissing)?;

        Ok(StudioUser {
            id: id.to_string(),
            email: header(parts, USER_EMAIL_HEADER).map(String::from),
            is_admin: header(parts, USER_ROLE_HEADER)
                .is_some_and(|role| role.eq_ignore_ascii_case("admin")),
        })
    }
}
