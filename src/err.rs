use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};

use crate::view;

/// Handler-boundary error. Everything that reaches this type is a server
/// fault (store, filesystem, hashing); expected failures like bad input or
/// a missing session are handled in the handlers as flash + redirect.
#[derive(Debug)]
pub enum Error {
    Internal { kind: &'static str, message: String },
}

impl Error {
    pub fn internal<S: Into<String>>(kind: &'static str, message: S) -> Error {
        Error::Internal {
            kind,
            message: message.into(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let Error::Internal { kind, message } = &self;
        log::error!("{}: {}", kind, message);
        (StatusCode::INTERNAL_SERVER_ERROR, Html(view::error_page())).into_response()
    }
}

pub async fn handler_404(path: Uri) -> (StatusCode, Html<String>) {
    (
        StatusCode::NOT_FOUND,
        Html(view::not_found(&path.to_string())),
    )
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::internal("DatabaseError", err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::internal("IOError", err.to_string())
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::internal("CredentialError", err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("Unknown", err.to_string())
    }
}
