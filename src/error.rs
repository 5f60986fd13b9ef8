use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;

const GENERIC_MESSAGE: &str = "Something went wrong.";

/// Broad classes of model failures, used to pick an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Conflict,
    AuthFailed,
    Unavailable,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("models: resource not found")]
    NotFound,
    #[error("models: ID provided was invalid")]
    IdInvalid,
    #[error("models: password is required")]
    PasswordRequired,
    #[error("models: password must be at least eight characters")]
    PasswordTooShort,
    #[error("models: password hash is required")]
    PasswordHashRequired,
    #[error("models: remember token must be at least 32 bytes")]
    RememberTooShort,
    #[error("models: remember token is required")]
    RememberRequired,
    #[error("models: email address is required")]
    EmailRequired,
    #[error("models: email address is not valid")]
    EmailInvalid,
    #[error("models: email address is already taken")]
    EmailTaken,
    #[error("models: incorrect password provided")]
    PasswordIncorrect,
    #[error("models: user ID is required")]
    UserIdRequired,
    #[error("models: gallery title is required")]
    TitleRequired,
    #[error("models: storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl ModelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::NotFound => ErrorKind::NotFound,
            ModelError::EmailTaken => ErrorKind::Conflict,
            ModelError::PasswordIncorrect => ErrorKind::AuthFailed,
            ModelError::Storage(_) => ErrorKind::Unavailable,
            _ => ErrorKind::InvalidInput,
        }
    }

    /// Whether the failure came from something the user typed. Token, hash,
    /// id and storage failures come from our own code paths.
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            ModelError::NotFound
                | ModelError::PasswordRequired
                | ModelError::PasswordTooShort
                | ModelError::EmailRequired
                | ModelError::EmailInvalid
                | ModelError::EmailTaken
                | ModelError::PasswordIncorrect
                | ModelError::TitleRequired
        )
    }

    /// Message safe to show to the person using the site.
    pub fn public(&self) -> String {
        match self {
            ModelError::NotFound => "Resource not found".into(),
            ModelError::PasswordRequired => "Password is required".into(),
            ModelError::PasswordTooShort => "Password must be at least eight characters".into(),
            ModelError::EmailRequired => "Email address is required".into(),
            ModelError::EmailInvalid => "Email address is not valid".into(),
            ModelError::EmailTaken => "Email address is already taken".into(),
            ModelError::PasswordIncorrect => "Incorrect password provided".into(),
            ModelError::TitleRequired => "Gallery title is required".into(),
            _ => GENERIC_MESSAGE.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::AuthFailed => StatusCode::UNAUTHORIZED,
            ErrorKind::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Map a model error to the handler rejection type, logging anything internal.
pub fn http_error(e: ModelError) -> (StatusCode, String) {
    let status = e.status();
    if status.is_server_error() || !e.is_public() {
        error!(error = %e, "request failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE.into());
    }
    (status, e.public())
}
