use gorillas::GorillasError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Gorillas(#[from] GorillasError),

    #[error("PRIVATE_KEY environment variable is required for this command")]
    MissingPrivateKey,

    #[error("not logged in; run `gorillas login` first")]
    NotLoggedIn,

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
