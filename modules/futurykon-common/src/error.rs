use thiserror::Error;

#[derive(Error, Debug)]
pub enum FuturykonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed event payload: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
