use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("log backend unavailable: {0}")]
    Unavailable(String),
}
