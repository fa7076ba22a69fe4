use thiserror::Error;

/// Errors the assistant recovers from locally. An upstream failure is
/// substituted with the fixed apology turn; a missing credential is the one
/// fatal startup condition.
#[derive(Debug, Error)]
pub enum CundiError {
    /// Network, auth or protocol failure while talking to the completion
    /// endpoint.
    #[error("completion request failed: {0}")]
    Upstream(String),

    /// OPENAI_API_KEY was not set in the environment or .env file.
    #[error("OPENAI_API_KEY not found in environment variables")]
    MissingApiKey,
}

impl From<reqwest::Error> for CundiError {
    fn from(err: reqwest::Error) -> Self {
        CundiError::Upstream(err.to_string())
    }
}
