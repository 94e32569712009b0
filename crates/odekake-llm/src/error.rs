use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("LLM response was not usable: {0}")]
    MalformedResponse(String),
}
