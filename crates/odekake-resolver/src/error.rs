use thiserror::Error;

/// Failures while assembling a resolver's collaborators. Resolution itself
/// never returns an error: per-tier failures degrade to lower tiers and end
/// in an undetermined verdict at worst.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to build page fetch client: {0}")]
    Fetcher(#[from] odekake_scraper::FetchError),

    #[error("failed to build LLM client: {0}")]
    Llm(#[from] odekake_llm::LlmError),
}
