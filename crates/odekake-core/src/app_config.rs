use std::net::SocketAddr;
use std::path::PathBuf;

/// Per-window rate-limit rule: a base quota plus a burst allowance on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: usize,
    pub window_secs: u64,
    pub burst_allowance: usize,
}

impl RateLimitRule {
    /// Total requests allowed inside one window, burst included.
    #[must_use]
    pub fn total_allowed(&self) -> usize {
        self.max_requests + self.burst_allowance
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub facilities_path: PathBuf,
    pub fetch_timeout_secs: u64,
    pub fetch_user_agent: String,
    /// Several facility sites still run TLS stacks too old for a strict
    /// client (notably the Daisetz museum host); leniency is opt-out.
    pub fetch_accept_invalid_certs: bool,
    pub llm_endpoint: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    pub per_ip_limit: RateLimitRule,
    pub global_limit: RateLimitRule,
    /// Exact origins or `*`-wildcard patterns; empty means allow any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("facilities_path", &self.facilities_path)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("fetch_user_agent", &self.fetch_user_agent)
            .field(
                "fetch_accept_invalid_certs",
                &self.fetch_accept_invalid_certs,
            )
            .field("llm_endpoint", &self.llm_endpoint)
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "[redacted]"))
            .field("llm_model", &self.llm_model)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("per_ip_limit", &self.per_ip_limit)
            .field("global_limit", &self.global_limit)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}
