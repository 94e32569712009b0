use crate::app_config::{AppConfig, RateLimitRule};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the
/// process, without touching `.env` files — useful for testing.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual
/// environment so it can be tested with a pure `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" => Ok(false),
                other => Err(ConfigError::InvalidEnvVar {
                    var: var.to_string(),
                    reason: format!("expected boolean, got '{other}'"),
                }),
            },
        }
    };

    let bind_addr = parse_addr("ODEKAKE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("ODEKAKE_LOG_LEVEL", "info");
    let facilities_path = PathBuf::from(or_default(
        "ODEKAKE_FACILITIES_PATH",
        "./config/facilities.yaml",
    ));

    let fetch_timeout_secs = parse_u64("ODEKAKE_FETCH_TIMEOUT_SECS", "30")?;
    let fetch_user_agent = or_default(
        "ODEKAKE_FETCH_USER_AGENT",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
    );
    let fetch_accept_invalid_certs = parse_bool("ODEKAKE_FETCH_ACCEPT_INVALID_CERTS", true)?;

    let llm_endpoint = lookup("ODEKAKE_LLM_ENDPOINT").ok();
    let llm_api_key = lookup("ODEKAKE_LLM_API_KEY").ok();
    let llm_model = or_default("ODEKAKE_LLM_MODEL", "claude-3-7-sonnet");
    let llm_timeout_secs = parse_u64("ODEKAKE_LLM_TIMEOUT_SECS", "30")?;

    let per_ip_limit = RateLimitRule {
        max_requests: parse_usize("ODEKAKE_RATE_LIMIT_PER_IP_MAX", "10")?,
        window_secs: parse_u64("ODEKAKE_RATE_LIMIT_WINDOW_SECS", "60")?,
        burst_allowance: parse_usize("ODEKAKE_RATE_LIMIT_PER_IP_BURST", "3")?,
    };
    let global_limit = RateLimitRule {
        max_requests: parse_usize("ODEKAKE_RATE_LIMIT_GLOBAL_MAX", "100")?,
        window_secs: parse_u64("ODEKAKE_RATE_LIMIT_WINDOW_SECS", "60")?,
        burst_allowance: parse_usize("ODEKAKE_RATE_LIMIT_GLOBAL_BURST", "20")?,
    };

    let cors_allowed_origins = or_default("ODEKAKE_CORS_ALLOWED_ORIGINS", "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    Ok(AppConfig {
        bind_addr,
        log_level,
        facilities_path,
        fetch_timeout_secs,
        fetch_user_agent,
        fetch_accept_invalid_certs,
        llm_endpoint,
        llm_api_key,
        llm_model,
        llm_timeout_secs,
        per_ip_limit,
        global_limit,
        cors_allowed_origins,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn defaults_apply_with_empty_env() {
        let map: HashMap<&str, &str> = HashMap::new();
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.fetch_timeout_secs, 30);
        assert!(cfg.fetch_accept_invalid_certs);
        assert!(cfg.llm_endpoint.is_none());
        assert_eq!(cfg.per_ip_limit.max_requests, 10);
        assert_eq!(cfg.per_ip_limit.window_secs, 60);
        assert_eq!(cfg.per_ip_limit.burst_allowance, 3);
        assert_eq!(cfg.global_limit.max_requests, 100);
        assert!(cfg.cors_allowed_origins.is_empty());
    }

    #[test]
    fn invalid_bind_addr_is_rejected() {
        let mut map = HashMap::new();
        map.insert("ODEKAKE_BIND_ADDR", "not-a-socket-addr");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "ODEKAKE_BIND_ADDR"),
            "expected InvalidEnvVar(ODEKAKE_BIND_ADDR), got: {result:?}"
        );
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let mut map = HashMap::new();
        map.insert("ODEKAKE_FETCH_ACCEPT_INVALID_CERTS", "maybe");
        let result = build_app_config(lookup_from_map(&map));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "ODEKAKE_FETCH_ACCEPT_INVALID_CERTS"
        ));
    }

    #[test]
    fn rate_limit_overrides_are_parsed() {
        let mut map = HashMap::new();
        map.insert("ODEKAKE_RATE_LIMIT_PER_IP_MAX", "5");
        map.insert("ODEKAKE_RATE_LIMIT_PER_IP_BURST", "0");
        map.insert("ODEKAKE_RATE_LIMIT_WINDOW_SECS", "30");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.per_ip_limit.max_requests, 5);
        assert_eq!(cfg.per_ip_limit.burst_allowance, 0);
        assert_eq!(cfg.per_ip_limit.window_secs, 30);
        assert_eq!(cfg.per_ip_limit.total_allowed(), 5);
        assert_eq!(cfg.global_limit.window_secs, 30);
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let mut map = HashMap::new();
        map.insert(
            "ODEKAKE_CORS_ALLOWED_ORIGINS",
            "https://demo.example.com, https://*.s3.amazonaws.com ,",
        );
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(
            cfg.cors_allowed_origins,
            vec![
                "https://demo.example.com".to_string(),
                "https://*.s3.amazonaws.com".to_string()
            ]
        );
    }

}
