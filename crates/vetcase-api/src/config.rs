use std::env;

use anyhow::Context;
use vetcase_grading::DiagnosisMatcher;

/// Deployment environment; drives log formatting and security headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Self::Development
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub env: Environment,
    pub allowed_origins: Vec<String>,
    /// Absent merchant id selects the sandbox gateway.
    pub zarinpal_merchant_id: Option<String>,
    pub zarinpal_sandbox: bool,
    /// Base URL the gateway redirects back to after checkout.
    pub callback_base_url: String,
    pub diagnosis_matcher: DiagnosisMatcher,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_seconds: u64,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            env: parse_environment(env::var("ENVIRONMENT").ok().as_deref())?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            zarinpal_merchant_id: env::var("ZARINPAL_MERCHANT_ID").ok().filter(|s| !s.is_empty()),
            zarinpal_sandbox: parse_bool(env::var("ZARINPAL_SANDBOX").ok().as_deref(), true)?,
            callback_base_url: env::var("CALLBACK_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            diagnosis_matcher: parse_matcher(env::var("DIAGNOSIS_MATCHER").ok().as_deref())?,
            rate_limit_max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("RATE_LIMIT_MAX_REQUESTS must be a number")?,
            rate_limit_window_seconds: env::var("RATE_LIMIT_WINDOW_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("RATE_LIMIT_WINDOW_SECONDS must be a number")?,
        })
    }
}

fn parse_environment(value: Option<&str>) -> anyhow::Result<Environment> {
    match value {
        None | Some("development") | Some("dev") => Ok(Environment::Development),
        Some("production") | Some("prod") => Ok(Environment::Production),
        Some(other) => anyhow::bail!("unknown ENVIRONMENT value: {other}"),
    }
}

fn parse_bool(value: Option<&str>, default: bool) -> anyhow::Result<bool> {
    match value {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => anyhow::bail!("expected a boolean, got: {other}"),
    }
}

fn parse_matcher(value: Option<&str>) -> anyhow::Result<DiagnosisMatcher> {
    match value {
        None | Some("substring") => Ok(DiagnosisMatcher::Substring),
        Some("exact") => Ok(DiagnosisMatcher::Exact),
        Some("keywords") => Ok(DiagnosisMatcher::Keywords),
        Some(other) => anyhow::bail!("unknown DIAGNOSIS_MATCHER value: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_environment() {
        assert_eq!(parse_environment(None).unwrap(), Environment::Development);
        assert_eq!(
            parse_environment(Some("prod")).unwrap(),
            Environment::Production
        );
        assert!(parse_environment(Some("staging")).is_err());
    }

    #[test]
    fn test_parse_matcher() {
        assert_eq!(parse_matcher(None).unwrap(), DiagnosisMatcher::Substring);
        assert_eq!(
            parse_matcher(Some("keywords")).unwrap(),
            DiagnosisMatcher::Keywords
        );
        assert!(parse_matcher(Some("fuzzy")).is_err());
    }
}
