use serde::Deserialize;

use crate::route_guard::DEFAULT_PUBLIC_PATHS;

const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;
const MIN_SIGNING_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub base_url: String,
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub session_signing_key: String,
    pub webhook_tolerance_secs: i64,
    /// Pages reachable without signing in; `/*` suffix matches a prefix.
    pub public_paths: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            stripe_secret_key: required_secret("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required_secret("STRIPE_WEBHOOK_SECRET")?,
            stripe_api_base: match std::env::var("STRIPE_API_BASE") {
                Ok(url) if !url.trim().is_empty() => http_url("STRIPE_API_BASE", url)?,
                _ => DEFAULT_STRIPE_API_BASE.to_string(),
            },
            base_url: std::env::var("BASE_URL")
                .map_err(|_| anyhow::anyhow!("BASE_URL environment variable required"))
                .and_then(|url| http_url("BASE_URL", url))?,
            supabase_url: std::env::var("SUPABASE_URL")
                .map_err(|_| anyhow::anyhow!("SUPABASE_URL environment variable required"))
                .and_then(|url| http_url("SUPABASE_URL", url))?,
            supabase_service_role_key: required_secret("SUPABASE_SERVICE_ROLE_KEY")?,
            session_signing_key: required_secret("SESSION_SIGNING_KEY").and_then(|key| {
                if key.len() < MIN_SIGNING_KEY_LEN {
                    anyhow::bail!(
                        "SESSION_SIGNING_KEY must be at least {} bytes",
                        MIN_SIGNING_KEY_LEN
                    );
                }
                Ok(key)
            })?,
            webhook_tolerance_secs: match std::env::var("WEBHOOK_TOLERANCE_SECS") {
                Ok(raw) => raw.parse().map_err(|_| {
                    anyhow::anyhow!("WEBHOOK_TOLERANCE_SECS must be a whole number of seconds")
                })?,
                Err(_) => DEFAULT_WEBHOOK_TOLERANCE_SECS,
            },
            public_paths: match std::env::var("PUBLIC_PATHS") {
                Ok(raw) if !raw.trim().is_empty() => split_paths(&raw),
                _ => DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
            },
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Stripe API base: {}", config.stripe_api_base);
        tracing::debug!("Supabase URL: {}", config.supabase_url);
        tracing::debug!("Base URL: {}", config.base_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn required_secret(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(value)
}

fn split_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn http_url(name: &str, url: String) -> anyhow::Result<String> {
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_url_trims_trailing_slash() {
        let url = http_url("BASE_URL", "https://feedforward.app/".to_string()).unwrap();
        assert_eq!(url, "https://feedforward.app");
    }

    #[test]
    fn test_http_url_rejects_other_schemes() {
        assert!(http_url("BASE_URL", "ftp://feedforward.app".to_string()).is_err());
        assert!(http_url("BASE_URL", "   ".to_string()).is_err());
    }

    #[test]
    fn test_split_paths() {
        assert_eq!(
            split_paths(" /, /projects/* ,,/contact"),
            vec!["/", "/projects/*", "/contact"]
        );
    }
}
