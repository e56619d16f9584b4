//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL` — Postgres connection string (required)
/// - `HOST` — bind address (default `"0.0.0.0"`)
/// - `PORT` — listen port (default `8083`)
/// - `NATS_URL` — optional event bus address
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub nats_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")?,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8083),
            nats_url: std::env::var("NATS_URL").ok(),
        })
    }

    /// The `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            database_url: "postgres://localhost/storefront".into(),
            host: "127.0.0.1".into(),
            port: 8083,
            nats_url: None,
        };
        assert_eq!(config.addr(), "127.0.0.1:8083");
    }
}
