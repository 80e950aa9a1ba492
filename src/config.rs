use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub meeting_ttl_seconds: u64,
    pub code_ttl_seconds: u64,
    pub token_ttl_seconds: u64,
    pub empty_meeting_grace_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            meeting_ttl_seconds: env_u64("MEETING_TTL_SECONDS", 7200),
            code_ttl_seconds: env_u64("CODE_TTL_SECONDS", 600),
            token_ttl_seconds: env_u64("TOKEN_TTL_SECONDS", 86400),
            empty_meeting_grace_seconds: env_u64("EMPTY_MEETING_GRACE_SECONDS", 300),
            sweep_interval_seconds: env_u64("SWEEP_INTERVAL_SECONDS", 300),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn empty_meeting_grace(&self) -> Duration {
        Duration::from_secs(self.empty_meeting_grace_seconds)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server port")]
    InvalidPort,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_env_u64_default() {
        assert_eq!(env_u64("HUSHMEET_DOES_NOT_EXIST", 42), 42);
    }
}
