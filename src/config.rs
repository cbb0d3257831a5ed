use chrono::Duration;
use std::env;

/// Runtime configuration, read once from the environment at startup.
///
/// `DATABASE_URL` is optional: when absent the service runs against the
/// in-memory user store, which is what local development and the test
/// suite use.
pub struct Config {
    pub database_url: Option<String>,
    pub server_port: u16,
    pub server_host: String,
    /// Secret used to sign access tokens. Must differ from the refresh secret.
    pub access_token_secret: String,
    /// Secret used to sign refresh tokens.
    pub refresh_token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Lifetime of a one-time verification/reset code.
    pub otp_ttl: Duration,
    /// Lifetime of a staged (unverified) registration.
    pub pending_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok(),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            access_token_secret: env::var("ACCESS_TOKEN_SECRET")
                .expect("ACCESS_TOKEN_SECRET must be set"),
            refresh_token_secret: env::var("REFRESH_TOKEN_SECRET")
                .expect("REFRESH_TOKEN_SECRET must be set"),
            access_token_ttl: duration_from_env("ACCESS_TOKEN_TTL_SECS", 900),
            refresh_token_ttl: duration_from_env("REFRESH_TOKEN_TTL_SECS", 604_800),
            otp_ttl: duration_from_env("OTP_TTL_SECS", 600),
            pending_ttl: duration_from_env("PENDING_TTL_SECS", 3600),
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn duration_from_env(key: &str, default_secs: i64) -> Duration {
    let secs = env::var(key)
        .map(|raw| {
            raw.parse()
                .unwrap_or_else(|_| panic!("{} must be a number of seconds", key))
        })
        .unwrap_or(default_secs);
    Duration::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required environment variables
        env::set_var("ACCESS_TOKEN_SECRET", "access-secret");
        env::set_var("REFRESH_TOKEN_SECRET", "refresh-secret");
        env::remove_var("DATABASE_URL");

        let config = Config::from_env();

        assert_eq!(config.database_url, None);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.access_token_ttl, Duration::seconds(900));
        assert_eq!(config.refresh_token_ttl, Duration::seconds(604_800));
        assert_eq!(config.otp_ttl, Duration::minutes(10));
        assert_eq!(config.pending_ttl, Duration::hours(1));

        // Test custom values
        env::set_var("SERVER_PORT", "3000");
        env::set_var("SERVER_HOST", "0.0.0.0");
        env::set_var("OTP_TTL_SECS", "300");

        let config = Config::from_env();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.otp_ttl, Duration::minutes(5));

        env::remove_var("SERVER_PORT");
        env::remove_var("SERVER_HOST");
        env::remove_var("OTP_TTL_SECS");
    }
}
