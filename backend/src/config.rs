use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub cors_origins: Vec<String>,
    pub jwt: JwtSettings,
    pub okta: OktaSettings,
}

/// Signing policy for access tokens and expiry policy for refresh tokens.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub signing_key: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

/// Optional identity-federation directory. Federation is disabled unless
/// both the domain and the API token are set.
#[derive(Debug, Clone)]
pub struct OktaSettings {
    pub domain: Option<String>,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a number"),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:fleet.db?mode=rwc".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            jwt: JwtSettings {
                signing_key: env::var("JWT_SIGNING_KEY")
                    .unwrap_or_else(|_| "development-signing-key-change-in-production".to_string()),
                issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "fleet-backend".to_string()),
                audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "fleet-clients".to_string()),
                access_token_minutes: env::var("ACCESS_TOKEN_MINUTES")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("ACCESS_TOKEN_MINUTES must be a number"),
                refresh_token_days: env::var("REFRESH_TOKEN_DAYS")
                    .unwrap_or_else(|_| "14".to_string())
                    .parse()
                    .expect("REFRESH_TOKEN_DAYS must be a number"),
            },
            okta: OktaSettings {
                domain: env::var("OKTA_DOMAIN").ok(),
                api_token: env::var("OKTA_API_TOKEN").ok(),
                timeout_secs: env::var("OKTA_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("OKTA_TIMEOUT_SECS must be a number"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure config tests run serially (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("HOST");
        env::remove_var("PORT");
        env::remove_var("DATABASE_URL");
        env::remove_var("CORS_ORIGINS");
        env::remove_var("JWT_SIGNING_KEY");
        env::remove_var("JWT_ISSUER");
        env::remove_var("JWT_AUDIENCE");
        env::remove_var("ACCESS_TOKEN_MINUTES");
        env::remove_var("REFRESH_TOKEN_DAYS");
        env::remove_var("OKTA_DOMAIN");
        env::remove_var("OKTA_API_TOKEN");
        env::remove_var("OKTA_TIMEOUT_SECS");
    }

    #[test]
    fn test_config_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = Config::from_env().unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite:fleet.db?mode=rwc");
        assert_eq!(config.jwt.issuer, "fleet-backend");
        assert_eq!(config.jwt.audience, "fleet-clients");
        assert_eq!(config.jwt.access_token_minutes, 30);
        assert_eq!(config.jwt.refresh_token_days, 14);
        assert!(config.okta.domain.is_none());
        assert!(config.okta.api_token.is_none());
        assert_eq!(config.okta.timeout_secs, 10);
    }

    #[test]
    fn test_config_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("HOST", "0.0.0.0");
        env::set_var("PORT", "3000");
        env::set_var("DATABASE_URL", "sqlite:test.db");
        env::set_var("CORS_ORIGINS", "https://a.test, https://b.test");
        env::set_var("JWT_SIGNING_KEY", "test-signing-key");
        env::set_var("ACCESS_TOKEN_MINUTES", "60");
        env::set_var("REFRESH_TOKEN_DAYS", "7");
        env::set_var("OKTA_DOMAIN", "https://example.okta.test");
        env::set_var("OKTA_API_TOKEN", "token");

        let config = Config::from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, "sqlite:test.db");
        assert_eq!(
            config.cors_origins,
            vec!["https://a.test".to_string(), "https://b.test".to_string()]
        );
        assert_eq!(config.jwt.signing_key, "test-signing-key");
        assert_eq!(config.jwt.access_token_minutes, 60);
        assert_eq!(config.jwt.refresh_token_days, 7);
        assert_eq!(
            config.okta.domain.as_deref(),
            Some("https://example.okta.test")
        );

        // Clean up
        clear_env();
    }
}
