use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub integration: IntegrationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_cors: bool,
    pub enable_request_logging: bool,
}

/// Secrets are read once at startup and redacted from Debug output;
/// they must never reach the logs.
#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"***")
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .finish()
    }
}

/// Cliq integration settings. Client id/secret come from the environment
/// and are redacted from Debug output.
#[derive(Clone)]
pub struct IntegrationConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub api_base_url: String,
    pub http_timeout_secs: u64,
}

impl IntegrationConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl std::fmt::Debug for IntegrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationConfig")
            .field("client_id", &"***")
            .field("client_secret", &"***")
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("SIGNAGE_API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_CORS") {
            self.api.enable_cors = v.parse().unwrap_or(self.api.enable_cors);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        if let Ok(v) = env::var("SIGNAGE_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SIGNAGE_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        if let Ok(v) = env::var("CLIQ_CLIENT_ID") {
            self.integration.client_id = v;
        }
        if let Ok(v) = env::var("CLIQ_CLIENT_SECRET") {
            self.integration.client_secret = v;
        }
        if let Ok(v) = env::var("CLIQ_TOKEN_URL") {
            self.integration.token_url = v;
        }
        if let Ok(v) = env::var("CLIQ_API_BASE_URL") {
            self.integration.api_base_url = v;
        }
        if let Ok(v) = env::var("CLIQ_HTTP_TIMEOUT_SECS") {
            self.integration.http_timeout_secs =
                v.parse().unwrap_or(self.integration.http_timeout_secs);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                port: 3000,
                enable_cors: true,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: "dev-only-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            integration: IntegrationConfig {
                client_id: String::new(),
                client_secret: String::new(),
                token_url: "https://accounts.zoho.com/oauth/v2/token".to_string(),
                api_base_url: "https://cliq.zoho.com/api/v2".to_string(),
                http_timeout_secs: 10,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                port: 3000,
                enable_cors: true,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                // An empty secret refuses token generation/validation at runtime
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            integration: IntegrationConfig {
                client_id: String::new(),
                client_secret: String::new(),
                token_url: "https://accounts.zoho.com/oauth/v2/token".to_string(),
                api_base_url: "https://cliq.zoho.com/api/v2".to_string(),
                http_timeout_secs: 10,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.integration.http_timeout_secs, 10);
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn production_has_no_baked_in_secret() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = AppConfig::development();
        let printed = format!("{:?} {:?}", config.security, config.integration);
        assert!(!printed.contains("dev-only-secret"));
    }
}
