use std::env;
use std::time::Duration;

const VERIFY_EMAIL_PATH: &str = "/verify-email";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub google_client_id: String,
    pub mailjet_api_key: Option<String>,
    pub mailjet_secret_key: Option<String>,
    pub mail_from: String,
    pub mail_from_name: String,
    pub smtp_server: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// STARTTLS when set, implicit TLS otherwise.
    pub smtp_use_tls: bool,
    pub telegram_bot_token: Option<String>,
    pub telegram_admin_chat_id: Option<String>,
    pub redis_url: Option<String>,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Configuration with every optional setting at its default.
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        let frontend_url = "http://localhost:5173".to_string();
        Config {
            database_url: database_url.into(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration_secs: 7 * 24 * 3600,
            server_host: "0.0.0.0".into(),
            server_port: 5000,
            api_base_uri: "/api/v1".into(),
            cors_origins: vec![frontend_url.clone()],
            frontend_url,
            google_client_id: String::new(),
            mailjet_api_key: None,
            mailjet_secret_key: None,
            mail_from: "noreply@dzclothes.dz".into(),
            mail_from_name: "DZ Clothes".into(),
            smtp_server: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_use_tls: true,
            telegram_bot_token: None,
            telegram_admin_chat_id: None,
            redis_url: None,
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            admin_email: None,
            admin_password: None,
        }
    }

    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let mut config = Config::new(env::var("DATABASE_URL")?, env::var("JWT_SECRET")?);

        if let Some(hours) = optional("JWT_EXPIRATION").and_then(|v| parse_hours(&v)) {
            config.jwt_expiration_secs = hours * 3600;
        }
        if let Some(host) = optional("SERVER_HOST") {
            config.server_host = host;
        }
        if let Some(port) = optional("SERVER_PORT").and_then(|v| v.parse().ok()) {
            config.server_port = port;
        }
        if let Some(base) = optional("API_BASE_URI") {
            config.api_base_uri = base;
        }
        if let Some(url) = optional("FRONTEND_URL") {
            config.frontend_url = url.trim_end_matches('/').to_string();
        }
        config.cors_origins = match optional("CORS_ORIGINS") {
            Some(origins) => split_list(&origins),
            None => vec![config.frontend_url.clone()],
        };
        if let Some(client_id) = optional("GOOGLE_CLIENT_ID") {
            config.google_client_id = client_id;
        }
        config.mailjet_api_key = optional("MAILJET_API_KEY");
        config.mailjet_secret_key = optional("MAILJET_SECRET_KEY");
        if let Some(from) = optional("MAIL_FROM") {
            config.mail_from = from;
        }
        if let Some(name) = optional("MAIL_FROM_NAME") {
            config.mail_from_name = name;
        }
        config.smtp_server = optional("MAIL_SERVER");
        if let Some(port) = optional("MAIL_PORT").and_then(|v| v.parse().ok()) {
            config.smtp_port = port;
        }
        config.smtp_username = optional("MAIL_USERNAME");
        config.smtp_password = optional("MAIL_PASSWORD");
        if let Some(tls) = optional("MAIL_USE_TLS") {
            config.smtp_use_tls = tls.eq_ignore_ascii_case("true");
        }
        config.telegram_bot_token = optional("TELEGRAM_BOT_TOKEN");
        config.telegram_admin_chat_id = optional("TELEGRAM_ADMIN_CHAT_ID");
        config.redis_url = optional("REDIS_URL");
        if let Some(window) = optional("RATE_LIMIT_WINDOW").and_then(|v| v.parse().ok()) {
            config.rate_limit_window_secs = window;
        }
        if let Some(requests) = optional("RATE_LIMIT_REQUESTS").and_then(|v| v.parse().ok()) {
            config.rate_limit_requests = requests;
        }
        config.admin_email = optional("ADMIN_EMAIL").map(|e| e.to_lowercase());
        config.admin_password = optional("ADMIN_PASSWORD");

        Ok(config)
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn verify_email_link(&self, token: &str) -> String {
        format!("{}{}?token={}", self.frontend_url, VERIFY_EMAIL_PATH, token)
    }

    pub fn mailjet_credentials(&self) -> Option<(&str, &str)> {
        match (&self.mailjet_api_key, &self.mailjet_secret_key) {
            (Some(key), Some(secret)) => Some((key.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// Server, username and password, once all three are configured.
    pub fn smtp_credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.smtp_server, &self.smtp_username, &self.smtp_password) {
            (Some(server), Some(user), Some(password)) => {
                Some((server.as_str(), user.as_str(), password.as_str()))
            }
            _ => None,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts `168` or `168h`.
fn parse_hours(value: &str) -> Option<u64> {
    value.trim().trim_end_matches('h').parse().ok()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_frontend_url() {
        let config = Config::new("postgres://localhost/shop", "secret");
        assert_eq!(config.api_base_uri, "/api/v1");
        assert_eq!(config.cors_origins, vec!["http://localhost:5173".to_string()]);
        assert_eq!(config.jwt_expiration(), Duration::from_secs(604_800));
        assert!(config.mailjet_credentials().is_none());
    }

    #[test]
    fn verify_link_carries_token() {
        let config = Config::new("postgres://localhost/shop", "secret");
        assert_eq!(
            config.verify_email_link("abc"),
            "http://localhost:5173/verify-email?token=abc"
        );
    }

    #[test]
    fn parses_hour_suffix() {
        assert_eq!(parse_hours("24h"), Some(24));
        assert_eq!(parse_hours("12"), Some(12));
        assert_eq!(parse_hours("soon"), None);
    }

    #[test]
    fn splits_origin_list() {
        assert_eq!(
            split_list("https://a.dz/, ,https://b.dz"),
            vec!["https://a.dz".to_string(), "https://b.dz".to_string()]
        );
    }

    #[test]
    fn mailjet_needs_both_keys() {
        let mut config = Config::new("postgres://localhost/shop", "secret");
        config.mailjet_api_key = Some("key".into());
        assert!(config.mailjet_credentials().is_none());
        config.mailjet_secret_key = Some("secret".into());
        assert_eq!(config.mailjet_credentials(), Some(("key", "secret")));
    }

    #[test]
    fn smtp_needs_server_and_login() {
        let mut config = Config::new("postgres://localhost/shop", "secret");
        assert_eq!(config.smtp_port, 587);
        assert!(config.smtp_use_tls);

        config.smtp_server = Some("smtp.exemple.dz".into());
        config.smtp_username = Some("boutique".into());
        assert!(config.smtp_credentials().is_none());
        config.smtp_password = Some("pw".into());
        assert_eq!(
            config.smtp_credentials(),
            Some(("smtp.exemple.dz", "boutique", "pw"))
        );
    }
}
