use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Base URL used in emailed links (activation, password reset, login).
    pub public_base_url: String,
    pub smtp: SmtpConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_base: String,
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let public_base_url =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| format!("http://{host}:{port}"));

        let smtp = SmtpConfig {
            host: env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()),
            port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(587),
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_address: env::var("SMTP_FROM")
                .unwrap_or_else(|_| "no-reply@movie-store.local".to_string()),
        };

        let gateway = GatewayConfig {
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            secret_key: env::var("STRIPE_SECRET_KEY").ok().filter(|k| !k.is_empty()),
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .ok()
                .filter(|k| !k.is_empty()),
            success_url: env::var("PAYMENT_SUCCESS_URL")
                .unwrap_or_else(|_| format!("{public_base_url}/payments/success")),
            cancel_url: env::var("PAYMENT_CANCEL_URL")
                .unwrap_or_else(|_| format!("{public_base_url}/payments/cancel")),
        };

        Ok(Self {
            port,
            database_url,
            host,
            public_base_url,
            smtp,
            gateway,
        })
    }
}
