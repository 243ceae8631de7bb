use std::env;

use anyhow::Context;

/// Startup configuration, read from the environment once in `main` and
/// passed into the services that need it. No module reads `env` after this.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub payment_api_base: String,
    pub payment_secret_key: String,
    pub payment_webhook_secret: String,
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET not set")?,
            payment_api_base: env::var("PAYMENT_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            payment_secret_key: env::var("STRIPE_SECRET_KEY")
                .context("STRIPE_SECRET_KEY not set")?,
            payment_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .context("STRIPE_WEBHOOK_SECRET not set")?,
            mail_relay_url: env::var("MAIL_RELAY_URL").ok(),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@greencart.example".to_string()),
        })
    }
}
