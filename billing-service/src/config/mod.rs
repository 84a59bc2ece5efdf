use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{env_or, require_env};

use crate::models::{Plan, PlanCatalog};

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub provider: ProviderConfig,
    pub invitations: InvitationConfig,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// Public base URL used for checkout redirects and invitation links.
    pub app_url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct IdentityConfig {
    /// Shared secret the identity provider signs caller tokens with.
    pub jwt_secret: Secret<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ProviderConfig {
    pub api_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    /// Override for tests; defaults to the real provider API.
    pub api_base: String,
    pub price_basic: String,
    pub price_professional: String,
    pub price_enterprise: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct InvitationConfig {
    pub expiry_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env_or("BILLING_SERVICE_HOST", "0.0.0.0");
        let port = env_or("BILLING_SERVICE_PORT", "3004").parse()?;

        let db_url = require_env("BILLING_DATABASE_URL")?;
        let jwt_secret = require_env("IDENTITY_JWT_SECRET")?;

        let api_key = env_or("STRIPE_SECRET_KEY", "");
        let webhook_secret = env_or("STRIPE_WEBHOOK_SECRET", "");
        let api_base = env_or("STRIPE_API_BASE", "https://api.stripe.com/v1");

        let expiry_days = env_or("INVITATION_EXPIRY_DAYS", "7").parse()?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections: env_or("BILLING_DB_MAX_CONNECTIONS", "10").parse()?,
                min_connections: env_or("BILLING_DB_MIN_CONNECTIONS", "1").parse()?,
            },
            identity: IdentityConfig {
                jwt_secret: Secret::new(jwt_secret),
            },
            provider: ProviderConfig {
                api_key: Secret::new(api_key),
                webhook_secret: Secret::new(webhook_secret),
                api_base,
                price_basic: env_or("STRIPE_PRICE_BASIC", ""),
                price_professional: env_or("STRIPE_PRICE_PROFESSIONAL", ""),
                price_enterprise: env_or("STRIPE_PRICE_ENTERPRISE", ""),
            },
            invitations: InvitationConfig { expiry_days },
            service_name: "billing-service".to_string(),
            log_level: env_or("BILLING_LOG_LEVEL", "info,billing_service=debug"),
            otlp_endpoint: std::env::var("OTLP_ENDPOINT").ok(),
            app_url: env_or("APP_URL", "http://localhost:3000"),
        })
    }

    /// The plan catalog the reconciler resolves price ids against.
    /// Plans whose price id is not configured are excluded so an empty
    /// env value can never match a real event.
    pub fn plan_catalog(&self) -> PlanCatalog {
        let candidates = [
            (&self.provider.price_basic, "Básico", 100),
            (&self.provider.price_professional, "Profesional", 300),
            (&self.provider.price_enterprise, "Empresarial", 1000),
        ];

        PlanCatalog::new(
            candidates
                .into_iter()
                .filter(|(price_id, _, _)| !price_id.is_empty())
                .map(|(price_id, plan_type, credits)| Plan {
                    price_id: price_id.clone(),
                    plan_type: plan_type.to_string(),
                    credits,
                })
                .collect(),
        )
    }
}
