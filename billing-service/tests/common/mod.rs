//! Test helpers for billing-service integration tests.
//!
//! Tests run against a real PostgreSQL pointed to by `TEST_DATABASE_URL`
//! and skip silently when it is unset. Each spawned app gets its own
//! schema for isolation.

#![allow(dead_code)]

use billing_service::config::{
    Config, DatabaseConfig, IdentityConfig, InvitationConfig, ProviderConfig, ServerConfig,
};
use billing_service::middleware::auth::{sign_identity_token, IdentityClaims};
use billing_service::services::Database;
use billing_service::Application;
use secrecy::Secret;
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-identity-secret";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

static SCHEMA_COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_schema_name() -> String {
    let counter = SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("test_billing_{}_{}", std::process::id(), counter)
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub db: Database,
    pub config: Config,
}

impl TestApp {
    /// Spawn the application on a random port against a fresh schema.
    /// Returns None when `TEST_DATABASE_URL` is not set.
    pub async fn spawn() -> Option<Self> {
        let base_url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("TEST_DATABASE_URL not set; skipping integration test");
                return None;
            }
        };

        let schema_name = unique_schema_name();

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&base_url)
            .await
            .expect("Failed to connect to test database");
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema_name))
            .execute(&pool)
            .await
            .ok();
        sqlx::query(&format!("CREATE SCHEMA {}", schema_name))
            .execute(&pool)
            .await
            .expect("Failed to create test schema");
        pool.close().await;

        let separator = if base_url.contains('?') { "&" } else { "?" };
        let db_url = format!(
            "{}{}options=-c search_path%3D{}",
            base_url, separator, schema_name
        );

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: Secret::new(db_url.clone()),
                max_connections: 5,
                min_connections: 1,
            },
            identity: IdentityConfig {
                jwt_secret: Secret::new(TEST_JWT_SECRET.to_string()),
            },
            provider: ProviderConfig {
                api_key: Secret::new("sk_test_dummy".to_string()),
                webhook_secret: Secret::new(TEST_WEBHOOK_SECRET.to_string()),
                // Unroutable; tests never exercise remote provider calls.
                api_base: "http://127.0.0.1:9".to_string(),
                price_basic: "price_basic_test".to_string(),
                price_professional: "price_pro_test".to_string(),
                price_enterprise: "price_ent_test".to_string(),
            },
            invitations: InvitationConfig { expiry_days: 7 },
            service_name: "billing-service-test".to_string(),
            log_level: "warn".to_string(),
            otlp_endpoint: None,
            app_url: "http://localhost:3000".to_string(),
        };

        let app = Application::build(config.clone())
            .await
            .expect("Failed to build test application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let db = Database::new(&db_url, 5, 1)
            .await
            .expect("Failed to connect test pool");

        Some(Self {
            address: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            db,
            config,
        })
    }

    /// Sign an identity token the way the identity provider would.
    pub fn token_for(&self, external_id: &str, email: &str, name: Option<&str>) -> String {
        let claims = IdentityClaims {
            sub: external_id.to_string(),
            email: email.to_string(),
            name: name.map(String::from),
            phone: None,
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
        };
        sign_identity_token(TEST_JWT_SECRET, &claims).expect("Failed to sign test token")
    }

    /// Sync an account through the API and return its id.
    pub async fn sync_account(&self, external_id: &str, email: &str) -> Uuid {
        let token = self.token_for(external_id, email, Some("Test User"));
        let response = self
            .client
            .post(format!("{}/auth/sync", self.address))
            .bearer_auth(&token)
            .send()
            .await
            .expect("Failed to call /auth/sync");
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await.expect("Invalid sync response");
        Uuid::parse_str(body["account_id"].as_str().expect("Missing account_id"))
            .expect("Invalid account id")
    }

    /// Create an organization through the API and return its id.
    pub async fn create_organization(&self, token: &str, name: &str, tax_id: &str) -> Uuid {
        let response = self
            .client
            .post(format!("{}/organizations", self.address))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "name": name,
                "organization_type": "legal_entity",
                "tax": {
                    "tax_id": tax_id,
                    "taxpayer": format!("{} S.A. de C.V.", name),
                    "country": "México",
                    "postal_code": "01000",
                    "fiscal_regimen": "601"
                }
            }))
            .send()
            .await
            .expect("Failed to create organization");
        assert_eq!(response.status(), 201, "organization creation failed");

        let body: serde_json::Value = response.json().await.expect("Invalid org response");
        Uuid::parse_str(body["organization_id"].as_str().expect("Missing organization_id"))
            .expect("Invalid organization id")
    }

    /// Unique 12-character tax id per call.
    pub fn unique_tax_id() -> String {
        let suffix: String = Uuid::new_v4().simple().to_string()[..9].to_uppercase();
        format!("AAA{}", suffix)
    }
}
