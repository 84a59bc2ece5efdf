pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::middleware::{
    metrics::metrics_middleware, request_id::request_id_middleware,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use middleware::auth_middleware;
use services::{Database, StripeClient};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub stripe: StripeClient,
}

pub struct Application {
    port: u16,
    listener: tokio::net::TcpListener,
    router: Router,
}

impl Application {
    /// Connect, migrate and wire the router. Binds the listener here so
    /// a port of 0 resolves to the actual ephemeral port before the
    /// caller starts the server.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let stripe = StripeClient::new(config.provider.clone());
        if stripe.is_configured() {
            tracing::info!("Payment provider client initialized");
        } else {
            tracing::warn!(
                "Payment provider credentials not configured - checkout and webhooks will be limited"
            );
        }

        let state = AppState {
            db,
            config: config.clone(),
            stripe,
        };

        let public = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            .route("/billing/plans", get(handlers::billing::list_plans))
            .route(
                "/invitations/validate",
                post(handlers::invitations::validate_invitation),
            )
            .route("/webhooks/stripe", post(handlers::webhook::provider_webhook));

        let authenticated = Router::new()
            .route("/auth/sync", post(handlers::profile::sync))
            .route("/profile/phone", patch(handlers::profile::update_phone))
            .route(
                "/organizations",
                get(handlers::organizations::list_organizations)
                    .post(handlers::organizations::create_organization),
            )
            .route(
                "/organizations/personal",
                post(handlers::organizations::create_personal_organization),
            )
            .route(
                "/organizations/:id/tax-profile",
                get(handlers::organizations::get_tax_profile)
                    .put(handlers::organizations::update_tax_profile),
            )
            .route(
                "/organizations/:id/members",
                get(handlers::members::list_members),
            )
            .route(
                "/organizations/:id/members/:account_id",
                delete(handlers::members::remove_member),
            )
            .route(
                "/organizations/:id/clients",
                get(handlers::clients::list_clients).post(handlers::clients::create_client),
            )
            .route(
                "/organizations/:id/documents",
                get(handlers::documents::list_documents),
            )
            .route("/invitations", post(handlers::invitations::create_invitation))
            .route(
                "/invitations/accept",
                post(handlers::invitations::accept_invitation),
            )
            .route("/documents", post(handlers::documents::issue_document))
            .route(
                "/documents/for-client",
                post(handlers::documents::issue_document_for_client),
            )
            .route("/billing/checkout", post(handlers::billing::create_checkout))
            .route("/billing/portal", post(handlers::billing::create_portal))
            .route_layer(from_fn_with_state(state.clone(), auth_middleware));

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let router = Router::new()
            .merge(public)
            .merge(authenticated)
            .layer(from_fn(metrics_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .layer(cors)
            .with_state(state);

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("Listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
