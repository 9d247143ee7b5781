use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedforward_api::api::handlers::{self, AppState};
use feedforward_api::api::routes;
use feedforward_api::config::Config;
use feedforward_api::core::reconciler::SubscriptionReconciler;
use feedforward_api::core::route_guard::RouteGuard;
use feedforward_api::db::Database;
use feedforward_api::integrations::link_preview::LinkPreviewer;
use feedforward_api::integrations::stripe_client::StripeClient;
use feedforward_api::integrations::uploads::{StorageClient, UploadPolicy};
use feedforward_api::project_storage::PgProjectRepository;
use feedforward_api::session::SessionSigner;
use feedforward_api::signature::WebhookVerifier;
use feedforward_api::subscription_store::PgSubscriptionStore;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection.
/// - Stripe, storage and link preview clients.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok if the server runs successfully, or an error if initialization fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedforward_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let stripe = StripeClient::new(&config.stripe_api_base, config.stripe_secret_key.clone())?;
    tracing::info!("Stripe client initialized: {}", config.stripe_api_base);

    let reconciler = SubscriptionReconciler::new(
        Arc::new(stripe),
        Arc::new(PgSubscriptionStore::new(db.pool.clone())),
    );

    let storage = StorageClient::new(
        &config.supabase_url,
        config.supabase_service_role_key.clone(),
    )?;

    // Build application state
    let app_state = Arc::new(AppState {
        verifier: WebhookVerifier::new(
            config.stripe_webhook_secret.clone(),
            config.webhook_tolerance_secs,
        ),
        projects: Arc::new(PgProjectRepository::new(db.pool.clone())),
        sessions: SessionSigner::new(config.session_signing_key.clone()),
        route_guard: RouteGuard::new(&config.public_paths),
        storage,
        upload_policy: UploadPolicy::default(),
        link_previewer: LinkPreviewer::new()?,
        reconciler,
        config: config.clone(),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Build protected routes with security layers
    let protected_routes = routes::api_routes().layer(
        ServiceBuilder::new()
            // Request size limit: 5MB max payload
            .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
            // Rate limiting: 10 req/sec per IP, burst of 20
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
