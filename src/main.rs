//! Trade Academy realtime service entrypoint.
//!
//! Loads configuration, wires the adapters behind their ports, and serves
//! the WebSocket gateway plus the consultation REST API on one listener.

use std::sync::Arc;
use std::time::Duration;

use axum::{http::HeaderValue, middleware, routing::get, Router};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use trade_academy::adapters::auth::{JwtTokenVerifier, JwtVerifierConfig};
use trade_academy::adapters::http::{auth_middleware, AuthState, ConsultationApiState};
use trade_academy::adapters::memory::{
    InMemoryConsultationStore, InMemoryNotificationStore, InMemoryRoomDirectory,
    InMemoryUserDirectory,
};
use trade_academy::adapters::realtime::{gateway_router, GatewayState, NotificationDispatcher,
    PresenceRegistry};
use trade_academy::application::ConsultationLifecycle;
use trade_academy::config::AppConfig;
use trade_academy::domain::foundation::RoomId;
use trade_academy::domain::room::{Room, RoomTier};
use trade_academy::ports::{
    ConsultationStore, NotificationStore, RoomDirectory, TokenVerifier, UserDirectory,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    tracing::info!(
        environment = ?config.server.environment,
        consultations_enabled = config.features.consultations_enabled,
        "Starting trade-academy realtime service"
    );

    // Port wiring. The in-memory adapters are the default until the
    // database-backed ones land; they sit behind the same ports.
    let verifier: Arc<dyn TokenVerifier> = {
        let mut jwt = JwtVerifierConfig::new(config.auth.jwt_secret.clone());
        if let Some(issuer) = &config.auth.jwt_issuer {
            jwt = jwt.with_issuer(issuer.clone());
        }
        Arc::new(JwtTokenVerifier::new(jwt))
    };
    let directory = Arc::new(seeded_room_directory());
    let registry = Arc::new(PresenceRegistry::new(
        directory.clone() as Arc<dyn RoomDirectory>
    ));
    let consultation_store: Arc<dyn ConsultationStore> = Arc::new(InMemoryConsultationStore::new());
    let notification_store: Arc<dyn NotificationStore> = Arc::new(InMemoryNotificationStore::new());
    let user_directory: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new());

    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&registry),
        notification_store,
        Arc::clone(&user_directory),
    ));
    let lifecycle = Arc::new(ConsultationLifecycle::new(
        Arc::clone(&consultation_store),
        user_directory,
        Arc::clone(&registry),
        dispatcher,
        config.features.consultations_enabled,
    ));

    let gateway_state = GatewayState::new(
        Arc::clone(&verifier),
        Arc::clone(&registry),
        consultation_store,
    );
    let api_state = ConsultationApiState { lifecycle };
    let auth_state: AuthState = verifier;

    let api = trade_academy::adapters::http::consultation_router()
        .with_state(api_state)
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(gateway_router().with_state(gateway_state))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )));

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Community rooms, one per proficiency tier.
fn seeded_room_directory() -> InMemoryRoomDirectory {
    let directory = InMemoryRoomDirectory::new();
    for (name, tier) in [
        ("Beginner", RoomTier::Beginner),
        ("Intermediate", RoomTier::Intermediate),
        ("Advanced", RoomTier::Advanced),
    ] {
        directory.add_room(Room {
            id: RoomId::new(),
            name: name.to_string(),
            slug: name.to_lowercase(),
            tier,
        });
    }
    directory
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = config.server.cors_origins_list();
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
