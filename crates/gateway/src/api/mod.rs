pub mod events;
pub mod health;
pub mod objects;
pub mod rooms;
pub mod strokes;
pub mod turns;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use dr_domain::config::CorsConfig;

use crate::state::AppState;
use crate::ws;

/// Assemble the full router: public health check, the drawing-room
/// API, the internal event tail, and the WebSocket fan-out.
pub fn router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors);
    let max_concurrent = state.config.server.max_concurrent_requests;

    let mut router = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/rooms", post(rooms::create_room))
        .route("/rooms/:room_id/join", post(rooms::join_room))
        .route("/rooms/:room_id", get(rooms::get_room))
        .route("/rooms/:room_id/strokes", post(strokes::create_stroke))
        .route("/rooms/:room_id/strokes", get(strokes::list_strokes))
        .route("/rooms/:room_id/objects", post(objects::commit_object))
        .route("/rooms/:room_id/turns", get(turns::list_turns))
        .route("/internal/events/next", get(events::next))
        .route("/ws/rooms/:room_id", get(ws::handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent));

    if let Some(rate_limit) = &state.config.server.rate_limit {
        use tower_governor::governor::GovernorConfigBuilder;
        use tower_governor::GovernorLayer;

        let governor_config = GovernorConfigBuilder::default()
            .per_second(rate_limit.per_second)
            .burst_size(rate_limit.burst_size)
            .finish()
            .expect("rate_limit: per_second and burst_size must be > 0");
        router = router.layer(GovernorLayer {
            config: std::sync::Arc::new(governor_config),
        });
    }

    router.with_state(state)
}

fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
