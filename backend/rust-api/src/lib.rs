use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod policy;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Pool browsing: anonymous allowed, a valid token upgrades visibility
        .nest(
            "/api/v1/pools",
            pool_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::optional_auth_middleware,
            )),
        )
        // Protected endpoints (require JWT)
        .nest(
            "/api/v1/attempts",
            attempt_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .nest(
            "/api/v1/credits",
            credit_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .nest(
            "/api/v1/reports",
            report_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn pool_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/", get(handlers::pools::list_pools))
        .route("/{id}/questions", get(handlers::pools::list_questions))
}

fn attempt_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/", post(handlers::attempts::start_attempt))
        .route("/{id}", get(handlers::attempts::get_attempt))
        .route("/{id}/answers", post(handlers::attempts::submit_answer))
        .route("/{id}/complete", post(handlers::attempts::complete_attempt))
        .route("/{id}/abandon", post(handlers::attempts::abandon_attempt))
}

fn credit_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/balance", get(handlers::credits::get_balance))
        .route("/purchases", post(handlers::credits::record_purchase))
}

fn report_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/", post(handlers::reports::file_report))
        .route("/{id}", get(handlers::reports::get_report))
}

fn admin_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/reports", get(handlers::admin::list_reports))
        .route("/reports/{id}/review", post(handlers::admin::review_report))
        .route("/credits/grant", post(handlers::admin::grant_credits))
        .route_layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ))
}
