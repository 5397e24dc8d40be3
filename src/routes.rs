// src/routes.rs

use axum::{
    Router, http::Method,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{auth, exercise, simulation};
use crate::state::AppState;

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, exercise, simulation).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store handle + simulation engine).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let exercise_routes = Router::new()
        .route("/{category}/questions/{index}", get(exercise::get_question))
        .route(
            "/{category}/questions/{index}/answer",
            post(exercise::submit_answer),
        )
        .route("/{category}/progress", get(exercise::get_progress));

    let simulation_routes = Router::new()
        .route(
            "/{id}/session",
            post(simulation::open_session)
                .get(simulation::get_session)
                .delete(simulation::close_session),
        )
        .route(
            "/{id}/subtests/{subtest}/questions/{index}",
            get(simulation::get_question),
        )
        .route("/{id}/select", post(simulation::select_answer))
        .route("/{id}/advance", post(simulation::advance))
        .route("/{id}/retreat", post(simulation::retreat))
        .route(
            "/{id}/subtests/{subtest}/progress",
            get(simulation::get_progress),
        )
        .route("/{id}/result", get(simulation::get_result));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/exercise", exercise_routes)
        .nest("/api/simulations", simulation_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
