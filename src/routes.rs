// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, exam, results},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, exams, results, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, exam core).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        // Protected auth routes
        .merge(
            Router::new()
                .route("/password", put(auth::change_password))
                .layer(auth_layer.clone()),
        );

    let exam_routes = Router::new()
        .route("/", get(exam::list_exams))
        .route("/{category}", get(exam::get_exam))
        .route("/{category}/start", post(exam::start_exam))
        .route("/{category}/answers", put(exam::save_answers))
        .route("/{category}/answers/{question_id}", put(exam::save_answer))
        .route("/{category}/submit", post(exam::submit_exam))
        .layer(auth_layer.clone());

    let result_routes = Router::new()
        .route("/me", get(results::my_results))
        .layer(auth_layer.clone());

    let admin_routes = Router::new()
        .route("/users", post(admin::create_user))
        .route("/schedules", get(admin::list_schedules))
        .route(
            "/schedules/{category}",
            put(admin::upsert_schedule).delete(admin::delete_schedule),
        )
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route("/questions/{id}", axum::routing::delete(admin::delete_question))
        .route("/results", get(admin::list_results))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth_layer);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/results", result_routes)
        .nest("/api/admin", admin_routes)
        // Global middleware: the last layer is outermost, so CORS wraps Trace
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
