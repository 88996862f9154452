mod handlers;

use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::db::Database;

pub fn create_router(db: Database) -> Router {
    Router::new()
        // Lists (by list id)
        .route(
            "/list/{list_id}",
            get(handlers::get_list)
                .put(handlers::put_list)
                .delete(handlers::delete_list)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .route("/lists", get(handlers::list_lists))
        // Health
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(db)
}

/// Any origin may read and write lists; list ids are the only access control.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
