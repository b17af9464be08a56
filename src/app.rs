use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, MethodRouter},
    Extension, Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{protected, public};
use crate::middleware::session_auth_middleware;
use crate::schema::SchemaDescriptor;
use crate::state::AppState;
use crate::types::Operation;

/// Builds the full router: public routes, session-guarded routes and one
/// generic entity route per schema descriptor.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config.security);

    Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .route("/auth/login", post(public::auth::login))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    let mut router = Router::new()
        .route("/api/auth/whoami", get(protected::auth::whoami))
        .route("/api/auth/logout", post(protected::auth::logout))
        .route("/api/schemas", get(protected::schemas::list))
        .route("/api/schemas/:slug", get(protected::schemas::get))
        .route("/api/users", get(protected::users::list).post(protected::users::create))
        .route("/api/lookups/:slug/:field", get(protected::lookups::options));

    for descriptor in state.catalog.iter() {
        tracing::debug!(slug = %descriptor.slug, endpoint = %descriptor.endpoint, "Mounting entity route");
        router = router.route(&descriptor.endpoint, entity_route(descriptor.clone()));
    }

    // route_layer: unmatched paths still 404 instead of 403
    router.route_layer(middleware::from_fn_with_state(state.clone(), session_auth_middleware))
}

/// GET always; POST, PUT and DELETE only when the descriptor offers them.
fn entity_route(descriptor: Arc<SchemaDescriptor>) -> MethodRouter<AppState> {
    use protected::entity;

    let mut route = get(entity::list);
    if descriptor.offers(Operation::Create) {
        route = route.post(entity::create);
    }
    if descriptor.offers(Operation::Update) {
        route = route.put(entity::update);
    }
    if descriptor.offers(Operation::Delete) {
        route = route.delete(entity::delete);
    }
    route.layer(Extension(descriptor))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}
