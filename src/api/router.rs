//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Operational routes are nested under `/api/`; the bare origin serves a
//! self-describing document.
//!
//! Middleware uses `Extension<ApiContext>` (injected as the outermost
//! layer). Endpoint handlers use `State<ApiContext>` via `with_state`.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Build the full API router.
///
/// Every `/api` route passes through the auth middleware, which resolves
/// the caller to a principal (service, user, or anonymous). Route-level
/// requirements beyond identification live in the handlers.
pub fn api_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route(
            "/photo-analysis",
            post(endpoints::photo_analysis::analyze).get(endpoints::photo_analysis::list),
        )
        .route(
            "/diagnosis",
            post(endpoints::diagnosis::synthesize).get(endpoints::diagnosis::list),
        )
        .route("/reports", get(endpoints::reports::summary))
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::authenticate))
        // Extension must be outermost so the middleware can extract ApiContext.
        .layer(axum::Extension(ctx));

    Router::new()
        .route("/", get(endpoints::health::service_doc))
        .nest("/api", api)
        .layer(CorsLayer::permissive())
}
