//! Job submission and status routes

mod status;
mod submit;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::middleware::rate_limit;
use crate::routes::AppState;

// Re-export public items (including utoipa path types)
pub use status::*;
pub use submit::*;

pub fn router(state: AppState) -> Router {
    let limiter = rate_limit::create_rate_limiter(state.config.submit_rate_limit);

    let submit_routes = Router::new()
        .route("/submit", post(submit_job))
        .route_layer(middleware::from_fn(move |req, next| {
            let limiter = limiter.clone();
            async move { rate_limit::rate_limit_middleware(limiter, req, next).await }
        }));

    #[cfg(feature = "jwt-auth")]
    let submit_routes = {
        use crate::middleware::auth::{self, AuthState};

        let auth_state = AuthState::new(state.config.jwt_secret.as_deref());
        submit_routes.route_layer(middleware::from_fn_with_state(
            auth_state,
            auth::token_required,
        ))
    };

    Router::new()
        .merge(submit_routes)
        .route("/status/:job_id", get(get_job_status))
        .with_state(state)
}
