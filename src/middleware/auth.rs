use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::error::AppError;

/// Stato per il middleware JWT
#[derive(Clone)]
pub struct AuthState {
    key: Option<Arc<DecodingKey>>,
}

impl AuthState {
    /// Senza segreto il controllo è disattivato
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret.map(|s| Arc::new(DecodingKey::from_secret(s.as_bytes()))),
        }
    }
}

/// Middleware che richiede un token JWT HS256 valido
///
/// Il token va passato come `Authorization: Bearer <token>`.
/// `exp` viene verificato solo se presente nel token.
pub async fn token_required(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(key) = state.key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_whitespace().nth(1))
        .ok_or_else(|| AppError::Unauthorized("token di autorizzazione mancante".to_string()))?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();

    decode::<serde_json::Value>(token, key, &validation).map_err(|e| {
        tracing::debug!("Token JWT rifiutato: {}", e);
        AppError::Unauthorized("token di autenticazione non valido".to_string())
    })?;

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    fn app(secret: Option<&str>) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(
                AuthState::new(secret),
                token_required,
            ))
    }

    fn token(secret: &str, claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    async fn call(app: Router, auth: Option<String>) -> StatusCode {
        let mut req = Request::builder().uri("/");
        if let Some(value) = auth {
            req = req.header(header::AUTHORIZATION, value);
        }
        app.oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_disabled_without_secret() {
        assert_eq!(call(app(None), None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token() {
        assert_eq!(call(app(Some(SECRET)), None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token_without_exp() {
        let t = token(SECRET, json!({"sub": "dashboard"}));
        assert_eq!(
            call(app(Some(SECRET)), Some(format!("Bearer {}", t))).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_wrong_secret_and_expired() {
        let t = token("other", json!({"sub": "dashboard"}));
        assert_eq!(
            call(app(Some(SECRET)), Some(format!("Bearer {}", t))).await,
            StatusCode::UNAUTHORIZED
        );

        let expired = token(SECRET, json!({"exp": 1_000_000}));
        assert_eq!(
            call(app(Some(SECRET)), Some(format!("Bearer {}", expired))).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
