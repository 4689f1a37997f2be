//! Authentication middleware and extractor for the REST surface.
//!
//! The middleware validates Bearer tokens through the `TokenVerifier` port
//! and injects the resulting [`Identity`] into request extensions; handlers
//! demand it with the [`RequireIdentity`] extractor. The middleware is
//! provider-agnostic: production wires the JWT verifier, tests wire the
//! mock.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use http::header::AUTHORIZATION;

use crate::domain::foundation::{AuthError, Identity};
use crate::ports::TokenVerifier;

/// Middleware state - the token verifier port.
pub type AuthState = Arc<dyn TokenVerifier>;

/// Validates the `Authorization: Bearer <token>` header.
///
/// A missing header passes through without an identity so public routes
/// keep working; an invalid token is rejected outright.
pub async fn auth_middleware(
    State(verifier): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match token {
        Some(token) => match verifier.verify(token).await {
            Ok(identity) => {
                request.extensions_mut().insert(identity);
                next.run(request).await
            }
            Err(err) => {
                let message = match &err {
                    AuthError::TokenExpired => "Token expired",
                    _ => "Invalid token",
                };
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({
                        "error": message,
                        "code": "AUTH_ERROR"
                    })),
                )
                    .into_response()
            }
        },
        None => next.run(request).await,
    }
}

/// Extractor that requires a verified identity.
#[derive(Debug, Clone)]
pub struct RequireIdentity(pub Identity);

impl<S> axum::extract::FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<Identity>()
                .cloned()
                .map(RequireIdentity)
                .ok_or(AuthRejection::Unauthenticated)
        })
    }
}

/// Rejection for requests without a verified identity.
#[derive(Debug, Clone)]
pub enum AuthRejection {
    Unauthenticated,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let AuthRejection::Unauthenticated = self;
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "Authentication required",
                "code": "UNAUTHENTICATED"
            })),
        )
            .into_response()
    }
}
