//! REST surface for the consultation lifecycle.
//!
//! Routes (mounted under `/api`):
//!
//! - `POST /consultations` - create a pending request (students)
//! - `POST /consultations/:id/accept` - accept (assigned expert or admin)
//! - `POST /consultations/:id/reject` - reject (assigned expert or admin)
//! - `POST /consultations/:id/cancel` - cancel (admin)
//! - `POST /sessions/:id/messages` - append a message (participants)
//! - `POST /sessions/:id/complete` - end the session (participants or admin)
//!
//! All routes require a verified identity; the realtime side effects
//! (status pushes, room auto-joins, notifications) ride on the lifecycle
//! manager.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::application::ConsultationLifecycle;
use crate::domain::consultation::ConsultationType;
use crate::domain::foundation::{
    ConsultationRequestId, ConsultationSessionId, GatewayError, UserId,
};

use super::auth::RequireIdentity;
use super::error::ApiError;

/// Shared state for consultation endpoints.
#[derive(Clone)]
pub struct ConsultationApiState {
    pub lifecycle: Arc<ConsultationLifecycle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsultationBody {
    pub expert_id: String,
    pub topic: String,
    pub description: String,
    pub consultation_type: ConsultationType,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub content: String,
}

async fn create_consultation(
    State(state): State<ConsultationApiState>,
    RequireIdentity(identity): RequireIdentity,
    Json(body): Json<CreateConsultationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let expert_id = UserId::new(&body.expert_id).ok_or(GatewayError::NotFound("Expert"))?;
    let request = state
        .lifecycle
        .create_request(
            &identity,
            expert_id,
            body.topic,
            body.description,
            body.consultation_type,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn accept_consultation(
    State(state): State<ConsultationApiState>,
    RequireIdentity(identity): RequireIdentity,
    Path(request_id): Path<ConsultationRequestId>,
) -> Result<impl IntoResponse, ApiError> {
    let (request, session) = state.lifecycle.accept(&identity, &request_id).await?;
    Ok(Json(serde_json::json!({
        "request": request,
        "session": session,
    })))
}

async fn reject_consultation(
    State(state): State<ConsultationApiState>,
    RequireIdentity(identity): RequireIdentity,
    Path(request_id): Path<ConsultationRequestId>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state.lifecycle.reject(&identity, &request_id).await?;
    Ok(Json(request))
}

async fn cancel_consultation(
    State(state): State<ConsultationApiState>,
    RequireIdentity(identity): RequireIdentity,
    Path(request_id): Path<ConsultationRequestId>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state.lifecycle.cancel(&identity, &request_id).await?;
    Ok(Json(request))
}

async fn send_session_message(
    State(state): State<ConsultationApiState>,
    RequireIdentity(identity): RequireIdentity,
    Path(session_id): Path<ConsultationSessionId>,
    Json(body): Json<SendMessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .lifecycle
        .send_message(&identity, &session_id, body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn complete_session(
    State(state): State<ConsultationApiState>,
    RequireIdentity(identity): RequireIdentity,
    Path(session_id): Path<ConsultationSessionId>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.lifecycle.complete(&identity, &session_id).await?;
    Ok(Json(session))
}

/// Router for `/consultations`.
pub fn consultation_routes() -> Router<ConsultationApiState> {
    Router::new()
        .route("/", post(create_consultation))
        .route("/:id/accept", post(accept_consultation))
        .route("/:id/reject", post(reject_consultation))
        .route("/:id/cancel", post(cancel_consultation))
}

/// Router for `/sessions`.
pub fn session_routes() -> Router<ConsultationApiState> {
    Router::new()
        .route("/:id/messages", post(send_session_message))
        .route("/:id/complete", post(complete_session))
}

/// Combined consultation API router, suitable for nesting under `/api`.
pub fn consultation_router() -> Router<ConsultationApiState> {
    Router::new()
        .nest("/consultations", consultation_routes())
        .nest("/sessions", session_routes())
}
