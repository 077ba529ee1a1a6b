use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::exchange::JobExchange;
use crate::session::{Actor, ChecklistProgress, Evaluation, JobSession};
use crate::store::SessionFilter;
use crate::template::JobTemplate;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
}

impl ApiState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Error returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    BadRequest(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

pub fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::AlreadyTaken { .. }
        | EngineError::ExchangeTaken { .. }
        | EngineError::InvalidTransition { .. }
        | EngineError::ExchangePending(_)
        | EngineError::TemplateInUse(_)
        | EngineError::TemplateExists(_) => StatusCode::CONFLICT,
        EngineError::InvalidWindowSpec(_)
        | EngineError::InvalidDecision(_)
        | EngineError::ChecklistIncomplete { .. }
        | EngineError::InvalidEvaluation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::NotAssignee { .. } => StatusCode::FORBIDDEN,
        EngineError::SessionNotFound(_)
        | EngineError::TemplateNotFound(_)
        | EngineError::ExchangeNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::StoreFull(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Serialization(_) => StatusCode::BAD_REQUEST,
        EngineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Engine(e) => (
                status_for(&e),
                ErrorBody {
                    error: e.code().to_string(),
                    message: e.to_string(),
                },
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "bad_request".to_string(),
                    message,
                },
            ),
        };
        if status.is_server_error() {
            tracing::error!(status = %status, message = %body.message, "Request failed");
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize, Deserialize)]
pub struct CreateTemplateResponse {
    pub template_id: Uuid,
    pub sessions: Vec<JobSession>,
}

#[derive(Serialize, Deserialize)]
pub struct DeleteTemplateResponse {
    pub removed_sessions: usize,
}

#[derive(Deserialize)]
struct EmployeeRequest {
    employee_id: Uuid,
}

#[derive(Deserialize)]
struct ReleaseRequest {
    employee_id: Option<Uuid>,
    employer_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct RefuseRequest {
    #[serde(default)]
    note: Option<String>,
}

#[derive(Deserialize)]
struct EvaluateRequest {
    rating: u8,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Deserialize)]
struct PostExchangeRequest {
    session_id: Uuid,
    employee_id: Uuid,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct DecideRequest {
    employer_id: Uuid,
    approve: bool,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/templates", post(create_template_handler))
        .route(
            "/api/templates/:id",
            get(get_template_handler).delete(delete_template_handler),
        )
        .route("/api/templates/:id/regenerate", post(regenerate_handler))
        .route("/api/sessions", get(list_sessions_handler))
        .route("/api/sessions/:id", get(get_session_handler))
        .route("/api/sessions/:id/claim", post(claim_handler))
        .route("/api/sessions/:id/release", post(release_handler))
        .route("/api/sessions/:id/approve", post(approve_handler))
        .route("/api/sessions/:id/refuse", post(refuse_handler))
        .route("/api/sessions/:id/start", post(start_handler))
        .route("/api/sessions/:id/complete", post(complete_handler))
        .route("/api/sessions/:id/cancel", post(cancel_handler))
        .route("/api/sessions/:id/evaluate", post(evaluate_handler))
        .route("/api/sessions/:id/skip", post(skip_handler))
        .route("/api/sessions/:id/exchanges", get(session_exchanges_handler))
        .route("/api/employees/:id/marketplace", get(marketplace_handler))
        .route("/api/exchanges", post(post_exchange_handler))
        .route("/api/exchanges/:id", get(get_exchange_handler))
        .route("/api/exchanges/:id/respond", post(respond_handler))
        .route("/api/exchanges/:id/decide", post(decide_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    state: ApiState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Starting API server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_template_handler(
    State(state): State<ApiState>,
    Json(template): Json<JobTemplate>,
) -> Result<(StatusCode, Json<CreateTemplateResponse>), ApiError> {
    let template_id = template.id;
    let sessions = state.engine.create_template(template).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateTemplateResponse {
            template_id,
            sessions,
        }),
    ))
}

async fn get_template_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<JobTemplate> {
    Ok(Json(state.engine.template(id).await?))
}

async fn delete_template_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeleteTemplateResponse> {
    let removed_sessions = state.engine.delete_template(id).await?;
    Ok(Json(DeleteTemplateResponse { removed_sessions }))
}

async fn regenerate_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(mut template): Json<JobTemplate>,
) -> ApiResult<Vec<JobSession>> {
    template.id = id;
    Ok(Json(state.engine.regenerate_sessions(template).await?))
}

async fn list_sessions_handler(
    State(state): State<ApiState>,
    Query(filter): Query<SessionFilter>,
) -> ApiResult<Vec<JobSession>> {
    Ok(Json(state.engine.list_sessions(&filter).await?))
}

async fn get_session_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<JobSession> {
    Ok(Json(state.engine.session(id).await?))
}

async fn claim_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EmployeeRequest>,
) -> ApiResult<JobSession> {
    Ok(Json(state.engine.claim_session(id, req.employee_id).await?))
}

async fn release_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReleaseRequest>,
) -> ApiResult<JobSession> {
    let actor = match (req.employee_id, req.employer_id) {
        (Some(employee), None) => Actor::Employee(employee),
        (None, Some(employer)) => Actor::Employer(employer),
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of employee_id or employer_id is required".to_string(),
            ))
        }
    };
    Ok(Json(state.engine.release_claim(id, actor).await?))
}

async fn approve_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<JobSession> {
    Ok(Json(state.engine.approve_session(id).await?))
}

async fn refuse_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RefuseRequest>,
) -> ApiResult<JobSession> {
    Ok(Json(state.engine.refuse_session(id, req.note).await?))
}

async fn start_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<JobSession> {
    Ok(Json(state.engine.start_session(id).await?))
}

async fn complete_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(checklist): Json<ChecklistProgress>,
) -> ApiResult<JobSession> {
    Ok(Json(state.engine.complete_session(id, checklist).await?))
}

async fn cancel_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<JobSession> {
    Ok(Json(state.engine.cancel_session(id).await?))
}

async fn evaluate_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EvaluateRequest>,
) -> ApiResult<JobSession> {
    let evaluation = Evaluation::new(req.rating, req.comment);
    Ok(Json(state.engine.evaluate_session(id, evaluation).await?))
}

async fn skip_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EmployeeRequest>,
) -> Result<StatusCode, ApiError> {
    state.engine.skip_session(id, req.employee_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn session_exchanges_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<JobExchange>> {
    Ok(Json(state.engine.exchanges_for_session(id).await?))
}

async fn marketplace_handler(
    State(state): State<ApiState>,
    Path(employee_id): Path<Uuid>,
) -> ApiResult<Vec<JobSession>> {
    Ok(Json(state.engine.marketplace(employee_id).await?))
}

async fn post_exchange_handler(
    State(state): State<ApiState>,
    Json(req): Json<PostExchangeRequest>,
) -> Result<(StatusCode, Json<JobExchange>), ApiError> {
    let exchange = state
        .engine
        .post_exchange(req.session_id, req.employee_id, req.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(exchange)))
}

async fn get_exchange_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<JobExchange> {
    Ok(Json(state.engine.exchange(id).await?))
}

async fn respond_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EmployeeRequest>,
) -> ApiResult<JobExchange> {
    Ok(Json(
        state.engine.respond_to_exchange(id, req.employee_id).await?,
    ))
}

async fn decide_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DecideRequest>,
) -> ApiResult<JobExchange> {
    Ok(Json(
        state
            .engine
            .decide_exchange(id, req.employer_id, req.approve)
            .await?,
    ))
}
