use axum::{
    Extension, Router,
    extract::{DefaultBodyLimit, Request, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    middleware::{Next, from_fn, from_fn_with_state},
    response::{Json, Response},
    routing::{get, post},
};
use health_flow::{
    BloodReportOutcome, BloodReportRequest, Capability, ChatReply, ChatRequest, ExtractionError,
    FlowError, HealthAssistant, HospitalSearchRequest, HospitalSearchResult, SkinAnalysis,
    SkinAnalysisRequest,
};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::auth::{AuthError, SessionRegistry, StoredUser, User, UserStore};
use crate::models::{CurrentSession, LoginRequest, LoginResponse, SignupRequest};

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn error_response(status: StatusCode, message: &str, kind: &str, details: &str) -> ApiError {
    (
        status,
        Json(json!({
            "error": message,
            "kind": kind,
            "details": details
        })),
    )
}

fn bad_request_error(message: &str) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, message, "bad_request", "")
}

fn body_rejection_error(rejection: JsonRejection) -> ApiError {
    warn!("Rejected request body: {}", rejection.body_text());
    error_response(
        rejection.status(),
        "Invalid request body",
        "invalid_body",
        &rejection.body_text(),
    )
}

fn unauthorized_error() -> ApiError {
    error_response(
        StatusCode::UNAUTHORIZED,
        "Authentication required",
        "unauthorized",
        "",
    )
}

fn auth_error(err: &AuthError) -> ApiError {
    match err {
        AuthError::EmailTaken => {
            error_response(StatusCode::CONFLICT, &err.to_string(), "email_taken", "")
        }
        AuthError::InvalidCredentials => error_response(
            StatusCode::UNAUTHORIZED,
            &err.to_string(),
            "invalid_credentials",
            "",
        ),
        AuthError::Unauthorized => unauthorized_error(),
        AuthError::Invalid(reason) => error_response(
            StatusCode::BAD_REQUEST,
            "Invalid signup details",
            "invalid_signup",
            reason,
        ),
        AuthError::Store(e) => {
            error!("User store failure: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "User store unavailable",
                "store_error",
                &e.to_string(),
            )
        }
    }
}

fn flow_error(err: &FlowError) -> ApiError {
    let (status, message) = match err {
        FlowError::Extraction(ExtractionError::Decode(_)) => {
            (StatusCode::BAD_REQUEST, "The uploaded file could not be decoded")
        }
        FlowError::Extraction(ExtractionError::UnsupportedFormat(_)) => (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "The uploaded file type is not supported",
        ),
        FlowError::Extraction(ExtractionError::Extraction(_)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "No text could be read from the document",
        ),
        FlowError::Generation(_) => (
            StatusCode::BAD_GATEWAY,
            "The AI service did not return a usable answer",
        ),
        FlowError::Render(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to prepare the request",
        ),
    };
    error_response(status, message, err.kind(), &err.to_string())
}

fn timeout_error(capability: Capability, timeout: Duration) -> ApiError {
    error_response(
        StatusCode::GATEWAY_TIMEOUT,
        "The AI service took too long to respond",
        "timeout",
        &format!("{capability} exceeded {}s", timeout.as_secs_f32()),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub assistant: HealthAssistant,
    pub users: Arc<dyn UserStore>,
    pub sessions: SessionRegistry,
    pub generation_timeout: Duration,
    pub max_upload_bytes: usize,
}

pub fn build_router(app_state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(current_user))
        .route("/blood-report/analyze", post(analyze_blood_report))
        .route("/skin-analysis/analyze", post(analyze_skin))
        .route("/chat", post(chat))
        .route("/hospitals/search", post(search_hospitals))
        .route_layer(from_fn_with_state(app_state.clone(), require_session));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .merge(protected)
        .layer(DefaultBodyLimit::max(app_state.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state)
}

/// Tag every request with a correlation id (reusing the caller's if sent)
/// and run it inside an `http_request` span.
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let header_value = HeaderValue::from_str(&correlation_id).ok();
    if let Some(value) = &header_value {
        request
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(unauthorized_error)?
        .to_string();

    let user = state.sessions.resolve(&token).ok_or_else(|| {
        warn!("Rejected request with unknown session token");
        unauthorized_error()
    })?;

    request
        .extensions_mut()
        .insert(CurrentSession { token, user });
    Ok(next.run(request).await)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Health Assistant Service",
        "version": "1.0.0",
        "description": "Blood report and skin photo analysis, health chat and hospital search",
        "endpoints": {
            "POST /auth/signup": "Create an account",
            "POST /auth/login": "Log in and receive a bearer token",
            "POST /auth/logout": "End the current session",
            "GET /auth/me": "Current user",
            "POST /blood-report/analyze": "Analyze a blood report PDF (data URI)",
            "POST /skin-analysis/analyze": "Analyze a skin photo (data URI)",
            "POST /chat": "Ask the health assistant a question",
            "POST /hospitals/search": "Find hospitals in a city",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let Json(request) = payload.map_err(body_rejection_error)?;
    let stored = StoredUser::new(&request.email, &request.password, &request.display_name)
        .map_err(|e| auth_error(&e))?;
    let user = stored.user.clone();

    state.users.put(stored).await.map_err(|e| {
        info!("Signup rejected for {}: {}", user.email, e);
        auth_error(&e)
    })?;

    info!(uid = %user.uid, "Account created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload.map_err(body_rejection_error)?;
    let user = state
        .users
        .verify(&request.email, &request.password)
        .await
        .map_err(|e| auth_error(&e))?;

    let token = state.sessions.issue(user.clone());
    info!(uid = %user.uid, "User logged in");
    Ok(Json(LoginResponse { token, user }))
}

async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> StatusCode {
    state.sessions.revoke(&session.token);
    info!(uid = %session.user.uid, "User logged out");
    StatusCode::NO_CONTENT
}

async fn current_user(Extension(session): Extension<CurrentSession>) -> Json<User> {
    Json(session.user)
}

async fn analyze_blood_report(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    payload: Result<Json<BloodReportRequest>, JsonRejection>,
) -> ApiResult<BloodReportOutcome> {
    let Json(request) = payload.map_err(body_rejection_error)?;
    info!(uid = %session.user.uid, "Blood report analysis requested");
    if request.pdf_data_uri.trim().is_empty() && request.extracted_text.is_none() {
        return Err(bad_request_error("pdfDataUri is required"));
    }

    run_capability(
        &state,
        Capability::BloodReport,
        state.assistant.analyze_blood_report(request),
    )
    .await
}

async fn analyze_skin(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    payload: Result<Json<SkinAnalysisRequest>, JsonRejection>,
) -> ApiResult<SkinAnalysis> {
    let Json(request) = payload.map_err(body_rejection_error)?;
    info!(uid = %session.user.uid, "Skin analysis requested");
    if request.photo_data_uri.trim().is_empty() {
        return Err(bad_request_error("photoDataUri is required"));
    }

    run_capability(
        &state,
        Capability::SkinAnalysis,
        state.assistant.analyze_skin(request),
    )
    .await
}

async fn chat(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatReply> {
    let Json(request) = payload.map_err(body_rejection_error)?;
    info!(uid = %session.user.uid, "Chat message received");
    if request.message.trim().is_empty() {
        return Err(bad_request_error("Message cannot be empty"));
    }

    run_capability(&state, Capability::Chat, state.assistant.chat(request)).await
}

async fn search_hospitals(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    payload: Result<Json<HospitalSearchRequest>, JsonRejection>,
) -> ApiResult<HospitalSearchResult> {
    let Json(request) = payload.map_err(body_rejection_error)?;
    info!(uid = %session.user.uid, query = %request.query, "Hospital search requested");
    if request.query.trim().is_empty() {
        return Err(bad_request_error("Query cannot be empty"));
    }

    run_capability(
        &state,
        Capability::HospitalSearch,
        state.assistant.find_hospitals(request),
    )
    .await
}

/// Await one capability call under the configured timeout.
async fn run_capability<T>(
    state: &AppState,
    capability: Capability,
    call: impl Future<Output = health_flow::Result<T>>,
) -> ApiResult<T> {
    match tokio::time::timeout(state.generation_timeout, call).await {
        Ok(Ok(output)) => {
            info!(%capability, "Capability completed");
            Ok(Json(output))
        }
        Ok(Err(e)) => {
            error!(%capability, kind = e.kind(), "Capability failed: {}", e);
            Err(flow_error(&e))
        }
        Err(_) => {
            warn!(%capability, timeout_secs = state.generation_timeout.as_secs(), "Capability timed out");
            Err(timeout_error(capability, state.generation_timeout))
        }
    }
}
