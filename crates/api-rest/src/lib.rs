//! # API REST
//!
//! REST API implementation for PhysiHome.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - Session cookies and the mapping of core errors to HTTP statuses
//!
//! Uses `api-shared` for request/response bodies and session tokens.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::dto::{
    ConversationRes, DoctorDocumentsForm, DoctorLicenseReq, DoctorListRes, DoctorLocationReq,
    DoctorRes, DoctorReviewReq, DoctorReviewRes, DoctorSearchQuery, DoctorSignupReq, DocumentRes,
    DocumentsRes, EmailReq, ErrorRes,
    HealthRes, HistoryQuery, HistoryRes, LoginReq, MessageRes, OtpChallengeRes, ProfileRes,
    SendMessageReq, SessionRes, SignupReq, StartConversationReq, StatusRes, ThreadListRes,
    ThreadRes, UpdateProfileReq, UpdateProfileRes, VerifyOtpReq,
};
use api_shared::{token_from_headers, HealthService, SessionTokens};
use physihome_core::{
    AccountService, CoreConfig, DoctorDecision, DoctorDirectory, DoctorQuery, DocumentUpload,
    Mailer, MessagingService, PortalError, ProfileOutcome, StartOutcome, VerifiedSession,
};
use physihome_store::{DocumentKind, Store, UserRecord};

/// Request size accepted by the documents upload route.
const DOCUMENTS_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn Store>,
    accounts: AccountService,
    messaging: MessagingService,
    doctors: DoctorDirectory,
    sessions: SessionTokens,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            accounts: AccountService::new(cfg.clone(), store.clone(), mailer),
            messaging: MessagingService::new(cfg.clone(), store.clone()),
            doctors: DoctorDirectory::new(store.clone()),
            sessions: SessionTokens::new(&cfg),
            store,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        signup,
        doctor_signup,
        resend_otp,
        verify_otp,
        login,
        logout,
        profile,
        update_profile,
        update_doctor_location,
        update_doctor_license,
        update_doctor_documents,
        approve_doctor,
        reject_doctor,
        list_doctors,
        list_threads,
        thread_history,
        send_message,
        mark_read,
        start_conversation,
        admin_thread,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        SignupReq,
        DoctorSignupReq,
        EmailReq,
        VerifyOtpReq,
        LoginReq,
        OtpChallengeRes,
        ProfileRes,
        SessionRes,
        UpdateProfileReq,
        UpdateProfileRes,
        DoctorLocationReq,
        DoctorLicenseReq,
        DoctorDocumentsForm,
        DocumentRes,
        DocumentsRes,
        DoctorReviewReq,
        DoctorReviewRes,
        DoctorRes,
        DoctorListRes,
        MessageRes,
        ThreadRes,
        ThreadListRes,
        HistoryRes,
        SendMessageReq,
        StartConversationReq,
        ConversationRes,
        StatusRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full router, including Swagger UI at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/doctor-signup", post(doctor_signup))
        .route("/api/auth/resend-otp", post(resend_otp))
        .route("/api/auth/verify-otp", post(verify_otp))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/update-profile", post(update_profile))
        .route("/api/auth/doctor/update-location", post(update_doctor_location))
        .route("/api/auth/doctor/update-license", post(update_doctor_license))
        .route(
            "/api/auth/doctor/update-documents",
            post(update_doctor_documents).layer(DefaultBodyLimit::max(DOCUMENTS_BODY_LIMIT)),
        )
        .route("/api/auth/admin/approve-doctor", post(approve_doctor))
        .route("/api/auth/admin/reject-doctor", post(reject_doctor))
        .route("/api/profile", get(profile))
        .route("/api/doctors", get(list_doctors))
        .route("/api/messages/threads", get(list_threads))
        .route(
            "/api/messages/threads/:id",
            get(thread_history).post(send_message),
        )
        .route("/api/messages/threads/:id/read", post(mark_read))
        .route("/api/messages/start", post(start_conversation))
        .route("/api/messages/admin", post(admin_thread))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiError = (StatusCode, Json<ErrorRes>);
type ApiResult<T> = Result<Json<T>, ApiError>;
type WithCookie<T> = ([(HeaderName, String); 1], Json<T>);

fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorRes {
            error: message.into(),
        }),
    )
}

fn api_error(e: PortalError) -> ApiError {
    match e {
        PortalError::Unauthenticated | PortalError::InvalidCredentials => {
            error_body(StatusCode::UNAUTHORIZED, e.to_string())
        }
        PortalError::Forbidden(_) | PortalError::RestrictedDoctor => {
            error_body(StatusCode::FORBIDDEN, e.to_string())
        }
        PortalError::NotFound(msg) => error_body(StatusCode::NOT_FOUND, msg),
        PortalError::InvalidInput(msg) => error_body(StatusCode::BAD_REQUEST, msg),
        PortalError::Email(_) | PortalError::Store(_) | PortalError::Cipher(_) => {
            tracing::error!("request failed: {:?}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// The signed-in user, if the request carries a valid session.
async fn viewer(state: &AppState, headers: &HeaderMap) -> Result<Option<UserRecord>, ApiError> {
    let cookie = headers.get(header::COOKIE).and_then(|v| v.to_str().ok());
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = token_from_headers(state.sessions.cookie_name(), cookie, authorization);
    state
        .sessions
        .resolve(state.store.as_ref(), token, Utc::now())
        .await
        .map_err(api_error)
}

async fn require_viewer(state: &AppState, headers: &HeaderMap) -> Result<UserRecord, ApiError> {
    viewer(state, headers)
        .await?
        .ok_or_else(|| api_error(PortalError::Unauthenticated))
}

fn start_session(
    state: &AppState,
    session: &VerifiedSession,
) -> Result<WithCookie<SessionRes>, ApiError> {
    let token = state
        .sessions
        .issue(&session.user, Utc::now())
        .map_err(api_error)?;
    Ok((
        [(header::SET_COOKIE, state.sessions.session_cookie(&token))],
        Json(SessionRes::from(session)),
    ))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

// ───── Accounts ─────

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupReq,
    responses(
        (status = 200, description = "OTP issued", body = OtpChallengeRes),
        (status = 400, description = "Validation failed", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupReq>,
) -> ApiResult<OtpChallengeRes> {
    let challenge = state
        .accounts
        .signup_patient(req.into())
        .await
        .map_err(api_error)?;
    Ok(Json(challenge.into()))
}

#[utoipa::path(
    post,
    path = "/api/auth/doctor-signup",
    request_body = DoctorSignupReq,
    responses(
        (status = 200, description = "OTP issued; admins notified", body = OtpChallengeRes),
        (status = 400, description = "Validation failed", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn doctor_signup(
    State(state): State<AppState>,
    Json(req): Json<DoctorSignupReq>,
) -> ApiResult<OtpChallengeRes> {
    let challenge = state
        .accounts
        .signup_doctor(req.into())
        .await
        .map_err(api_error)?;
    Ok(Json(challenge.into()))
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-otp",
    request_body = EmailReq,
    responses(
        (status = 200, description = "New OTP issued", body = OtpChallengeRes),
        (status = 400, description = "Already verified", body = ErrorRes),
        (status = 404, description = "Unknown email", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn resend_otp(
    State(state): State<AppState>,
    Json(req): Json<EmailReq>,
) -> ApiResult<OtpChallengeRes> {
    let challenge = state
        .accounts
        .resend_otp(&req.email)
        .await
        .map_err(api_error)?;
    Ok(Json(challenge.into()))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpReq,
    responses(
        (status = 200, description = "Verified; session cookie set", body = SessionRes),
        (status = 400, description = "Missing, expired or incorrect OTP", body = ErrorRes),
        (status = 404, description = "Unknown email", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpReq>,
) -> Result<WithCookie<SessionRes>, ApiError> {
    let session = state
        .accounts
        .verify_otp(&req.email, &req.otp)
        .await
        .map_err(api_error)?;
    start_session(&state, &session)
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = SessionRes),
        (status = 401, description = "Invalid email or password", body = ErrorRes),
        (status = 403, description = "OTP verification incomplete", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> Result<WithCookie<SessionRes>, ApiError> {
    let session = state
        .accounts
        .login(&req.email, &req.password)
        .await
        .map_err(api_error)?;
    start_session(&state, &session)
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cookie cleared", body = StatusRes)
    )
)]
#[axum::debug_handler]
async fn logout(State(state): State<AppState>) -> WithCookie<StatusRes> {
    (
        [(header::SET_COOKIE, state.sessions.clear_cookie())],
        Json(StatusRes {
            status: "logged_out".into(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Current user", body = ProfileRes),
        (status = 401, description = "Not signed in", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn profile(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<ProfileRes> {
    let user = require_viewer(&state, &headers).await?;
    Ok(Json(ProfileRes::from(&user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/update-profile",
    request_body = UpdateProfileReq,
    responses(
        (status = 200, description = "Profile updated, or new email awaiting OTP", body = UpdateProfileRes),
        (status = 400, description = "Validation failed", body = ErrorRes),
        (status = 401, description = "Not signed in", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateProfileReq>,
) -> ApiResult<UpdateProfileRes> {
    let user = require_viewer(&state, &headers).await?;
    let outcome = state
        .accounts
        .update_profile(&user, req.into())
        .await
        .map_err(api_error)?;
    Ok(Json(match outcome {
        ProfileOutcome::Updated(user) => UpdateProfileRes {
            profile: Some(ProfileRes::from(&user)),
            verify_email: None,
        },
        ProfileOutcome::EmailChangePending(challenge) => UpdateProfileRes {
            profile: None,
            verify_email: Some(challenge.into()),
        },
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/doctor/update-location",
    request_body = DoctorLocationReq,
    responses(
        (status = 200, description = "Location updated", body = ProfileRes),
        (status = 400, description = "City and a valid PIN are required", body = ErrorRes),
        (status = 403, description = "Not a doctor", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn update_doctor_location(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DoctorLocationReq>,
) -> ApiResult<ProfileRes> {
    let user = require_viewer(&state, &headers).await?;
    let user = state
        .accounts
        .update_doctor_location(&user, &req.city, &req.preferred_pin)
        .await
        .map_err(api_error)?;
    Ok(Json(ProfileRes::from(&user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/doctor/update-license",
    request_body = DoctorLicenseReq,
    responses(
        (status = 200, description = "License updated", body = ProfileRes),
        (status = 400, description = "License is required", body = ErrorRes),
        (status = 403, description = "Not a doctor", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn update_doctor_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DoctorLicenseReq>,
) -> ApiResult<ProfileRes> {
    let user = require_viewer(&state, &headers).await?;
    let user = state
        .accounts
        .update_doctor_license(&user, &req.license)
        .await
        .map_err(api_error)?;
    Ok(Json(ProfileRes::from(&user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/doctor/update-documents",
    request_body(content = DoctorDocumentsForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Documents stored and sent to admins", body = DocumentsRes),
        (status = 400, description = "No non-empty document was uploaded", body = ErrorRes),
        (status = 403, description = "Not a doctor", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn update_doctor_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut form: Multipart,
) -> ApiResult<DocumentsRes> {
    let user = require_viewer(&state, &headers).await?;
    let mut uploads = Vec::new();
    while let Some(field) = form.next_field().await.map_err(bad_multipart)? {
        // Unknown parts are skipped.
        let Some(kind) = field.name().and_then(DocumentKind::parse) else {
            continue;
        };
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(bad_multipart)?;
        uploads.push(DocumentUpload {
            kind,
            filename,
            content_type,
            data: data.to_vec(),
        });
    }
    let outcome = state
        .accounts
        .update_doctor_documents(&user, uploads)
        .await
        .map_err(api_error)?;
    Ok(Json(DocumentsRes::from(outcome)))
}

fn bad_multipart(e: MultipartError) -> ApiError {
    error_body(e.status(), e.body_text())
}

#[utoipa::path(
    post,
    path = "/api/auth/admin/approve-doctor",
    request_body = DoctorReviewReq,
    responses(
        (status = 200, description = "Doctor verified", body = DoctorReviewRes),
        (status = 403, description = "Not an admin", body = ErrorRes),
        (status = 404, description = "Doctor not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn approve_doctor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DoctorReviewReq>,
) -> ApiResult<DoctorReviewRes> {
    review_doctor(&state, &headers, &req.user_id, DoctorDecision::Approve).await
}

#[utoipa::path(
    post,
    path = "/api/auth/admin/reject-doctor",
    request_body = DoctorReviewReq,
    responses(
        (status = 200, description = "Doctor rejected", body = DoctorReviewRes),
        (status = 403, description = "Not an admin", body = ErrorRes),
        (status = 404, description = "Doctor not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn reject_doctor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DoctorReviewReq>,
) -> ApiResult<DoctorReviewRes> {
    review_doctor(&state, &headers, &req.user_id, DoctorDecision::Reject).await
}

async fn review_doctor(
    state: &AppState,
    headers: &HeaderMap,
    doctor_id: &str,
    decision: DoctorDecision,
) -> ApiResult<DoctorReviewRes> {
    let admin = require_viewer(state, headers).await?;
    state
        .accounts
        .set_doctor_verification(&admin, doctor_id, decision)
        .await
        .map_err(api_error)?;
    let status = match decision {
        DoctorDecision::Approve => "approved",
        DoctorDecision::Reject => "rejected",
    };
    Ok(Json(DoctorReviewRes {
        status: status.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/doctors",
    params(DoctorSearchQuery),
    responses(
        (status = 200, description = "Verified doctors, nearest first", body = DoctorListRes)
    )
)]
#[axum::debug_handler]
async fn list_doctors(
    State(state): State<AppState>,
    Query(query): Query<DoctorSearchQuery>,
) -> ApiResult<DoctorListRes> {
    let query = DoctorQuery {
        pin: query.pin,
        city: query.city,
        specialization: query.specialization,
    };
    let doctors = state.doctors.search(&query).await.map_err(api_error)?;
    Ok(Json(DoctorListRes {
        doctors: doctors.into_iter().map(DoctorRes::from).collect(),
    }))
}

// ───── Messaging ─────

#[utoipa::path(
    get,
    path = "/api/messages/threads",
    responses(
        (status = 200, description = "Inbox, most recent first", body = ThreadListRes),
        (status = 401, description = "Not signed in", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn list_threads(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<ThreadListRes> {
    let viewer = require_viewer(&state, &headers).await?;
    let threads = state
        .messaging
        .list_threads(Some(&viewer))
        .await
        .map_err(api_error)?;
    Ok(Json(ThreadListRes {
        threads: threads
            .iter()
            .map(|t| ThreadRes::for_viewer(t, &viewer.id))
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/messages/threads/{id}",
    params(
        ("id" = String, Path, description = "Conversation id"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Messages; the thread is marked read", body = HistoryRes),
        (status = 401, description = "Not signed in", body = ErrorRes),
        (status = 403, description = "Not a participant, or restricted", body = ErrorRes),
        (status = 404, description = "Conversation not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn thread_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryRes> {
    let viewer = require_viewer(&state, &headers).await?;
    let since = match query.since.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| {
                    api_error(PortalError::InvalidInput(
                        "since must be an RFC 3339 timestamp".into(),
                    ))
                })?,
        ),
        None => None,
    };

    let history = state
        .messaging
        .fetch_history(Some(&viewer), &id, since)
        .await
        .map_err(api_error)?;
    Ok(Json(HistoryRes {
        conversation_id: history.conversation_id.to_string(),
        display_name: history.display_name,
        is_admin_thread: history.is_admin_thread,
        messages: history
            .messages
            .iter()
            .map(|m| MessageRes::for_viewer(m, &viewer.id))
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/messages/threads/{id}",
    params(("id" = String, Path, description = "Conversation id")),
    request_body = SendMessageReq,
    responses(
        (status = 200, description = "Message stored", body = MessageRes),
        (status = 400, description = "Empty message", body = ErrorRes),
        (status = 403, description = "Not a participant, or restricted", body = ErrorRes),
        (status = 404, description = "Conversation not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<SendMessageReq>,
) -> ApiResult<MessageRes> {
    let viewer = require_viewer(&state, &headers).await?;
    let message = state
        .messaging
        .send(Some(&viewer), &id, &req.body)
        .await
        .map_err(api_error)?;
    Ok(Json(MessageRes::for_viewer(&message, &viewer.id)))
}

#[utoipa::path(
    post,
    path = "/api/messages/threads/{id}/read",
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Marked read", body = StatusRes),
        (status = 403, description = "Not a participant, or restricted", body = ErrorRes),
        (status = 404, description = "Conversation not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusRes> {
    let viewer = viewer(&state, &headers).await?;
    state
        .messaging
        .mark_read(viewer.as_ref(), &id)
        .await
        .map_err(api_error)?;
    Ok(Json(StatusRes {
        status: "read".into(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/messages/start",
    request_body = StartConversationReq,
    responses(
        (status = 200, description = "Conversation to open", body = ConversationRes),
        (status = 400, description = "Cannot message yourself", body = ErrorRes),
        (status = 404, description = "User not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn start_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StartConversationReq>,
) -> ApiResult<ConversationRes> {
    let viewer = viewer(&state, &headers).await?;
    let outcome = state
        .messaging
        .start_conversation(viewer.as_ref(), &req.user_id)
        .await
        .map_err(api_error)?;
    Ok(Json(match outcome {
        StartOutcome::Direct(id) => ConversationRes {
            conversation_id: Some(id.to_string()),
            redirected: false,
        },
        StartOutcome::AdminThread(id) => ConversationRes {
            conversation_id: Some(id.to_string()),
            redirected: true,
        },
        StartOutcome::NoAdminAvailable => ConversationRes {
            conversation_id: None,
            redirected: true,
        },
    }))
}

#[utoipa::path(
    post,
    path = "/api/messages/admin",
    responses(
        (status = 200, description = "Admin broadcast conversation, absent when no admin exists", body = ConversationRes),
        (status = 400, description = "Admins have no admin thread", body = ErrorRes),
        (status = 401, description = "Not signed in", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn admin_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<ConversationRes> {
    let viewer = viewer(&state, &headers).await?;
    let id = state
        .messaging
        .admin_thread(viewer.as_ref())
        .await
        .map_err(api_error)?;
    Ok(Json(ConversationRes {
        conversation_id: id.map(|id| id.to_string()),
        redirected: false,
    }))
}
