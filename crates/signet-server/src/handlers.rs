//! HTTP handlers and routing.
//!
//! The web surface of the demo client:
//!
//! - `GET /` — landing page; redirects to the dashboard when signed in
//! - `GET /auth/login` — starts a flow and redirects to the provider
//! - `GET /auth/callback` — the provider's redirect target
//! - `GET|POST /auth/logout` — signs out and returns to the landing page
//! - `GET /dashboard` — profile page, gated by the route guard
//! - `GET /api/session` — flow state and profile as JSON for the UI
//! - `GET /healthz` — liveness probe

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use signet_rp::error::FlowError;
use signet_rp::flow::{CallbackParams, FlowState};
use signet_rp::profile::Profile;
use tower_http::trace::TraceLayer;

use crate::pages;
use crate::state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/dashboard", get(dashboard))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_authenticated,
        ));

    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .route("/auth/logout", get(logout).post(logout))
        .route("/api/session", get(session_info))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Route guard: unauthenticated requests are sent to the landing page.
pub async fn require_authenticated(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.controller.is_authenticated() {
        next.run(request).await
    } else {
        tracing::debug!(path = %request.uri().path(), "Redirecting unauthenticated request");
        Redirect::to("/").into_response()
    }
}

/// Landing page.
pub async fn index(State(state): State<AppState>) -> Response {
    if state.controller.is_authenticated() {
        return Redirect::to("/dashboard").into_response();
    }
    Html(pages::landing(&state.provider_name, &state.controller.state())).into_response()
}

/// Starts a sign-in flow and redirects the user agent to the provider.
pub async fn login(State(state): State<AppState>) -> Response {
    match state.controller.start().await {
        Ok(flow) => Redirect::to(flow.authorization_url.as_str()).into_response(),
        Err(e) => error_response(&e),
    }
}

/// The provider's redirect target.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match state.controller.handle_callback(params).await {
        Ok(_) => Redirect::to("/dashboard").into_response(),
        Err(e) => error_response(&e),
    }
}

/// Signs out and returns to the landing page.
pub async fn logout(State(state): State<AppState>) -> Redirect {
    state.controller.sign_out();
    Redirect::to("/")
}

/// Profile page (behind the route guard).
pub async fn dashboard(State(state): State<AppState>) -> Response {
    match state.controller.profile() {
        Some(profile) => Html(pages::dashboard(&profile, &state.provider_name)).into_response(),
        // The session expired between the guard and the handler.
        None => Redirect::to("/").into_response(),
    }
}

/// Liveness probe.
pub async fn healthz() -> &'static str {
    "ok"
}

/// Flow state and profile for the UI-rendering collaborator.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Whether an unexpired session exists.
    pub authenticated: bool,

    /// Flow state name (`idle`, `awaiting_response`, `failed`, ...).
    pub state: &'static str,

    /// Failure details when the state is `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionErrorInfo>,

    /// The display profile when signed in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

/// Machine-readable failure surfaced to the UI.
#[derive(Debug, Serialize)]
pub struct SessionErrorInfo {
    /// Error kind.
    pub kind: &'static str,
    /// Non-secret user message.
    pub message: String,
}

/// Session JSON endpoint.
pub async fn session_info(State(state): State<AppState>) -> Json<SessionInfo> {
    let flow_state = state.controller.state();
    let error = match &flow_state {
        FlowState::Failed { kind, message } => Some(SessionErrorInfo {
            kind: *kind,
            message: message.clone(),
        }),
        _ => None,
    };

    Json(SessionInfo {
        authenticated: state.controller.is_authenticated(),
        state: flow_state.name(),
        error,
        profile: state.controller.profile(),
    })
}

/// Renders a flow failure as an error page with a fitting status.
fn error_response(err: &FlowError) -> Response {
    let status = if err.is_retryable() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::BAD_REQUEST
    };
    (
        status,
        Html(pages::error_page(err.kind(), &err.user_message(), err.is_retryable())),
    )
        .into_response()
}
