use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{AuthResponse, LoginRequest, RegisterRequest, SessionResponse, VerifyResponse},
    extractors::{OptionalAuth, RequireAuth, Store},
    services,
};
use crate::{
    accounts::AccountView, error::AppError, rate_limit::rate_limit, state::AppState,
    validation::ValidJson,
};

pub fn auth_routes(state: AppState) -> Router<AppState> {
    let throttled = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route_layer(from_fn_with_state(state, rate_limit));

    Router::new()
        .merge(throttled)
        .route("/auth/verify", get(verify))
        .route("/auth/session", get(session))
}

#[instrument(skip(state, store, payload))]
pub async fn register(
    State(state): State<AppState>,
    Store(store): Store,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let (token, account) = services::register(&store, &state.tokens, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new("User registered successfully", token, &account)),
    ))
}

#[instrument(skip(state, store, payload))]
pub async fn login(
    State(state): State<AppState>,
    Store(store): Store,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (token, account) =
        services::login(&store, &state.tokens, &state.hasher, payload).await?;
    Ok(Json(AuthResponse::new("Login successful", token, &account)))
}

#[instrument(skip_all)]
pub async fn verify(RequireAuth(ctx): RequireAuth) -> Json<VerifyResponse> {
    Json(VerifyResponse::new(&ctx.account))
}

#[instrument(skip_all)]
pub async fn session(OptionalAuth(ctx): OptionalAuth) -> Json<SessionResponse> {
    Json(SessionResponse {
        success: true,
        authenticated: ctx.is_some(),
        user: ctx.as_ref().map(|c| AccountView::from(&c.account)),
    })
}
