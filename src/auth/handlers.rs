use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest},
        extractors::AuthUser,
        services,
    },
    error::Result,
    extract::Payload,
    response::ApiResponse,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Payload(payload): Payload<RegisterRequest>,
) -> Result<ApiResponse<PublicUser>> {
    let user = services::register(state.users.as_ref(), payload).await?;
    Ok(ApiResponse::created("User registered successfully", user))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Payload(payload): Payload<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>> {
    let res = services::login(state.users.as_ref(), &state.tokens, payload).await?;
    Ok(ApiResponse::with_body("Login successful", res))
}

#[instrument(skip(state, identity), fields(user_id = identity.user_id))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<ApiResponse<PublicUser>> {
    let user = services::current_user(state.users.as_ref(), &identity).await?;
    Ok(ApiResponse::with_body("Success", user))
}
