use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::{
    claims::Identity,
    dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest},
    jwt::TokenService,
    password::{hash_password_blocking, verify_password_blocking},
    repo::UserRepo,
    repo_types::NewUser,
};
use crate::error::{AppError, Result};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn register(users: &dyn UserRepo, payload: RegisterRequest) -> Result<PublicUser> {
    let email = normalize_email(&payload.email);
    let username = payload.username.trim().to_string();

    if email.is_empty() || username.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("Fields cannot be empty"));
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    if users.email_exists(&email).await? {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password_blocking(payload.password).await?;
    let user = users
        .insert_user(NewUser {
            email,
            username,
            password_hash,
        })
        .await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user.into())
}

pub async fn login(
    users: &dyn UserRepo,
    tokens: &TokenService,
    payload: LoginRequest,
) -> Result<LoginResponse> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("Fields cannot be empty"));
    }

    let Some(user) = users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::unauthorized("Invalid credentials"));
    };

    if !verify_password_blocking(payload.password, user.password_hash.clone()).await? {
        warn!(%email, user_id = user.id, "login invalid password");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let jwt = tokens.issue(&Identity {
        user_id: user.id,
        email: user.email.clone(),
    })?;
    info!(user_id = user.id, "user logged in");
    Ok(LoginResponse { jwt })
}

pub async fn current_user(users: &dyn UserRepo, identity: &Identity) -> Result<PublicUser> {
    users
        .find_by_id(identity.user_id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| AppError::unauthorized("User not found"))
}
