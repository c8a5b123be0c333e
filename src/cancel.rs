use std::{convert::Infallible, future::Future, time::Duration};

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    error::{AppError, Result},
    state::AppState,
};

/// Per-request cancellation signal, cancelled on deadline or shutdown.
#[derive(Debug, Clone)]
pub struct Cancel(pub CancellationToken);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Cancel {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Cancel>()
            .cloned()
            .unwrap_or_else(|| Cancel(CancellationToken::new())))
    }
}

/// Installs a [`Cancel`] token on the request and enforces the deadline.
pub async fn deadline(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = state.shutdown.child_token();
    req.extensions_mut().insert(Cancel(token.clone()));
    let _guard = token.clone().drop_guard();
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    tokio::select! {
        res = next.run(req) => res,
        _ = tokio::time::sleep(timeout) => {
            warn!(timeout_secs = timeout.as_secs(), "request deadline exceeded");
            token.cancel();
            AppError::Cancelled.into_response()
        }
        _ = token.cancelled() => AppError::Cancelled.into_response(),
    }
}

/// Races `fut` against `token`; a cancelled token wins.
pub async fn with_cancel<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if token.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    tokio::select! {
        biased;
        () = token.cancelled() => Err(AppError::Cancelled),
        res = fut => res,
    }
}

pub fn ensure_live(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}
