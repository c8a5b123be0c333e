use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Wire shape shared by every response: `{success, message, body?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            body: None,
        }
    }
}

/// Successful handler output wrapped in the success envelope.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    status: StatusCode,
    message: String,
    body: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn with_body(message: impl Into<String>, body: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            body: Some(body),
        }
    }

    pub fn created(message: impl Into<String>, body: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::with_body(message, body)
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            body: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            success: true,
            message: self.message,
            body: self.body,
        };
        (self.status, Json(envelope)).into_response()
    }
}
