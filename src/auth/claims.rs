use serde::{Deserialize, Serialize};

use crate::db::UserId;

/// JWT payload identifying the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: UserId, // users.id
    pub email: String,
    pub exp: i64, // expires at (unix timestamp)
    pub iat: i64, // issued at (unix timestamp)
}

/// Only the expiry, read before the signature is checked.
#[derive(Debug, Deserialize)]
pub(crate) struct ExpiryOnly {
    pub exp: i64,
}

/// Authenticated caller handed to every protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
}
