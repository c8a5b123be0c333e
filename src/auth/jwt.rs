use std::sync::Arc;

use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use super::claims::{Claims, ExpiryOnly, Identity};
use crate::{
    config::JwtConfig,
    error::{AppError, Result},
};

const ALGORITHM: Algorithm = Algorithm::HS256;

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and verifies HS256 identity tokens.
#[derive(Clone)]
pub struct TokenService {
    keys: Option<Arc<Keys>>,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: Option<&str>, ttl: Duration) -> Self {
        let keys = secret.map(|secret| {
            Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            })
        });
        Self { keys, ttl }
    }

    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self::new(cfg.secret.as_deref(), Duration::hours(cfg.ttl_hours))
    }

    pub fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    fn keys(&self) -> Result<&Keys> {
        self.keys
            .as_deref()
            .ok_or_else(|| AppError::Configuration("JWT signing secret is not set".into()))
    }

    pub fn issue(&self, identity: &Identity) -> Result<String> {
        self.issue_at(identity, OffsetDateTime::now_utc())
    }

    fn issue_at(&self, identity: &Identity, now: OffsetDateTime) -> Result<String> {
        let keys = self.keys()?;
        let claims = Claims {
            user_id: identity.user_id,
            email: identity.email.clone(),
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &keys.encoding)
            .map_err(|e| AppError::internal(format!("jwt encode: {e}")))?;
        debug!(user_id = identity.user_id, "jwt signed");
        Ok(token)
    }

    /// Checks algorithm, expiry, then signature, then claim shape.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let keys = self.keys()?;

        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "malformed jwt header");
            AppError::InvalidToken
        })?;
        if header.alg != ALGORITHM {
            warn!(alg = ?header.alg, "unexpected jwt algorithm");
            return Err(AppError::InvalidToken);
        }

        let mut peek = Validation::new(ALGORITHM);
        peek.insecure_disable_signature_validation();
        peek.validate_exp = false;
        let expiry = decode::<ExpiryOnly>(token, &DecodingKey::from_secret(&[]), &peek)
            .map_err(|e| {
                debug!(error = %e, "unreadable jwt payload");
                AppError::InvalidToken
            })?
            .claims;
        if expiry.exp < OffsetDateTime::now_utc().unix_timestamp() {
            return Err(AppError::ExpiredToken);
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &keys.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                // the signature held, so we minted these claims ourselves
                ErrorKind::Json(_) => AppError::internal(format!("signed token has corrupt claims: {e}")),
                _ => {
                    warn!(error = %e, "jwt rejected");
                    AppError::InvalidToken
                }
            }
        })?;
        debug!(user_id = data.claims.user_id, "jwt verified");
        Ok(data.claims)
    }
}
