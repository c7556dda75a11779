use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{accounts::AccountId, config::JwtConfig};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed or its signature does not match")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// JWT payload. `sub` carries the opaque account id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn account_id(&self) -> AccountId {
        AccountId::from(self.sub.as_str())
    }

    /// True when the token predates the account it names. Compared at
    /// whole-second precision, which is all `iat` carries.
    pub fn issued_before(&self, moment: OffsetDateTime) -> bool {
        self.iat < moment.unix_timestamp()
    }
}

/// Issues and verifies HS256 bearer tokens. Verification is a pure
/// signature/format/expiry check and never touches a store.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
        }
    }

    pub(crate) fn sign_at(
        &self,
        account_id: &AccountId,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let exp = issued_at + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: account_id.to_string(),
            iat: issued_at.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(account_id = %account_id, "jwt signed");
        Ok(token)
    }

    pub fn issue(&self, account_id: &AccountId) -> Result<String, TokenError> {
        self.sign_at(account_id, OffsetDateTime::now_utc())
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;
        if data.claims.sub.is_empty() {
            return Err(TokenError::Malformed);
        }
        debug!(account_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}
