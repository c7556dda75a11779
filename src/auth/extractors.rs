use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use super::jwt::TokenService;
use crate::{
    accounts::{Account, AccountId, ResolvedStore, Role, UserStore},
    error::AppError,
    state::AppState,
};

/// Identity attached to a request that passed the required gate.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: AccountId,
    pub account: Account,
}

/// Pulls the token out of `Authorization: Bearer <token>`. Anything else
/// counts as no token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Required mode: token must verify and name an existing, active account
/// that is not newer than the token itself.
pub async fn authenticate(
    tokens: &TokenService,
    store: &dyn UserStore,
    headers: &HeaderMap,
) -> Result<AuthContext, AppError> {
    let token = bearer_token(headers).ok_or(AppError::TokenMissing)?;
    let claims = tokens.verify(token)?;
    let account_id = claims.account_id();

    let account = match store.find_by_id(&account_id).await? {
        Some(a) if claims.issued_before(a.created_at) => {
            warn!(account_id = %account_id, "token predates the account it names");
            return Err(AppError::TokenInvalid);
        }
        Some(a) if a.is_active => a,
        Some(_) => {
            warn!(account_id = %account_id, "token for deactivated account");
            return Err(AppError::AccountUnavailable);
        }
        None => {
            warn!(
                account_id = %account_id,
                backend = store.backend().as_str(),
                "token for unknown account"
            );
            return Err(AppError::AccountUnavailable);
        }
    };
    Ok(AuthContext { account_id, account })
}

/// Optional mode: any failure yields `None`, never an error.
pub async fn authenticate_optional(
    tokens: &TokenService,
    store: &dyn UserStore,
    headers: &HeaderMap,
) -> Option<AuthContext> {
    match authenticate(tokens, store, headers).await {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            debug!(reason = %e, "optional auth continuing anonymously");
            None
        }
    }
}

/// Role gate. A missing context means the required gate did not run first,
/// which is a wiring bug rather than a client error.
pub fn authorize_role(ctx: Option<&AuthContext>, role: Role) -> Result<(), AppError> {
    let ctx = ctx.ok_or(AppError::GateMisuse)?;
    if ctx.account.role != role {
        warn!(account_id = %ctx.account_id, required = role.as_str(), "role check failed");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// The request's store handle, resolved once and cached in the request
/// extensions so every stage of one request sees the same backend.
pub struct Store(pub ResolvedStore);

impl Store {
    fn from_parts(parts: &mut Parts, state: &AppState) -> ResolvedStore {
        if let Some(store) = parts.extensions.get::<ResolvedStore>() {
            return store.clone();
        }
        let store = state.stores.resolve();
        debug!(backend = store.backend().as_str(), "store resolved for request");
        parts.extensions.insert(store.clone());
        store
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Store {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Store(Store::from_parts(parts, state)))
    }
}

/// Required-auth extractor.
pub struct RequireAuth(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(RequireAuth(ctx.clone()));
        }
        let store = Store::from_parts(parts, state);
        let ctx = authenticate(&state.tokens, &store, &parts.headers).await?;
        parts.extensions.insert(ctx.clone());
        Ok(RequireAuth(ctx))
    }
}

/// Optional-auth extractor; never rejects.
pub struct OptionalAuth(pub Option<AuthContext>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(OptionalAuth(Some(ctx.clone())));
        }
        let store = Store::from_parts(parts, state);
        let ctx = authenticate_optional(&state.tokens, &store, &parts.headers).await;
        if let Some(ctx) = &ctx {
            parts.extensions.insert(ctx.clone());
        }
        Ok(OptionalAuth(ctx))
    }
}

/// Middleware form of the required gate, for stacking a role gate after it.
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    let RequireAuth(_) = RequireAuth::from_request_parts(&mut parts, &state).await?;
    Ok(next.run(Request::from_parts(parts, body)).await)
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    authorize_role(req.extensions().get::<AuthContext>(), Role::Admin)?;
    Ok(next.run(req).await)
}
