use tracing::{info, warn};

use super::{
    dto::{LoginRequest, RegisterRequest},
    jwt::TokenService,
    password::PasswordHasher,
};
use crate::{
    accounts::{Account, AccountDraft, UserStore},
    error::AppError,
    validation::{sanitize, Checks},
};

/// Validates the draft, creates the account and issues its first token.
pub async fn register(
    store: &dyn UserStore,
    tokens: &TokenService,
    req: RegisterRequest,
) -> Result<(String, Account), AppError> {
    let first_name = sanitize(&req.first_name);
    let last_name = sanitize(&req.last_name);

    let mut checks = Checks::default();
    let email = checks.email(&sanitize(&req.email));
    checks.new_password(&req.password);
    // Names are optional at sign-up but must be well formed when given.
    if !first_name.is_empty() {
        checks.name("firstName", "First name", &first_name);
    }
    if !last_name.is_empty() {
        checks.name("lastName", "Last name", &last_name);
    }
    checks.finish()?;
    let email = email.ok_or_else(invalid_email)?;

    let account = store
        .create(AccountDraft {
            email,
            password: req.password,
            first_name,
            last_name,
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "registration rejected by store");
            AppError::from(e)
        })?;

    let token = tokens.issue(&account.id)?;
    info!(
        account_id = %account.id,
        email = %account.email,
        backend = store.backend().as_str(),
        "account registered"
    );
    Ok((token, account))
}

fn invalid_email() -> AppError {
    AppError::validation("email", "Please provide a valid email address")
}

/// Checks credentials. Unknown email and wrong password are
/// indistinguishable to the caller.
pub async fn login(
    store: &dyn UserStore,
    tokens: &TokenService,
    hasher: &PasswordHasher,
    req: LoginRequest,
) -> Result<(String, Account), AppError> {
    let mut checks = Checks::default();
    let email = checks.email(&sanitize(&req.email));
    checks.present("password", "Password is required", &req.password);
    checks.finish()?;
    let email = email.ok_or_else(invalid_email)?;

    let Some(account) = store.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !hasher
        .verify_blocking(req.password, account.password_hash.clone())
        .await
    {
        warn!(account_id = %account.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    if !account.is_active {
        warn!(account_id = %account.id, "login on deactivated account");
        return Err(AppError::AccountDisabled);
    }

    let account = store.record_login(&account.id).await?;
    let token = tokens.issue(&account.id)?;
    info!(account_id = %account.id, email = %account.email, "account logged in");
    Ok((token, account))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        accounts::{AccountPatch, StoreSelector, VolatileStore},
        config::JwtConfig,
    };

    fn tokens() -> TokenService {
        TokenService::new(&JwtConfig {
            secret: "svc".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 5,
        })
    }

    fn store() -> crate::accounts::ResolvedStore {
        let volatile = Arc::new(VolatileStore::new(PasswordHasher::fast_insecure()));
        StoreSelector::volatile_only(volatile).resolve()
    }

    fn register_req(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_issues_a_token_for_the_new_account() {
        let store = store();
        let tokens = tokens();
        let (token, account) = register(&store, &tokens, register_req("A@B.com", "Abc123!!"))
            .await
            .unwrap();
        assert_eq!(account.email, "a@b.com");
        assert_eq!(tokens.verify(&token).unwrap().account_id(), account.id);
    }

    #[tokio::test]
    async fn register_rejects_bad_input_and_duplicates() {
        let store = store();
        let tokens = tokens();
        let err = register(&store, &tokens, register_req("nope", "abc")).await.unwrap_err();
        match err {
            AppError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {other:?}"),
        }

        register(&store, &tokens, register_req("A@x.com", "Abc123!!")).await.unwrap();
        let err = register(&store, &tokens, register_req("a@x.com", "Abc123!!"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn login_errors_do_not_reveal_which_part_was_wrong() {
        let store = store();
        let tokens = tokens();
        let hasher = PasswordHasher::fast_insecure();
        register(&store, &tokens, register_req("a@b.com", "Abc123!!")).await.unwrap();

        let unknown = login(&store, &tokens, &hasher, login_req("x@b.com", "Abc123!!"))
            .await
            .unwrap_err();
        let wrong = login(&store, &tokens, &hasher, login_req("a@b.com", "Wrong123"))
            .await
            .unwrap_err();
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn login_records_last_login_and_refuses_deactivated_accounts() {
        let store = store();
        let tokens = tokens();
        let hasher = PasswordHasher::fast_insecure();
        let (_, created) = register(&store, &tokens, register_req("a@b.com", "Abc123!!"))
            .await
            .unwrap();
        assert!(created.last_login_at.is_none());

        let (_, account) = login(&store, &tokens, &hasher, login_req("A@B.COM", "Abc123!!"))
            .await
            .unwrap();
        assert!(account.last_login_at.is_some());

        store
            .update(
                &account.id,
                AccountPatch {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = login(&store, &tokens, &hasher, login_req("a@b.com", "Abc123!!"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccountDisabled));
    }
}
