use serde::{Deserialize, Serialize};

use crate::accounts::{Account, AccountView};

/// Request body for registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by register and login. The view goes out as `account` and,
/// for existing web clients, as `user`.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: &'static str,
    pub token: String,
    pub account: AccountView,
    pub user: AccountView,
}

impl AuthResponse {
    pub fn new(message: &'static str, token: String, account: &Account) -> Self {
        let view = AccountView::from(account);
        Self {
            success: true,
            message,
            token,
            account: view.clone(),
            user: view,
        }
    }
}

/// Returned by token verification.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub account: AccountView,
    pub user: AccountView,
}

impl VerifyResponse {
    pub fn new(account: &Account) -> Self {
        let view = AccountView::from(account);
        Self {
            success: true,
            account: view.clone(),
            user: view,
        }
    }
}

/// Boundary data for callers embedding the paywall widget.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub authenticated: bool,
    pub user: Option<AccountView>,
}
