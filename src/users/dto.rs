use serde::{Deserialize, Serialize};

use crate::accounts::{AccountView, Preferences};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub newsletter: Option<bool>,
    pub notifications: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub user: AccountView,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub success: bool,
    pub message: &'static str,
    pub preferences: Preferences,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub favorite_articles: Vec<i64>,
}
