use axum::{
    extract::Path,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{
        AccountStatusRequest, FavoritesResponse, PreferencesResponse, ProfileResponse,
        UpdatePreferencesRequest, UpdateProfileRequest,
    },
    services,
};
use crate::{
    accounts::{AccountId, AccountView},
    auth::extractors::{require_admin, require_auth, RequireAuth, Store},
    error::AppError,
    state::AppState,
    validation::ValidJson,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/profile", get(get_profile).put(update_profile))
        .route("/users/preferences", put(update_preferences))
        .route("/users/favorites", get(list_favorites))
        .route(
            "/users/favorites/:article_id",
            post(add_favorite).delete(remove_favorite),
        )
}

/// Admin-only routes; the role gate is stacked inside the required gate.
pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/accounts/:id/status", put(set_account_status))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state, require_auth))
}

fn parse_article_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::validation("articleId", "Article id must be an integer"))
}

#[instrument(skip_all)]
pub async fn get_profile(
    RequireAuth(ctx): RequireAuth,
    Store(store): Store,
) -> Result<Json<ProfileResponse>, AppError> {
    let account = services::profile(&store, &ctx.account_id).await?;
    Ok(Json(ProfileResponse {
        success: true,
        message: None,
        user: AccountView::from(&account),
    }))
}

#[instrument(skip_all)]
pub async fn update_profile(
    RequireAuth(ctx): RequireAuth,
    Store(store): Store,
    ValidJson(payload): ValidJson<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let account = services::update_profile(&store, &ctx.account_id, payload).await?;
    Ok(Json(ProfileResponse {
        success: true,
        message: Some("Profile updated successfully"),
        user: AccountView::from(&account),
    }))
}

#[instrument(skip_all)]
pub async fn update_preferences(
    RequireAuth(ctx): RequireAuth,
    Store(store): Store,
    ValidJson(payload): ValidJson<UpdatePreferencesRequest>,
) -> Result<Json<PreferencesResponse>, AppError> {
    let preferences = services::update_preferences(&store, &ctx.account_id, payload).await?;
    Ok(Json(PreferencesResponse {
        success: true,
        message: "Preferences updated successfully",
        preferences,
    }))
}

#[instrument(skip_all)]
pub async fn list_favorites(
    RequireAuth(ctx): RequireAuth,
    Store(store): Store,
) -> Result<Json<FavoritesResponse>, AppError> {
    let favorite_articles = services::list_favorites(&store, &ctx.account_id).await?;
    Ok(Json(FavoritesResponse {
        success: true,
        message: None,
        favorite_articles,
    }))
}

#[instrument(skip_all)]
pub async fn add_favorite(
    RequireAuth(ctx): RequireAuth,
    Store(store): Store,
    Path(article_id): Path<String>,
) -> Result<Json<FavoritesResponse>, AppError> {
    let article_id = parse_article_id(&article_id)?;
    let favorite_articles = services::add_favorite(&store, &ctx.account_id, article_id).await?;
    Ok(Json(FavoritesResponse {
        success: true,
        message: Some("Article added to favorites"),
        favorite_articles,
    }))
}

#[instrument(skip_all)]
pub async fn remove_favorite(
    RequireAuth(ctx): RequireAuth,
    Store(store): Store,
    Path(article_id): Path<String>,
) -> Result<Json<FavoritesResponse>, AppError> {
    let article_id = parse_article_id(&article_id)?;
    let favorite_articles = services::remove_favorite(&store, &ctx.account_id, article_id).await?;
    Ok(Json(FavoritesResponse {
        success: true,
        message: Some("Article removed from favorites"),
        favorite_articles,
    }))
}

#[instrument(skip_all)]
pub async fn set_account_status(
    RequireAuth(ctx): RequireAuth,
    Store(store): Store,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<AccountStatusRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    info!(
        admin_id = %ctx.account_id,
        target = %id,
        is_active = payload.is_active,
        "admin status change"
    );
    let account = services::set_active(&store, &AccountId::from(id), payload.is_active).await?;
    Ok(Json(ProfileResponse {
        success: true,
        message: Some("Account status updated"),
        user: AccountView::from(&account),
    }))
}
