use tracing::info;

use super::dto::{UpdatePreferencesRequest, UpdateProfileRequest};
use crate::{
    accounts::{Account, AccountId, AccountPatch, Preferences, UserStore},
    error::AppError,
    validation::{sanitize, Checks},
};

async fn load(store: &dyn UserStore, id: &AccountId) -> Result<Account, AppError> {
    store
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

pub async fn profile(store: &dyn UserStore, id: &AccountId) -> Result<Account, AppError> {
    load(store, id).await
}

pub async fn update_profile(
    store: &dyn UserStore,
    id: &AccountId,
    req: UpdateProfileRequest,
) -> Result<Account, AppError> {
    let first_name = req.first_name.map(|v| sanitize(&v)).filter(|v| !v.is_empty());
    let last_name = req.last_name.map(|v| sanitize(&v)).filter(|v| !v.is_empty());

    let mut checks = Checks::default();
    if let Some(v) = &first_name {
        checks.name("firstName", "First name", v);
    }
    if let Some(v) = &last_name {
        checks.name("lastName", "Last name", v);
    }
    let email = match req.email.map(|v| sanitize(&v)).filter(|v| !v.is_empty()) {
        Some(v) => checks.email(&v),
        None => None,
    };
    checks.finish()?;

    let current = load(store, id).await?;
    // Re-submitting the current address is not a change.
    let email = email.filter(|e| *e != current.email);
    if let Some(e) = &email {
        if store.find_by_email(e).await?.is_some() {
            return Err(AppError::DuplicateEmail);
        }
    }

    let patch = AccountPatch {
        email,
        first_name,
        last_name,
        ..Default::default()
    };
    if patch.is_empty() {
        return Ok(current);
    }
    let account = store.update(id, patch).await?;
    info!(account_id = %account.id, "profile updated");
    Ok(account)
}

pub async fn update_preferences(
    store: &dyn UserStore,
    id: &AccountId,
    req: UpdatePreferencesRequest,
) -> Result<Preferences, AppError> {
    let current = load(store, id).await?;
    let preferences = Preferences {
        newsletter: req.newsletter.unwrap_or(current.preferences.newsletter),
        notifications: req.notifications.unwrap_or(current.preferences.notifications),
    };
    let account = store
        .update(
            id,
            AccountPatch {
                preferences: Some(preferences),
                ..Default::default()
            },
        )
        .await?;
    Ok(account.preferences)
}

pub async fn list_favorites(store: &dyn UserStore, id: &AccountId) -> Result<Vec<i64>, AppError> {
    Ok(load(store, id).await?.favorite_article_ids)
}

pub async fn add_favorite(
    store: &dyn UserStore,
    id: &AccountId,
    article_id: i64,
) -> Result<Vec<i64>, AppError> {
    let current = load(store, id).await?;
    if current.favorite_article_ids.contains(&article_id) {
        return Err(AppError::AlreadyFavorited);
    }
    let mut favorites = current.favorite_article_ids;
    favorites.push(article_id);
    let account = store
        .update(
            id,
            AccountPatch {
                favorite_article_ids: Some(favorites),
                ..Default::default()
            },
        )
        .await?;
    Ok(account.favorite_article_ids)
}

/// Removing an id that is not a favorite succeeds without a write.
pub async fn remove_favorite(
    store: &dyn UserStore,
    id: &AccountId,
    article_id: i64,
) -> Result<Vec<i64>, AppError> {
    let current = load(store, id).await?;
    if !current.favorite_article_ids.contains(&article_id) {
        return Ok(current.favorite_article_ids);
    }
    let favorites = current
        .favorite_article_ids
        .into_iter()
        .filter(|a| *a != article_id)
        .collect();
    let account = store
        .update(
            id,
            AccountPatch {
                favorite_article_ids: Some(favorites),
                ..Default::default()
            },
        )
        .await?;
    Ok(account.favorite_article_ids)
}

pub async fn set_active(
    store: &dyn UserStore,
    id: &AccountId,
    is_active: bool,
) -> Result<Account, AppError> {
    let account = store
        .update(
            id,
            AccountPatch {
                is_active: Some(is_active),
                ..Default::default()
            },
        )
        .await?;
    info!(account_id = %account.id, is_active, "account status changed");
    Ok(account)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        accounts::{AccountDraft, ResolvedStore, StoreSelector, VolatileStore},
        auth::password::PasswordHasher,
    };

    async fn seeded() -> (ResolvedStore, Account, Account) {
        let volatile = Arc::new(VolatileStore::new(PasswordHasher::fast_insecure()));
        let store = StoreSelector::volatile_only(volatile).resolve();
        let mut made = Vec::new();
        for email in ["a@x.com", "b@x.com"] {
            made.push(
                store
                    .create(AccountDraft {
                        email: email.into(),
                        password: "Abc123!!".into(),
                        first_name: "Ada".into(),
                        last_name: "Lovelace".into(),
                    })
                    .await
                    .unwrap(),
            );
        }
        let b = made.pop().unwrap();
        let a = made.pop().unwrap();
        (store, a, b)
    }

    #[tokio::test]
    async fn favoriting_twice_is_rejected_without_duplicates() {
        let (store, a, _) = seeded().await;
        assert_eq!(add_favorite(&store, &a.id, 7).await.unwrap(), vec![7]);
        assert_eq!(add_favorite(&store, &a.id, 3).await.unwrap(), vec![7, 3]);
        let err = add_favorite(&store, &a.id, 7).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyFavorited));
        assert_eq!(list_favorites(&store, &a.id).await.unwrap(), vec![7, 3]);
    }

    #[tokio::test]
    async fn removing_a_non_favorite_is_a_no_op() {
        let (store, a, _) = seeded().await;
        add_favorite(&store, &a.id, 1).await.unwrap();
        let before = profile(&store, &a.id).await.unwrap().updated_at;
        assert_eq!(remove_favorite(&store, &a.id, 99).await.unwrap(), vec![1]);
        assert_eq!(profile(&store, &a.id).await.unwrap().updated_at, before);
        assert!(remove_favorite(&store, &a.id, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn profile_update_rejects_taken_email_and_accepts_own() {
        let (store, a, _) = seeded().await;
        let err = update_profile(
            &store,
            &a.id,
            UpdateProfileRequest {
                email: Some("B@X.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));

        let updated = update_profile(
            &store,
            &a.id,
            UpdateProfileRequest {
                email: Some("a@x.com".into()),
                first_name: Some("<i>Grace</i>".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.first_name, "Grace");
        assert_eq!(updated.full_name(), "Grace Lovelace");
    }

    #[tokio::test]
    async fn preferences_merge_partially() {
        let (store, a, _) = seeded().await;
        let prefs = update_preferences(
            &store,
            &a.id,
            UpdatePreferencesRequest {
                newsletter: Some(false),
                notifications: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            prefs,
            Preferences {
                newsletter: false,
                notifications: true
            }
        );
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let (store, _, _) = seeded().await;
        let ghost = AccountId::from("999");
        assert!(matches!(profile(&store, &ghost).await, Err(AppError::NotFound(_))));
        assert!(matches!(add_favorite(&store, &ghost, 1).await, Err(AppError::NotFound(_))));
        assert!(matches!(set_active(&store, &ghost, false).await, Err(AppError::NotFound(_))));
    }
}
