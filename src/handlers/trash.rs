//! Restore and permanent removal of soft-deleted records, shared by every resource.

use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::{
    errors::AppResult,
    permissions::{Action, Resource},
    policy::{AuthUser, authorize},
    resources::{JsonResponse, ok},
    services,
};

/// # Errors
/// Returns forbidden, or not found when no trashed record matches `key`.
pub async fn restore(
    db: &SqlitePool,
    actor: &AuthUser,
    resource: Resource,
    key: &str,
) -> AppResult<JsonResponse<Value>> {
    authorize(actor, resource, Action::Restore)?;
    let id = services::restore(db, resource, key).await?;
    Ok(ok(
        format!("{} restored", capitalize(resource.singular())),
        json!({ "id": id }),
    ))
}

/// # Errors
/// Returns forbidden, or not found when no record matches `key`.
pub async fn force_delete(
    db: &SqlitePool,
    actor: &AuthUser,
    resource: Resource,
    key: &str,
) -> AppResult<()> {
    authorize(actor, resource, Action::ForceDelete)?;
    services::force_delete(db, resource, key).await
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}
