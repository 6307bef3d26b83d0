//! Authorization gate.
//!
//! A check first looks up the permission in the role bundles of the actor. A grant with
//! `Scope::Any` settles it; a grant with `Scope::Own` additionally requires the actor to
//! own the target record.

use serde::Serialize;

use crate::errors::{AppError, AppResult};
use crate::permissions::{self, Action, Permission, Resource, Role, Scope};

/// The authenticated caller, as resolved by the auth middleware.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub roles: Vec<Role>,
}

impl AuthUser {
    #[must_use]
    pub fn new(id: i64, roles: Vec<Role>) -> Self {
        Self { id, roles }
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Records with an owning user.
pub trait Owned {
    fn owner_id(&self) -> Option<i64>;
}

/// Pure authorization predicate.
#[must_use]
pub fn can(actor: &AuthUser, resource: Resource, action: Action, owner: Option<i64>) -> bool {
    let permission = Permission::new(resource, action);
    let table = permissions::table();

    actor
        .roles
        .iter()
        .filter_map(|role| table.scope(*role, permission))
        .any(|scope| match scope {
            Scope::Any => true,
            Scope::Own => owner == Some(actor.id),
        })
}

/// Gate for actions without a target record (`viewAny`, `create`).
///
/// # Errors
/// Returns `Forbidden` when no role of the actor grants the action.
pub fn authorize(actor: &AuthUser, resource: Resource, action: Action) -> AppResult<()> {
    if can(actor, resource, action, None) {
        Ok(())
    } else {
        tracing::debug!(user_id = actor.id, resource = resource.plural(), ?action, "authorization denied");
        Err(AppError::Forbidden)
    }
}

/// Gate for actions on an existing record.
///
/// # Errors
/// Returns `Forbidden` when neither a privileged grant nor ownership allows the action.
pub fn authorize_on<T: Owned>(
    actor: &AuthUser,
    resource: Resource,
    action: Action,
    target: &T,
) -> AppResult<()> {
    if can(actor, resource, action, target.owner_id()) {
        Ok(())
    } else {
        tracing::debug!(user_id = actor.id, resource = resource.plural(), ?action, "authorization denied");
        Err(AppError::Forbidden)
    }
}
