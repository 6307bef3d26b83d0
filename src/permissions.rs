//! Canonical permission table.
//!
//! Permissions are `(Resource, Action)` pairs with a unique string name. Roles are
//! named bundles of permissions, each granted either on any record or only on records
//! the actor owns. The table is built once per process and is read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Author,
    Book,
    Comment,
    Genre,
    Post,
    Review,
    Tag,
    User,
}

impl Resource {
    pub const ALL: [Resource; 8] = [
        Resource::Author,
        Resource::Book,
        Resource::Comment,
        Resource::Genre,
        Resource::Post,
        Resource::Review,
        Resource::Tag,
        Resource::User,
    ];

    /// Plural name, used both in permission names and as the route segment.
    #[must_use]
    pub fn plural(self) -> &'static str {
        match self {
            Resource::Author => "authors",
            Resource::Book => "books",
            Resource::Comment => "comments",
            Resource::Genre => "genres",
            Resource::Post => "posts",
            Resource::Review => "reviews",
            Resource::Tag => "tags",
            Resource::User => "users",
        }
    }

    /// Route parameter name, e.g. `book` in `/books/{book}`.
    #[must_use]
    pub fn singular(self) -> &'static str {
        match self {
            Resource::Author => "author",
            Resource::Book => "book",
            Resource::Comment => "comment",
            Resource::Genre => "genre",
            Resource::Post => "post",
            Resource::Review => "review",
            Resource::Tag => "tag",
            Resource::User => "user",
        }
    }

    #[must_use]
    pub fn table(self) -> &'static str {
        self.plural()
    }

    /// Column used for route-model binding.
    #[must_use]
    pub fn route_key(self) -> &'static str {
        match self {
            Resource::Review | Resource::User => "id",
            _ => "slug",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewAny,
    View,
    Create,
    Update,
    Delete,
    Restore,
    ForceDelete,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::ViewAny,
        Action::View,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Restore,
        Action::ForceDelete,
    ];

    fn verb(self) -> &'static str {
        match self {
            Action::ViewAny => "view any",
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "edit",
            Action::Delete => "delete",
            Action::Restore => "restore",
            Action::ForceDelete => "force delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    #[must_use]
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    /// Every permission known to the system.
    pub fn all() -> impl Iterator<Item = Permission> {
        Resource::ALL.into_iter().flat_map(|resource| {
            Action::ALL
                .into_iter()
                .map(move |action| Permission::new(resource, action))
        })
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action.verb(), self.resource.plural())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Author,
    Moderator,
    User,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Editor,
        Role::Author,
        Role::Moderator,
        Role::User,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Author => "author",
            Role::Moderator => "moderator",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown role '{s}'"))
    }
}

/// How far a grant reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Any,
    Own,
}

#[derive(Debug, Default)]
pub struct PermissionTable {
    grants: HashMap<Role, HashMap<Permission, Scope>>,
}

impl PermissionTable {
    /// Scope with which `role` holds `permission`, if at all.
    #[must_use]
    pub fn scope(&self, role: Role, permission: Permission) -> Option<Scope> {
        self.grants.get(&role)?.get(&permission).copied()
    }

    /// Permissions of a role, sorted by name.
    #[must_use]
    pub fn bundle(&self, role: Role) -> Vec<(Permission, Scope)> {
        let mut bundle: Vec<_> = self
            .grants
            .get(&role)
            .map(|g| g.iter().map(|(p, s)| (*p, *s)).collect())
            .unwrap_or_default();
        bundle.sort_by_key(|(p, _)| p.to_string());
        bundle
    }

    fn grant(&mut self, role: Role, resource: Resource, action: Action, scope: Scope) {
        self.grants
            .entry(role)
            .or_default()
            .insert(Permission::new(resource, action), scope);
    }

    fn build() -> Self {
        use Action::{Create, Delete, Restore, Update, View, ViewAny};
        use Scope::{Any, Own};

        let mut table = Self::default();

        for permission in Permission::all() {
            table.grant(Role::Admin, permission.resource, permission.action, Any);
        }

        for resource in Resource::ALL {
            for role in [Role::Editor, Role::Author, Role::Moderator, Role::User] {
                table.grant(role, resource, ViewAny, Any);
                table.grant(role, resource, View, Any);
            }

            match resource {
                Resource::Book => table.grant(Role::Author, resource, Create, Any),
                Resource::Comment | Resource::Review | Resource::Post => {
                    for role in [Role::Author, Role::User, Role::Moderator] {
                        table.grant(role, resource, Create, Any);
                    }
                }
                Resource::Tag => table.grant(Role::Editor, resource, Create, Any),
                Resource::Author | Resource::Genre | Resource::User => {}
            }

            match resource {
                Resource::Author | Resource::Book => {
                    table.grant(Role::Editor, resource, Update, Any);
                    table.grant(Role::Author, resource, Update, Own);
                }
                Resource::Post | Resource::Review | Resource::Comment => {
                    table.grant(Role::Editor, resource, Update, Any);
                    table.grant(Role::Moderator, resource, Update, Any);
                    table.grant(Role::Author, resource, Update, Own);
                    table.grant(Role::User, resource, Update, Own);
                }
                Resource::User => {
                    table.grant(Role::Editor, resource, Update, Any);
                    table.grant(Role::Author, resource, Update, Own);
                    table.grant(Role::User, resource, Update, Own);
                }
                Resource::Genre | Resource::Tag => {
                    table.grant(Role::Editor, resource, Update, Any);
                    table.grant(Role::Author, resource, Update, Any);
                }
            }

            table.grant(Role::Moderator, resource, Delete, Any);
            if matches!(
                resource,
                Resource::Post | Resource::Review | Resource::Comment
            ) {
                table.grant(Role::Author, resource, Delete, Own);
                table.grant(Role::User, resource, Delete, Own);
            }

            table.grant(Role::Moderator, resource, Restore, Any);
        }

        table
    }
}

static TABLE: LazyLock<PermissionTable> = LazyLock::new(PermissionTable::build);

/// The process-wide permission table.
#[must_use]
pub fn table() -> &'static PermissionTable {
    &TABLE
}
