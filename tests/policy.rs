use std::collections::HashSet;

use bookshelf_api::{
    AppError,
    permissions::{self, Action, Permission, Resource, Role, Scope},
    policy::{AuthUser, Owned, authorize, authorize_on, can},
};

struct Record(Option<i64>);

impl Owned for Record {
    fn owner_id(&self) -> Option<i64> {
        self.0
    }
}

fn actor(id: i64, role: Role) -> AuthUser {
    AuthUser::new(id, vec![role])
}

#[test]
fn permission_names_are_unique() {
    let names: Vec<String> = Permission::all().map(|p| p.to_string()).collect();
    let unique: HashSet<&String> = names.iter().collect();
    assert_eq!(names.len(), 56);
    assert_eq!(unique.len(), names.len(), "duplicate permission name");
}

#[test]
fn permission_display_names() {
    assert_eq!(
        Permission::new(Resource::Book, Action::ViewAny).to_string(),
        "view any books"
    );
    assert_eq!(
        Permission::new(Resource::Review, Action::Update).to_string(),
        "edit reviews"
    );
    assert_eq!(
        Permission::new(Resource::User, Action::ForceDelete).to_string(),
        "force delete users"
    );
}

#[test]
fn admin_holds_every_permission_on_any_record() {
    let table = permissions::table();
    for permission in Permission::all() {
        assert_eq!(
            table.scope(Role::Admin, permission),
            Some(Scope::Any),
            "admin lacks {permission}"
        );
    }
    assert_eq!(table.bundle(Role::Admin).len(), 56);
}

#[test]
fn only_admin_force_deletes() {
    for resource in Resource::ALL {
        for role in Role::ALL {
            let allowed = can(&actor(1, role), resource, Action::ForceDelete, Some(1));
            assert_eq!(allowed, role == Role::Admin, "{role} on {}", resource.plural());
        }
    }
}

#[test]
fn every_role_can_browse() {
    for role in Role::ALL {
        let user = actor(7, role);
        for resource in Resource::ALL {
            assert!(authorize(&user, resource, Action::ViewAny).is_ok());
            assert!(authorize_on(&user, resource, Action::View, &Record(None)).is_ok());
        }
    }
}

#[test]
fn create_grants_follow_role() {
    let user = actor(1, Role::User);
    assert!(authorize(&user, Resource::Review, Action::Create).is_ok());
    assert!(authorize(&user, Resource::Comment, Action::Create).is_ok());
    assert!(matches!(
        authorize(&user, Resource::Book, Action::Create),
        Err(AppError::Forbidden)
    ));
    assert!(authorize(&actor(1, Role::Author), Resource::Book, Action::Create).is_ok());
    assert!(authorize(&actor(1, Role::Editor), Resource::Tag, Action::Create).is_ok());
    assert!(authorize(&actor(1, Role::Editor), Resource::Genre, Action::Create).is_err());
}

#[test]
fn role_parse_and_display() {
    assert_eq!("moderator".parse::<Role>(), Ok(Role::Moderator));
    assert!("superuser".parse::<Role>().is_err());
    assert_eq!(Role::Editor.to_string(), "editor");
}

#[test]
fn author_updates_own_book_only() {
    let author = actor(5, Role::Author);
    assert!(authorize_on(&author, Resource::Book, Action::Update, &Record(Some(5))).is_ok());
    assert!(matches!(
        authorize_on(&author, Resource::Book, Action::Update, &Record(Some(6))),
        Err(AppError::Forbidden)
    ));
    assert!(
        authorize_on(&author, Resource::Book, Action::Update, &Record(None)).is_err(),
        "unowned record is not the author's"
    );
    assert!(authorize_on(&author, Resource::Book, Action::Delete, &Record(Some(5))).is_err());
}

#[test]
fn user_edits_and_deletes_own_review_only() {
    let user = actor(3, Role::User);
    for action in [Action::Update, Action::Delete] {
        assert!(authorize_on(&user, Resource::Review, action, &Record(Some(3))).is_ok());
        assert!(authorize_on(&user, Resource::Review, action, &Record(Some(4))).is_err());
    }
    assert!(authorize_on(&user, Resource::User, Action::Update, &Record(Some(3))).is_ok());
    assert!(authorize_on(&user, Resource::User, Action::Update, &Record(Some(9))).is_err());
}

#[test]
fn privileged_roles_bypass_ownership() {
    let foreign = Record(Some(99));
    let editor = actor(1, Role::Editor);
    let moderator = actor(2, Role::Moderator);
    assert!(authorize_on(&editor, Resource::Book, Action::Update, &foreign).is_ok());
    assert!(authorize_on(&editor, Resource::Post, Action::Update, &foreign).is_ok());
    assert!(authorize_on(&moderator, Resource::Comment, Action::Update, &foreign).is_ok());
    assert!(authorize_on(&moderator, Resource::Book, Action::Delete, &foreign).is_ok());
    assert!(authorize_on(&moderator, Resource::Book, Action::Restore, &foreign).is_ok());
    assert!(authorize_on(&editor, Resource::Book, Action::Delete, &foreign).is_err());
}

#[test]
fn grants_combine_across_roles() {
    let both = AuthUser::new(4, vec![Role::User, Role::Editor]);
    assert!(authorize(&both, Resource::Tag, Action::Create).is_ok());
    assert!(authorize_on(&both, Resource::Review, Action::Delete, &Record(Some(4))).is_ok());
    assert!(!both.is_admin());
    assert!(AuthUser::new(1, vec![Role::Admin]).is_admin());
}
