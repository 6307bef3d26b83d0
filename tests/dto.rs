use bookshelf_api::{
    AppError,
    dto::{
        MAX_PER_PAGE, PageParams, StoreAuthorDto, StoreCommentDto, StoreUserDto, UpdateAuthorDto,
        UpdateBookDto, UpdateReviewDto, UpdateUserDto,
    },
    models::Commentable,
    patch::Patch,
    permissions::Role,
    requests::{StoreAuthorRequest, StoreCommentRequest, StoreUserRequest},
};
use serde_json::json;
use validator::Validate;

#[test]
fn patch_tells_missing_from_null() {
    let dto: UpdateAuthorDto =
        serde_json::from_value(json!({ "first_name": "Mary", "biography": null })).unwrap();
    assert_eq!(dto.first_name, Patch::Value("Mary".to_string()));
    assert!(dto.biography.is_null());
    assert!(dto.last_name.is_missing());
}

#[test]
fn to_map_contains_only_supplied_fields() {
    let dto: UpdateAuthorDto =
        serde_json::from_value(json!({ "first_name": "Mary", "biography": null })).unwrap();

    let without_nulls = dto.to_map(false);
    assert_eq!(without_nulls.len(), 1);
    assert_eq!(without_nulls["first_name"], "Mary");

    let with_nulls = dto.to_map(true);
    assert_eq!(with_nulls.len(), 2);
    assert!(with_nulls["biography"].is_null());
    assert!(!with_nulls.contains_key("nationality"));
}

#[test]
fn empty_update_is_valid_and_empty() {
    let dto = UpdateBookDto::default();
    assert!(dto.validate().is_ok());
    assert!(dto.to_map(true).is_empty());
}

#[test]
fn explicit_null_on_required_column_is_rejected() {
    let dto: UpdateBookDto = serde_json::from_value(json!({ "title": null })).unwrap();
    let AppError::Validation(fields) = AppError::from(dto.validate().unwrap_err()) else {
        panic!("expected validation error");
    };
    assert_eq!(fields["title"], vec!["The title field cannot be null."]);
}

#[test]
fn update_rules_mirror_store_rules() {
    let review: UpdateReviewDto = serde_json::from_value(json!({ "rating": 6 })).unwrap();
    assert!(review.validate().is_err());

    let review: UpdateReviewDto = serde_json::from_value(json!({ "rating": 4 })).unwrap();
    assert!(review.validate().is_ok());

    let user: UpdateUserDto =
        serde_json::from_value(json!({ "email": "nope", "password": "short" })).unwrap();
    let AppError::Validation(fields) = AppError::from(user.validate().unwrap_err()) else {
        panic!("expected validation error");
    };
    assert!(fields.contains_key("email"));
    assert!(fields.contains_key("password"));

    let book: UpdateBookDto = serde_json::from_value(json!({ "author_ids": [] })).unwrap();
    assert!(book.validate().is_err());
}

#[test]
fn update_user_roles_deserialize() {
    let dto: UpdateUserDto =
        serde_json::from_value(json!({ "roles": ["editor", "moderator"] })).unwrap();
    assert_eq!(
        dto.roles.value(),
        Some(&vec![Role::Editor, Role::Moderator])
    );
    assert!(serde_json::from_value::<UpdateUserDto>(json!({ "roles": ["root"] })).is_err());
}

#[test]
fn store_dto_reports_missing_field() {
    let req: StoreAuthorRequest =
        serde_json::from_value(json!({ "first_name": "Mary", "last_name": "Shelley" })).unwrap();
    let err = StoreAuthorDto::from_request(req).unwrap_err();
    let AppError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    assert_eq!(fields["nationality"], vec!["The nationality field is required."]);
}

#[test]
fn store_user_defaults_to_user_role() {
    let req: StoreUserRequest = serde_json::from_value(json!({
        "name": "Reader",
        "email": "reader@example.com",
        "password": "password123",
        "roles": []
    }))
    .unwrap();
    let dto = StoreUserDto::from_request(req).unwrap();
    assert_eq!(dto.roles, vec![Role::User]);
}

#[test]
fn store_comment_builds_commentable() {
    let req: StoreCommentRequest = serde_json::from_value(json!({
        "commentable_type": "review",
        "commentable_id": 12,
        "body": "Agreed."
    }))
    .unwrap();
    let dto = StoreCommentDto::from_request(req, 3).unwrap();
    assert_eq!(dto.commentable, Commentable::Review(12));
    assert_eq!(dto.user_id, 3);

    assert!(
        serde_json::from_value::<StoreCommentRequest>(json!({ "commentable_type": "author" }))
            .is_err(),
        "authors cannot be commented on"
    );
}

#[test]
fn page_params_defaults_and_clamping() {
    let defaults = PageParams::new(None, None);
    assert_eq!(defaults, PageParams::default());
    assert_eq!(defaults.per_page, 10);
    assert_eq!(defaults.offset(), 0);

    let third = PageParams::new(Some(3), Some(15));
    assert_eq!(third.offset(), 30);
    assert_eq!(third.limit(), 15);

    let clamped = PageParams::new(Some(0), Some(10_000));
    assert_eq!(clamped.page, 1);
    assert_eq!(clamped.per_page, MAX_PER_PAGE);
}
