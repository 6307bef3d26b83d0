use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    dto::{StorePostDto, StoreUserDto, UpdateUserDto},
    errors::{AppError, AppResult},
    extract::{ValidatedJson, ValidatedQuery},
    handlers::parse_id,
    models::User,
    permissions::{Action, Resource},
    policy::{AuthUser, authorize, authorize_on},
    requests::{PageRequest, StorePostRequest, StoreUserRequest},
    resources::{
        Created, JsonResponse, PostResource, ReviewResource, UserResource, created, ok,
        paginated,
    },
    services::{PostService, ReviewService, UserService, ensure_exists},
};

/// # Errors
/// Returns forbidden or database errors.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<UserResource>>> {
    authorize(&actor, Resource::User, Action::ViewAny)?;
    let page = UserService::new(&state.db).index(query.into()).await?;
    Ok(paginated("Users retrieved", page))
}

async fn viewable(state: &AppState, actor: &AuthUser, key: &str) -> AppResult<User> {
    let user = UserService::new(&state.db).find(parse_id(key)?).await?;
    authorize_on(actor, Resource::User, Action::View, &user)?;
    Ok(user)
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user): Path<String>,
) -> AppResult<JsonResponse<UserResource>> {
    let user = viewable(&state, &actor, &user).await?;
    Ok(ok("User retrieved", user.into()))
}

/// # Errors
/// Returns forbidden, validation (including a taken email) or database errors.
pub async fn store(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<StoreUserRequest>,
) -> AppResult<Created<UserResource>> {
    authorize(&actor, Resource::User, Action::Create)?;
    let dto = StoreUserDto::from_request(payload)?;
    let user = UserService::new(&state.db).store(dto).await?;
    Ok(created("User created", user.into()))
}

/// Only admins may change role assignments.
///
/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateUserDto>,
) -> AppResult<JsonResponse<UserResource>> {
    let service = UserService::new(&state.db);
    let user = service.find(parse_id(&user)?).await?;
    authorize_on(&actor, Resource::User, Action::Update, &user)?;
    if !dto.roles.is_missing() && !actor.is_admin() {
        return Err(AppError::Forbidden);
    }

    let user = service.update(dto, &user).await?;
    Ok(ok("User updated", user.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user): Path<String>,
) -> AppResult<StatusCode> {
    let service = UserService::new(&state.db);
    let user = service.find(parse_id(&user)?).await?;
    authorize_on(&actor, Resource::User, Action::Delete, &user)?;
    service.destroy(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn reviews(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<ReviewResource>>> {
    let user = viewable(&state, &actor, &user).await?;
    authorize(&actor, Resource::Review, Action::ViewAny)?;
    let page = ReviewService::new(&state.db).by_user(user.id, query.into()).await?;
    Ok(paginated("Reviews retrieved", page))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn posts(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<PostResource>>> {
    let user = viewable(&state, &actor, &user).await?;
    authorize(&actor, Resource::Post, Action::ViewAny)?;
    let page = PostService::new(&state.db).by_user(user.id, query.into()).await?;
    Ok(paginated("Posts retrieved", page))
}

/// Post on one's own timeline.
///
/// # Errors
/// Returns forbidden when the route names another user, or not found, validation and
/// database errors.
pub async fn store_post(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user): Path<String>,
    ValidatedJson(payload): ValidatedJson<StorePostRequest>,
) -> AppResult<Created<PostResource>> {
    let user = viewable(&state, &actor, &user).await?;
    authorize(&actor, Resource::Post, Action::Create)?;
    if user.id != actor.id {
        return Err(AppError::Forbidden);
    }
    if let Some(book_id) = payload.book_id {
        ensure_exists(&state.db, "books", "book_id", &[book_id]).await?;
    }

    let dto = StorePostDto::from_request(payload, user.id)?;
    let post = PostService::new(&state.db).store(dto).await?;
    Ok(created("Post created", post.into()))
}

/// Idempotent.
///
/// # Errors
/// Returns a conflict on self-follow, or not found and database errors.
pub async fn follow(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user): Path<String>,
) -> AppResult<JsonResponse<UserResource>> {
    let user = viewable(&state, &actor, &user).await?;
    UserService::new(&state.db).follow(actor.id, user.id).await?;
    Ok(ok("User followed", user.into()))
}

/// Idempotent.
///
/// # Errors
/// Returns not found or database errors.
pub async fn unfollow(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user): Path<String>,
) -> AppResult<JsonResponse<UserResource>> {
    let user = viewable(&state, &actor, &user).await?;
    UserService::new(&state.db).unfollow(actor.id, user.id).await?;
    Ok(ok("User unfollowed", user.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn followers(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<UserResource>>> {
    let user = viewable(&state, &actor, &user).await?;
    authorize(&actor, Resource::User, Action::ViewAny)?;
    let page = UserService::new(&state.db)
        .followers(user.id, query.into())
        .await?;
    Ok(paginated("Followers retrieved", page))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn following(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<UserResource>>> {
    let user = viewable(&state, &actor, &user).await?;
    authorize(&actor, Resource::User, Action::ViewAny)?;
    let page = UserService::new(&state.db)
        .following(user.id, query.into())
        .await?;
    Ok(paginated("Following retrieved", page))
}
