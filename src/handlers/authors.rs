use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    dto::{StoreAuthorDto, UpdateAuthorDto},
    errors::{AppError, AppResult},
    extract::{ValidatedJson, ValidatedQuery},
    permissions::{Action, Resource},
    policy::{AuthUser, authorize, authorize_on},
    requests::{PageRequest, StoreAuthorRequest},
    resources::{AuthorResource, Created, JsonResponse, created, ok, paginated},
    services::{AuthorService, ensure_exists},
};

/// # Errors
/// Returns forbidden or database errors.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<AuthorResource>>> {
    authorize(&actor, Resource::Author, Action::ViewAny)?;
    let page = AuthorService::new(&state.db).index(query.into()).await?;
    Ok(paginated("Authors retrieved", page))
}

/// Author with their books.
///
/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(author): Path<String>,
) -> AppResult<JsonResponse<AuthorResource>> {
    let author = AuthorService::new(&state.db).show(&author).await?;
    authorize_on(&actor, Resource::Author, Action::View, &author)?;
    Ok(ok("Author retrieved", author.into()))
}

/// # Errors
/// Returns forbidden, validation or database errors.
pub async fn store(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<StoreAuthorRequest>,
) -> AppResult<Created<AuthorResource>> {
    authorize(&actor, Resource::Author, Action::Create)?;
    if let Some(user_id) = payload.user_id {
        ensure_exists(&state.db, "users", "user_id", &[user_id]).await?;
    }

    let dto = StoreAuthorDto::from_request(payload)?;
    let author = AuthorService::new(&state.db).store(dto).await?;
    Ok(created("Author created", author.into()))
}

/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(author): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateAuthorDto>,
) -> AppResult<JsonResponse<AuthorResource>> {
    let service = AuthorService::new(&state.db);
    let author = service.find(&author).await?;
    authorize_on(&actor, Resource::Author, Action::Update, &author)?;
    if !dto.user_id.is_missing() && !actor.is_admin() {
        return Err(AppError::Forbidden);
    }
    if let Some(user_id) = dto.user_id.value() {
        ensure_exists(&state.db, "users", "user_id", &[*user_id]).await?;
    }

    let author = service.update(dto, &author).await?;
    Ok(ok("Author updated", author.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(author): Path<String>,
) -> AppResult<StatusCode> {
    let service = AuthorService::new(&state.db);
    let author = service.find(&author).await?;
    authorize_on(&actor, Resource::Author, Action::Delete, &author)?;
    service.destroy(&author).await?;
    Ok(StatusCode::NO_CONTENT)
}
