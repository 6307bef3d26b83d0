use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    dto::{StoreTagDto, UpdateTagDto},
    errors::AppResult,
    extract::{ValidatedJson, ValidatedQuery},
    permissions::{Action, Resource},
    policy::{AuthUser, authorize, authorize_on},
    requests::{PageRequest, StoreTagRequest},
    resources::{Created, JsonResponse, TagResource, created, ok, paginated},
    services::TagService,
};

/// # Errors
/// Returns forbidden or database errors.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<TagResource>>> {
    authorize(&actor, Resource::Tag, Action::ViewAny)?;
    let page = TagService::new(&state.db).index(query.into()).await?;
    Ok(paginated("Tags retrieved", page))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(tag): Path<String>,
) -> AppResult<JsonResponse<TagResource>> {
    let tag = TagService::new(&state.db).show(&tag).await?;
    authorize_on(&actor, Resource::Tag, Action::View, &tag)?;
    Ok(ok("Tag retrieved", tag.into()))
}

/// # Errors
/// Returns forbidden, validation or database errors.
pub async fn store(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<StoreTagRequest>,
) -> AppResult<Created<TagResource>> {
    authorize(&actor, Resource::Tag, Action::Create)?;
    let dto = StoreTagDto::from_request(payload)?;
    let tag = TagService::new(&state.db).store(dto).await?;
    Ok(created("Tag created", tag.into()))
}

/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(tag): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateTagDto>,
) -> AppResult<JsonResponse<TagResource>> {
    let service = TagService::new(&state.db);
    let tag = service.find(&tag).await?;
    authorize_on(&actor, Resource::Tag, Action::Update, &tag)?;
    let tag = service.update(dto, &tag).await?;
    Ok(ok("Tag updated", tag.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(tag): Path<String>,
) -> AppResult<StatusCode> {
    let service = TagService::new(&state.db);
    let tag = service.find(&tag).await?;
    authorize_on(&actor, Resource::Tag, Action::Delete, &tag)?;
    service.destroy(&tag).await?;
    Ok(StatusCode::NO_CONTENT)
}
