use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    dto::{StoreGenreDto, UpdateGenreDto},
    errors::AppResult,
    extract::{ValidatedJson, ValidatedQuery},
    permissions::{Action, Resource},
    policy::{AuthUser, authorize, authorize_on},
    requests::{PageRequest, StoreGenreRequest},
    resources::{Created, GenreResource, JsonResponse, created, ok, paginated},
    services::GenreService,
};

/// # Errors
/// Returns forbidden or database errors.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<GenreResource>>> {
    authorize(&actor, Resource::Genre, Action::ViewAny)?;
    let page = GenreService::new(&state.db).index(query.into()).await?;
    Ok(paginated("Genres retrieved", page))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(genre): Path<String>,
) -> AppResult<JsonResponse<GenreResource>> {
    let genre = GenreService::new(&state.db).show(&genre).await?;
    authorize_on(&actor, Resource::Genre, Action::View, &genre)?;
    Ok(ok("Genre retrieved", genre.into()))
}

/// # Errors
/// Returns forbidden, validation or database errors.
pub async fn store(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<StoreGenreRequest>,
) -> AppResult<Created<GenreResource>> {
    authorize(&actor, Resource::Genre, Action::Create)?;
    let dto = StoreGenreDto::from_request(payload)?;
    let genre = GenreService::new(&state.db).store(dto).await?;
    Ok(created("Genre created", genre.into()))
}

/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(genre): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateGenreDto>,
) -> AppResult<JsonResponse<GenreResource>> {
    let service = GenreService::new(&state.db);
    let genre = service.find(&genre).await?;
    authorize_on(&actor, Resource::Genre, Action::Update, &genre)?;
    let genre = service.update(dto, &genre).await?;
    Ok(ok("Genre updated", genre.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(genre): Path<String>,
) -> AppResult<StatusCode> {
    let service = GenreService::new(&state.db);
    let genre = service.find(&genre).await?;
    authorize_on(&actor, Resource::Genre, Action::Delete, &genre)?;
    service.destroy(&genre).await?;
    Ok(StatusCode::NO_CONTENT)
}
