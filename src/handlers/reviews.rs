use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    dto::{StoreCommentDto, StoreReviewDto, UpdateReviewDto},
    errors::AppResult,
    extract::{ValidatedJson, ValidatedQuery},
    handlers::parse_id,
    models::{Commentable, Review},
    permissions::{Action, Resource},
    policy::{AuthUser, authorize, authorize_on},
    requests::{NestedCommentRequest, PageRequest, StoreReviewRequest},
    resources::{CommentResource, Created, JsonResponse, ReviewResource, created, ok, paginated},
    services::{BookService, CommentService, Reaction, ReviewService, ensure_exists},
};

/// Reviews with their book and reviewer.
///
/// # Errors
/// Returns forbidden or database errors.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<ReviewResource>>> {
    authorize(&actor, Resource::Review, Action::ViewAny)?;
    let page = ReviewService::new(&state.db).index(query.into()).await?;
    Ok(paginated("Reviews retrieved", page))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(review): Path<String>,
) -> AppResult<JsonResponse<ReviewResource>> {
    let review = ReviewService::new(&state.db).show(parse_id(&review)?).await?;
    authorize_on(&actor, Resource::Review, Action::View, &review)?;
    Ok(ok("Review retrieved", review.into()))
}

/// # Errors
/// Returns a conflict when the book is not completed, or forbidden, validation and
/// database errors.
pub async fn store(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<StoreReviewRequest>,
) -> AppResult<Created<ReviewResource>> {
    authorize(&actor, Resource::Review, Action::Create)?;
    if let Some(book_id) = payload.book_id {
        ensure_exists(&state.db, "books", "book_id", &[book_id]).await?;
    }

    let dto = StoreReviewDto::from_request(payload, actor.id)?;
    let book = BookService::new(&state.db).find_by_id(dto.book_id).await?;
    let review = ReviewService::new(&state.db).store(dto, &book).await?;
    Ok(created("Review created", review.into()))
}

/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(review): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateReviewDto>,
) -> AppResult<JsonResponse<ReviewResource>> {
    let service = ReviewService::new(&state.db);
    let review = service.find(parse_id(&review)?).await?;
    authorize_on(&actor, Resource::Review, Action::Update, &review)?;
    let review = service.update(dto, &review).await?;
    Ok(ok("Review updated", review.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(review): Path<String>,
) -> AppResult<StatusCode> {
    let service = ReviewService::new(&state.db);
    let review = service.find(parse_id(&review)?).await?;
    authorize_on(&actor, Resource::Review, Action::Delete, &review)?;
    service.destroy(&review).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn viewable(state: &AppState, actor: &AuthUser, key: &str) -> AppResult<Review> {
    let review = ReviewService::new(&state.db).find(parse_id(key)?).await?;
    authorize_on(actor, Resource::Review, Action::View, &review)?;
    Ok(review)
}

async fn react(
    state: &AppState,
    actor: &AuthUser,
    key: &str,
    reaction: Reaction,
) -> AppResult<JsonResponse<ReviewResource>> {
    let review = viewable(state, actor, key).await?;
    let review = ReviewService::new(&state.db)
        .react(review.id, actor.id, reaction)
        .await?;
    Ok(ok(reaction.done_message(), review.into()))
}

/// # Errors
/// Returns a conflict when the caller already liked the review.
pub async fn like(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(review): Path<String>,
) -> AppResult<JsonResponse<ReviewResource>> {
    react(&state, &actor, &review, Reaction::Like).await
}

/// # Errors
/// Returns a conflict when the caller already disliked the review.
pub async fn dislike(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(review): Path<String>,
) -> AppResult<JsonResponse<ReviewResource>> {
    react(&state, &actor, &review, Reaction::Dislike).await
}

/// Withdraw the caller's like or dislike.
///
/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn unlike(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(review): Path<String>,
) -> AppResult<JsonResponse<ReviewResource>> {
    let review = viewable(&state, &actor, &review).await?;
    let review = ReviewService::new(&state.db)
        .retract(review.id, actor.id)
        .await?;
    Ok(ok("Reaction removed", review.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn comments(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(review): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<CommentResource>>> {
    let review = viewable(&state, &actor, &review).await?;
    authorize(&actor, Resource::Comment, Action::ViewAny)?;
    let page = CommentService::new(&state.db)
        .by_commentable(Commentable::Review(review.id), query.into())
        .await?;
    Ok(paginated("Comments retrieved", page))
}

/// Commenting on a review requires following the reviewer.
///
/// # Errors
/// Returns a conflict when the caller does not follow the reviewer, or not found,
/// forbidden, validation and database errors.
pub async fn store_comment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(review): Path<String>,
    ValidatedJson(payload): ValidatedJson<NestedCommentRequest>,
) -> AppResult<Created<CommentResource>> {
    let review = viewable(&state, &actor, &review).await?;
    authorize(&actor, Resource::Comment, Action::Create)?;
    let dto = StoreCommentDto::nested(payload, Commentable::Review(review.id), actor.id)?;
    let comment = CommentService::new(&state.db)
        .store_by_review(&review, dto.user_id, dto.body)
        .await?;
    Ok(created("Comment created", comment.into()))
}
