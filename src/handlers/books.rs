use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    dto::{BookFilterDto, StoreBookDto, StoreCommentDto, StorePostDto, StoreReviewDto, UpdateBookDto},
    errors::AppResult,
    extract::{ValidatedJson, ValidatedQuery},
    models::{Book, Commentable},
    permissions::{Action, Resource},
    policy::{AuthUser, authorize, authorize_on},
    requests::{
        AssignTagRequest, BookFilterRequest, BookPostRequest, BookReviewRequest,
        NestedCommentRequest, PageRequest, ReadingProgressRequest, StoreBookRequest,
    },
    resources::{
        BookResource, CommentResource, Created, JsonResponse, PostResource, ReviewResource,
        created, ok, paginated,
    },
    services::{
        BookService, CommentService, PostService, ReviewService, TagService, ensure_exists,
    },
};

/// Filtered listing. `tag` filters on the caller's own shelf.
///
/// # Errors
/// Returns forbidden, validation or database errors.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<BookFilterRequest>,
) -> AppResult<JsonResponse<Vec<BookResource>>> {
    authorize(&actor, Resource::Book, Action::ViewAny)?;
    let filter = BookFilterDto::from(query);
    let page = BookService::new(&state.db).index(&filter, actor.id).await?;
    Ok(paginated("Books retrieved", page))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(book): Path<String>,
) -> AppResult<JsonResponse<BookResource>> {
    let book = BookService::new(&state.db).show(&book, actor.id).await?;
    authorize_on(&actor, Resource::Book, Action::View, &book)?;
    Ok(ok("Book retrieved", book.into()))
}

/// The creating author owns the book.
///
/// # Errors
/// Returns forbidden, validation or database errors.
pub async fn store(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<StoreBookRequest>,
) -> AppResult<Created<BookResource>> {
    authorize(&actor, Resource::Book, Action::Create)?;
    if let Some(ids) = &payload.author_ids {
        ensure_exists(&state.db, "authors", "author_ids", ids).await?;
    }
    if let Some(ids) = &payload.genre_ids {
        ensure_exists(&state.db, "genres", "genre_ids", ids).await?;
    }
    if let Some(ids) = &payload.tag_ids {
        ensure_exists(&state.db, "tags", "tag_ids", ids).await?;
    }

    let dto = StoreBookDto::from_request(payload, actor.id)?;
    let book = BookService::new(&state.db).store(dto).await?;
    Ok(created("Book created", book.into()))
}

/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(book): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdateBookDto>,
) -> AppResult<JsonResponse<BookResource>> {
    let service = BookService::new(&state.db);
    let book = service.find(&book).await?;
    authorize_on(&actor, Resource::Book, Action::Update, &book)?;
    if let Some(ids) = dto.author_ids.value() {
        ensure_exists(&state.db, "authors", "author_ids", ids).await?;
    }
    if let Some(ids) = dto.genre_ids.value() {
        ensure_exists(&state.db, "genres", "genre_ids", ids).await?;
    }
    if let Some(ids) = dto.tag_ids.value() {
        ensure_exists(&state.db, "tags", "tag_ids", ids).await?;
    }

    let book = service.update(dto, &book, actor.id).await?;
    Ok(ok("Book updated", book.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(book): Path<String>,
) -> AppResult<StatusCode> {
    let service = BookService::new(&state.db);
    let book = service.find(&book).await?;
    authorize_on(&actor, Resource::Book, Action::Delete, &book)?;
    service.destroy(&book).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn viewable(state: &AppState, actor: &AuthUser, slug: &str) -> AppResult<Book> {
    let book = BookService::new(&state.db).find(slug).await?;
    authorize_on(actor, Resource::Book, Action::View, &book)?;
    Ok(book)
}

/// Shelve the book for the caller under a tag.
///
/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn assign_tag(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(book): Path<String>,
    ValidatedJson(payload): ValidatedJson<AssignTagRequest>,
) -> AppResult<JsonResponse<BookResource>> {
    let book = viewable(&state, &actor, &book).await?;
    let tag_id = payload.tag_id.unwrap_or_default();
    ensure_exists(&state.db, "tags", "tag_id", &[tag_id]).await?;
    let tag = TagService::new(&state.db).find_by_id(tag_id).await?;

    let book = BookService::new(&state.db)
        .assign_tag(&book, actor.id, &tag)
        .await?;
    Ok(ok("Tag assigned", book.into()))
}

/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn reading_progress(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(book): Path<String>,
    ValidatedJson(payload): ValidatedJson<ReadingProgressRequest>,
) -> AppResult<JsonResponse<BookResource>> {
    let book = viewable(&state, &actor, &book).await?;
    let book = BookService::new(&state.db)
        .update_progress(&book, actor.id, payload.pages_read.unwrap_or_default())
        .await?;
    Ok(ok("Reading progress updated", book.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn posts(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(book): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<PostResource>>> {
    let book = viewable(&state, &actor, &book).await?;
    authorize(&actor, Resource::Post, Action::ViewAny)?;
    let page = PostService::new(&state.db).by_book(book.id, query.into()).await?;
    Ok(paginated("Posts retrieved", page))
}

/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn store_post(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(book): Path<String>,
    ValidatedJson(payload): ValidatedJson<BookPostRequest>,
) -> AppResult<Created<PostResource>> {
    let book = viewable(&state, &actor, &book).await?;
    authorize(&actor, Resource::Post, Action::Create)?;
    let dto = StorePostDto::for_book(payload, book.id, actor.id)?;
    let post = PostService::new(&state.db).store(dto).await?;
    Ok(created("Post created", post.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn reviews(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(book): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<ReviewResource>>> {
    let book = viewable(&state, &actor, &book).await?;
    authorize(&actor, Resource::Review, Action::ViewAny)?;
    let page = ReviewService::new(&state.db).by_book(book.id, query.into()).await?;
    Ok(paginated("Reviews retrieved", page))
}

/// Only readers who completed the book may review it.
///
/// # Errors
/// Returns a conflict when the book is not completed, or not found, forbidden,
/// validation and database errors.
pub async fn store_review(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(book): Path<String>,
    ValidatedJson(payload): ValidatedJson<BookReviewRequest>,
) -> AppResult<Created<ReviewResource>> {
    let book = viewable(&state, &actor, &book).await?;
    authorize(&actor, Resource::Review, Action::Create)?;
    let dto = StoreReviewDto::for_book(payload, book.id, actor.id)?;
    let review = ReviewService::new(&state.db).store(dto, &book).await?;
    Ok(created("Review created", review.into()))
}

/// # Errors
/// Returns not found, forbidden or database errors.
pub async fn comments(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(book): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PageRequest>,
) -> AppResult<JsonResponse<Vec<CommentResource>>> {
    let book = viewable(&state, &actor, &book).await?;
    authorize(&actor, Resource::Comment, Action::ViewAny)?;
    let page = CommentService::new(&state.db)
        .by_commentable(Commentable::Book(book.id), query.into())
        .await?;
    Ok(paginated("Comments retrieved", page))
}

/// # Errors
/// Returns not found, forbidden, validation or database errors.
pub async fn store_comment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(book): Path<String>,
    ValidatedJson(payload): ValidatedJson<NestedCommentRequest>,
) -> AppResult<Created<CommentResource>> {
    let book = viewable(&state, &actor, &book).await?;
    authorize(&actor, Resource::Comment, Action::Create)?;
    let dto = StoreCommentDto::nested(payload, Commentable::Book(book.id), actor.id)?;
    let comment = CommentService::new(&state.db)
        .store_by_book(book.id, dto.user_id, dto.body)
        .await?;
    Ok(created("Comment created", comment.into()))
}
