//! JSON shapes returned by the API.
//!
//! Relations are `Option`s skipped when `None`: a relation that was never loaded is absent
//! from the payload, while a loaded but empty one serializes as `[]`.

use axum::{Json, http::StatusCode};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::models::{
    Author, Book, Comment, CommentableType, Genre, Post, Reading, Review, Tag, User,
};
use crate::permissions::{Permission, Role, Scope};
use crate::services::Page;
use crate::utils::IssuedTokens;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

pub type JsonResponse<T> = Json<ApiResponse<T>>;
pub type Created<T> = (StatusCode, JsonResponse<T>);

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub per_page: u32,
    pub total: i64,
    pub last_page: i64,
}

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> JsonResponse<T> {
    Json(ApiResponse {
        success: true,
        message: message.into(),
        data,
        meta: None,
    })
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> Created<T> {
    (StatusCode::CREATED, ok(message, data))
}

/// Listing envelope with pagination meta.
pub fn paginated<T, R>(message: impl Into<String>, page: Page<T>) -> JsonResponse<Vec<R>>
where
    R: Serialize + From<T>,
{
    let meta = PageMeta {
        current_page: page.params.page,
        per_page: page.params.per_page,
        total: page.total,
        last_page: page.last_page(),
    };
    Json(ApiResponse {
        success: true,
        message: message.into(),
        data: page.items.into_iter().map(R::from).collect(),
        meta: Some(meta),
    })
}

fn many<T, R: From<T>>(items: Option<Vec<T>>) -> Option<Vec<R>> {
    items.map(|list| list.into_iter().map(R::from).collect())
}

#[derive(Debug, Serialize)]
pub struct UserResource {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub birth_date: Option<NaiveDate>,
    pub biography: Option<String>,
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Role>>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<User> for UserResource {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            birth_date: user.birth_date,
            biography: user.biography,
            image_url: user.image_url,
            roles: user.roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorResource {
    pub id: i64,
    pub user_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub nationality: String,
    pub biography: Option<String>,
    pub image_url: Option<String>,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<BookResource>>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Author> for AuthorResource {
    fn from(author: Author) -> Self {
        Self {
            full_name: author.full_name(),
            id: author.id,
            user_id: author.user_id,
            first_name: author.first_name,
            last_name: author.last_name,
            nationality: author.nationality,
            biography: author.biography,
            image_url: author.image_url,
            slug: author.slug,
            books: many(author.books),
            created_at: author.created_at,
            updated_at: author.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookResource {
    pub id: i64,
    pub title: String,
    pub synopsis: String,
    pub isbn: String,
    pub pages_amount: i64,
    pub chapters_amount: i64,
    pub published_at: NaiveDate,
    pub image_url: Option<String>,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<AuthorResource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<GenreResource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagResource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<ReadingResource>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Book> for BookResource {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            synopsis: book.synopsis,
            isbn: book.isbn,
            pages_amount: book.pages_amount,
            chapters_amount: book.chapters_amount,
            published_at: book.published_at,
            image_url: book.image_url,
            slug: book.slug,
            authors: many(book.authors),
            genres: many(book.genres),
            tags: many(book.tags),
            reading: book.reading.map(ReadingResource::from),
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// The caller's own progress on a book.
#[derive(Debug, Serialize)]
pub struct ReadingResource {
    pub pages_read: i64,
    pub tag: Option<TagResource>,
}

impl From<Reading> for ReadingResource {
    fn from(reading: Reading) -> Self {
        Self {
            pages_read: reading.pages_read,
            tag: reading.tag.map(TagResource::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenreResource {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<BookResource>>,
}

impl From<Genre> for GenreResource {
    fn from(genre: Genre) -> Self {
        Self {
            id: genre.id,
            name: genre.name,
            slug: genre.slug,
            books: many(genre.books),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TagResource {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<BookResource>>,
}

impl From<Tag> for TagResource {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            slug: tag.slug,
            books: many(tag.books),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostResource {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub body: String,
    pub progress: i64,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<BookResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResource>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Post> for PostResource {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            book_id: post.book_id,
            user_id: post.user_id,
            body: post.body,
            progress: post.progress,
            slug: post.slug,
            book: post.book.map(BookResource::from),
            user: post.user.map(UserResource::from),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewResource {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub rating: i64,
    pub comment: String,
    pub like_count: i64,
    pub dislike_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<BookResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResource>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Review> for ReviewResource {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            book_id: review.book_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment,
            like_count: review.like_count,
            dislike_count: review.dislike_count,
            book: review.book.map(BookResource::from),
            user: review.user.map(UserResource::from),
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentResource {
    pub id: i64,
    pub body: String,
    pub slug: String,
    pub commentable_type: CommentableType,
    pub commentable_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResource>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Comment> for CommentResource {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            body: comment.body,
            slug: comment.slug,
            commentable_type: comment.commentable_type,
            commentable_id: comment.commentable_id,
            user: comment.user.map(UserResource::from),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResource {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_at: usize,
}

impl From<IssuedTokens> for TokenResource {
    fn from(tokens: IssuedTokens) -> Self {
        Self {
            expires_at: tokens.access_claims.exp,
            access_token: tokens.access,
            refresh_token: tokens.refresh,
            token_type: "Bearer",
        }
    }
}

/// Registration and login payload: the account plus a fresh token pair.
#[derive(Debug, Serialize)]
pub struct SessionResource {
    pub user: UserResource,
    #[serde(flatten)]
    pub tokens: TokenResource,
}

#[derive(Debug, Serialize)]
pub struct GrantResource {
    pub permission: String,
    pub scope: Scope,
}

/// One role with the permissions it bundles.
#[derive(Debug, Serialize)]
pub struct RoleResource {
    pub role: Role,
    pub permissions: Vec<GrantResource>,
}

impl RoleResource {
    #[must_use]
    pub fn new(role: Role, bundle: Vec<(Permission, Scope)>) -> Self {
        Self {
            role,
            permissions: bundle
                .into_iter()
                .map(|(permission, scope)| GrantResource {
                    permission: permission.to_string(),
                    scope,
                })
                .collect(),
        }
    }
}
