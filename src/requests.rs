//! Request rule sets for create endpoints.
//!
//! Every field is optional at the type level so that a missing key is reported as a
//! `required` violation alongside every other failing field, instead of aborting
//! deserialization on the first one.

use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::models::CommentableType;
use crate::permissions::Role;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(required, length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(required, email)]
    pub email: Option<String>,
    #[validate(required, length(min = 8))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(required, email)]
    pub email: Option<String>,
    #[validate(required, length(min = 8))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StoreAuthorRequest {
    #[validate(required, length(min = 1, max = 255))]
    pub first_name: Option<String>,
    #[validate(required, length(min = 1, max = 255))]
    pub last_name: Option<String>,
    #[validate(required, length(min = 1, max = 100))]
    pub nationality: Option<String>,
    #[validate(length(max = 5000))]
    pub biography: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StoreBookRequest {
    #[validate(required, length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(required, length(min = 1))]
    pub synopsis: Option<String>,
    #[validate(required, length(min = 10, max = 17))]
    pub isbn: Option<String>,
    #[validate(required, range(min = 1))]
    pub pages_amount: Option<i64>,
    #[validate(required, range(min = 1))]
    pub chapters_amount: Option<i64>,
    #[validate(required)]
    pub published_at: Option<NaiveDate>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(required, length(min = 1))]
    pub author_ids: Option<Vec<i64>>,
    pub genre_ids: Option<Vec<i64>>,
    pub tag_ids: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct BookFilterRequest {
    #[validate(length(max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 255))]
    pub author: Option<String>,
    #[validate(length(max = 255))]
    pub genre: Option<String>,
    #[validate(length(max = 255))]
    pub tag: Option<String>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PageRequest {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StoreGenreRequest {
    #[validate(required, length(min = 1, max = 100))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StoreTagRequest {
    #[validate(required, length(min = 1, max = 100))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StorePostRequest {
    #[validate(required)]
    pub book_id: Option<i64>,
    #[validate(required, length(min = 1))]
    pub body: Option<String>,
    #[validate(required, range(min = 0, max = 100))]
    pub progress: Option<i64>,
}

/// Post created under `/books/{book}/posts`; the book comes from the route.
#[derive(Debug, Deserialize, Validate)]
pub struct BookPostRequest {
    #[validate(required, length(min = 1))]
    pub body: Option<String>,
    #[validate(required, range(min = 0, max = 100))]
    pub progress: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StoreReviewRequest {
    #[validate(required)]
    pub book_id: Option<i64>,
    #[validate(required, range(min = 1, max = 5))]
    pub rating: Option<i64>,
    #[validate(required, length(min = 1, max = 5000))]
    pub comment: Option<String>,
}

/// Review created under `/books/{book}/reviews`.
#[derive(Debug, Deserialize, Validate)]
pub struct BookReviewRequest {
    #[validate(required, range(min = 1, max = 5))]
    pub rating: Option<i64>,
    #[validate(required, length(min = 1, max = 5000))]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StoreCommentRequest {
    #[validate(required)]
    pub commentable_type: Option<CommentableType>,
    #[validate(required)]
    pub commentable_id: Option<i64>,
    #[validate(required, length(min = 1, max = 2000))]
    pub body: Option<String>,
}

/// Comment created under a book, post or review route.
#[derive(Debug, Deserialize, Validate)]
pub struct NestedCommentRequest {
    #[validate(required, length(min = 1, max = 2000))]
    pub body: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StoreUserRequest {
    #[validate(required, length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(required, email)]
    pub email: Option<String>,
    #[validate(required, length(min = 8))]
    pub password: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[validate(length(max = 5000))]
    pub biography: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub roles: Option<Vec<Role>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignTagRequest {
    #[validate(required)]
    pub tag_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReadingProgressRequest {
    #[validate(required, range(min = 0))]
    pub pages_read: Option<i64>,
}
