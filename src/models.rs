use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::Role;
use crate::policy::Owned;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub birth_date: Option<NaiveDate>,
    pub biography: Option<String>,
    pub image_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
    #[sqlx(skip)]
    pub roles: Option<Vec<Role>>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Author {
    pub id: i64,
    pub user_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub nationality: String,
    pub biography: Option<String>,
    pub image_url: Option<String>,
    pub slug: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
    #[sqlx(skip)]
    pub books: Option<Vec<Book>>,
}

impl Author {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Book {
    pub id: i64,
    pub user_id: Option<i64>,
    pub title: String,
    pub synopsis: String,
    pub isbn: String,
    pub pages_amount: i64,
    pub chapters_amount: i64,
    pub published_at: NaiveDate,
    pub image_url: Option<String>,
    pub slug: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
    #[sqlx(skip)]
    pub authors: Option<Vec<Author>>,
    #[sqlx(skip)]
    pub genres: Option<Vec<Genre>>,
    #[sqlx(skip)]
    pub tags: Option<Vec<Tag>>,
    #[sqlx(skip)]
    pub reading: Option<Reading>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
    #[sqlx(skip)]
    pub books: Option<Vec<Book>>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
    #[sqlx(skip)]
    pub books: Option<Vec<Book>>,
}

/// A reader's row on the book-user pivot.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Reading {
    pub book_id: i64,
    pub user_id: i64,
    pub tag_id: Option<i64>,
    pub pages_read: i64,
    #[sqlx(skip)]
    pub tag: Option<Tag>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub body: String,
    pub progress: i64,
    pub slug: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
    #[sqlx(skip)]
    pub book: Option<Book>,
    #[sqlx(skip)]
    pub user: Option<User>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Review {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub rating: i64,
    pub comment: String,
    pub like_count: i64,
    pub dislike_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
    #[sqlx(skip)]
    pub book: Option<Book>,
    #[sqlx(skip)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommentableType {
    Book,
    Post,
    Review,
}

/// Owner of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commentable {
    Book(i64),
    Post(i64),
    Review(i64),
}

impl Commentable {
    #[must_use]
    pub fn new(kind: CommentableType, id: i64) -> Self {
        match kind {
            CommentableType::Book => Commentable::Book(id),
            CommentableType::Post => Commentable::Post(id),
            CommentableType::Review => Commentable::Review(id),
        }
    }

    #[must_use]
    pub fn kind(self) -> CommentableType {
        match self {
            Commentable::Book(_) => CommentableType::Book,
            Commentable::Post(_) => CommentableType::Post,
            Commentable::Review(_) => CommentableType::Review,
        }
    }

    #[must_use]
    pub fn id(self) -> i64 {
        match self {
            Commentable::Book(id) | Commentable::Post(id) | Commentable::Review(id) => id,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub user_id: i64,
    pub body: String,
    pub slug: String,
    pub commentable_type: CommentableType,
    pub commentable_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
    #[sqlx(skip)]
    pub user: Option<User>,
}

impl Comment {
    #[must_use]
    pub fn commentable(&self) -> Commentable {
        Commentable::new(self.commentable_type, self.commentable_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LikeableType {
    Review,
}

/// Target of a like or dislike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Likeable {
    Review(i64),
}

impl Likeable {
    #[must_use]
    pub fn kind(self) -> LikeableType {
        match self {
            Likeable::Review(_) => LikeableType::Review,
        }
    }

    #[must_use]
    pub fn id(self) -> i64 {
        match self {
            Likeable::Review(id) => id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub jti: Uuid,
    pub exp: usize,
    pub refresh: bool,
}

impl Owned for User {
    fn owner_id(&self) -> Option<i64> {
        Some(self.id)
    }
}

impl Owned for Author {
    fn owner_id(&self) -> Option<i64> {
        self.user_id
    }
}

impl Owned for Book {
    fn owner_id(&self) -> Option<i64> {
        self.user_id
    }
}

impl Owned for Genre {
    fn owner_id(&self) -> Option<i64> {
        None
    }
}

impl Owned for Tag {
    fn owner_id(&self) -> Option<i64> {
        None
    }
}

impl Owned for Post {
    fn owner_id(&self) -> Option<i64> {
        Some(self.user_id)
    }
}

impl Owned for Review {
    fn owner_id(&self) -> Option<i64> {
        Some(self.user_id)
    }
}

impl Owned for Comment {
    fn owner_id(&self) -> Option<i64> {
        Some(self.user_id)
    }
}
