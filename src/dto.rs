//! Data transfer objects handed to the service layer.
//!
//! Store DTOs are built from a validated request plus route and auth context and carry
//! every required field as a plain value. Update DTOs carry `Patch` fields and expose only
//! the supplied ones through `to_map`.

use std::borrow::Cow;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use validator::{Validate, ValidateEmail, ValidateUrl, ValidationError, ValidationErrors};

use crate::errors::{AppError, AppResult};
use crate::models::{Commentable, CommentableType};
use crate::patch::{Patch, PatchMap};
use crate::permissions::Role;
use crate::requests::{
    BookFilterRequest, BookPostRequest, BookReviewRequest, NestedCommentRequest, PageRequest,
    RegisterRequest, StoreAuthorRequest, StoreBookRequest, StoreCommentRequest, StoreGenreRequest,
    StorePostRequest, StoreReviewRequest, StoreTagRequest, StoreUserRequest,
};

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

fn required<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| {
        AppError::invalid(
            field,
            format!("The {} field is required.", field.replace('_', " ")),
        )
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageParams {
    #[must_use]
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    #[must_use]
    pub fn offset(self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    #[must_use]
    pub fn limit(self) -> i64 {
        i64::from(self.per_page)
    }
}

impl From<PageRequest> for PageParams {
    fn from(req: PageRequest) -> Self {
        Self::new(req.page, req.per_page)
    }
}

#[derive(Debug, Clone)]
pub struct RegisterDto {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterDto {
    /// # Errors
    /// Returns a validation error if a required field is absent.
    pub fn from_request(req: RegisterRequest) -> AppResult<Self> {
        Ok(Self {
            name: required(req.name, "name")?,
            email: required(req.email, "email")?,
            password: required(req.password, "password")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoreAuthorDto {
    pub first_name: String,
    pub last_name: String,
    pub nationality: String,
    pub biography: Option<String>,
    pub image_url: Option<String>,
    pub user_id: Option<i64>,
}

impl StoreAuthorDto {
    /// # Errors
    /// Returns a validation error if a required field is absent.
    pub fn from_request(req: StoreAuthorRequest) -> AppResult<Self> {
        Ok(Self {
            first_name: required(req.first_name, "first_name")?,
            last_name: required(req.last_name, "last_name")?,
            nationality: required(req.nationality, "nationality")?,
            biography: req.biography,
            image_url: req.image_url,
            user_id: req.user_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoreBookDto {
    pub user_id: i64,
    pub title: String,
    pub synopsis: String,
    pub isbn: String,
    pub pages_amount: i64,
    pub chapters_amount: i64,
    pub published_at: NaiveDate,
    pub image_url: Option<String>,
    pub author_ids: Vec<i64>,
    pub genre_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
}

impl StoreBookDto {
    /// The creating user becomes the owner of the book.
    ///
    /// # Errors
    /// Returns a validation error if a required field is absent.
    pub fn from_request(req: StoreBookRequest, user_id: i64) -> AppResult<Self> {
        Ok(Self {
            user_id,
            title: required(req.title, "title")?,
            synopsis: required(req.synopsis, "synopsis")?,
            isbn: required(req.isbn, "isbn")?,
            pages_amount: required(req.pages_amount, "pages_amount")?,
            chapters_amount: required(req.chapters_amount, "chapters_amount")?,
            published_at: required(req.published_at, "published_at")?,
            image_url: req.image_url,
            author_ids: required(req.author_ids, "author_ids")?,
            genre_ids: req.genre_ids.unwrap_or_default(),
            tag_ids: req.tag_ids.unwrap_or_default(),
        })
    }
}

/// Book listing filter. An absent field does not filter.
#[derive(Debug, Clone, Default)]
pub struct BookFilterDto {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub tag: Option<String>,
    pub page: PageParams,
}

impl From<BookFilterRequest> for BookFilterDto {
    fn from(req: BookFilterRequest) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            title: non_empty(req.title),
            author: non_empty(req.author),
            genre: non_empty(req.genre),
            tag: non_empty(req.tag),
            page: PageParams::new(req.page, req.per_page),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreGenreDto {
    pub name: String,
}

impl StoreGenreDto {
    /// # Errors
    /// Returns a validation error if the name is absent.
    pub fn from_request(req: StoreGenreRequest) -> AppResult<Self> {
        Ok(Self {
            name: required(req.name, "name")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoreTagDto {
    pub name: String,
}

impl StoreTagDto {
    /// # Errors
    /// Returns a validation error if the name is absent.
    pub fn from_request(req: StoreTagRequest) -> AppResult<Self> {
        Ok(Self {
            name: required(req.name, "name")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StorePostDto {
    pub book_id: i64,
    pub user_id: i64,
    pub body: String,
    pub progress: i64,
}

impl StorePostDto {
    /// # Errors
    /// Returns a validation error if a required field is absent.
    pub fn from_request(req: StorePostRequest, user_id: i64) -> AppResult<Self> {
        Ok(Self {
            book_id: required(req.book_id, "book_id")?,
            user_id,
            body: required(req.body, "body")?,
            progress: required(req.progress, "progress")?,
        })
    }

    /// # Errors
    /// Returns a validation error if a required field is absent.
    pub fn for_book(req: BookPostRequest, book_id: i64, user_id: i64) -> AppResult<Self> {
        Ok(Self {
            book_id,
            user_id,
            body: required(req.body, "body")?,
            progress: required(req.progress, "progress")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoreReviewDto {
    pub book_id: i64,
    pub user_id: i64,
    pub rating: i64,
    pub comment: String,
}

impl StoreReviewDto {
    /// # Errors
    /// Returns a validation error if a required field is absent.
    pub fn from_request(req: StoreReviewRequest, user_id: i64) -> AppResult<Self> {
        Ok(Self {
            book_id: required(req.book_id, "book_id")?,
            user_id,
            rating: required(req.rating, "rating")?,
            comment: required(req.comment, "comment")?,
        })
    }

    /// # Errors
    /// Returns a validation error if a required field is absent.
    pub fn for_book(req: BookReviewRequest, book_id: i64, user_id: i64) -> AppResult<Self> {
        Ok(Self {
            book_id,
            user_id,
            rating: required(req.rating, "rating")?,
            comment: required(req.comment, "comment")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoreCommentDto {
    pub user_id: i64,
    pub body: String,
    pub commentable: Commentable,
}

impl StoreCommentDto {
    /// # Errors
    /// Returns a validation error if a required field is absent.
    pub fn from_request(req: StoreCommentRequest, user_id: i64) -> AppResult<Self> {
        let kind: CommentableType = required(req.commentable_type, "commentable_type")?;
        let id = required(req.commentable_id, "commentable_id")?;
        Ok(Self {
            user_id,
            body: required(req.body, "body")?,
            commentable: Commentable::new(kind, id),
        })
    }

    /// # Errors
    /// Returns a validation error if the body is absent.
    pub fn nested(
        req: NestedCommentRequest,
        commentable: Commentable,
        user_id: i64,
    ) -> AppResult<Self> {
        Ok(Self {
            user_id,
            body: required(req.body, "body")?,
            commentable,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoreUserDto {
    pub name: String,
    pub email: String,
    pub password: String,
    pub birth_date: Option<NaiveDate>,
    pub biography: Option<String>,
    pub image_url: Option<String>,
    pub roles: Vec<Role>,
}

impl StoreUserDto {
    /// Users created without explicit roles get the `user` role.
    ///
    /// # Errors
    /// Returns a validation error if a required field is absent.
    pub fn from_request(req: StoreUserRequest) -> AppResult<Self> {
        let roles = req
            .roles
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| vec![Role::User]);
        Ok(Self {
            name: required(req.name, "name")?,
            email: required(req.email, "email")?,
            password: required(req.password, "password")?,
            birth_date: req.birth_date,
            biography: req.biography,
            image_url: req.image_url,
            roles,
        })
    }
}

impl From<RegisterDto> for StoreUserDto {
    fn from(dto: RegisterDto) -> Self {
        Self {
            name: dto.name,
            email: dto.email,
            password: dto.password,
            birth_date: None,
            biography: None,
            image_url: None,
            roles: vec![Role::User],
        }
    }
}

// Update DTOs. Rules mirror the store rule sets; every field is optional, and an
// explicit null is rejected for columns that cannot hold one.

fn violation(errors: &mut ValidationErrors, field: &'static str, code: &'static str, msg: String) {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::from(msg));
    errors.add(field, error);
}

fn not_null<T>(errors: &mut ValidationErrors, field: &'static str, patch: &Patch<T>) {
    if patch.is_null() {
        let label = field.replace('_', " ");
        violation(errors, field, "required", format!("The {label} field cannot be null."));
    }
}

fn length(
    errors: &mut ValidationErrors,
    field: &'static str,
    patch: &Patch<String>,
    min: usize,
    max: usize,
) {
    if let Some(value) = patch.value() {
        let len = value.chars().count();
        if len < min || len > max {
            let label = field.replace('_', " ");
            violation(
                errors,
                field,
                "length",
                format!("The {label} field must be between {min} and {max} characters."),
            );
        }
    }
}

fn range(errors: &mut ValidationErrors, field: &'static str, patch: &Patch<i64>, min: i64, max: i64) {
    if let Some(value) = patch.value() {
        if *value < min || *value > max {
            let label = field.replace('_', " ");
            violation(
                errors,
                field,
                "range",
                format!("The {label} field must be between {min} and {max}."),
            );
        }
    }
}

fn url(errors: &mut ValidationErrors, field: &'static str, patch: &Patch<String>) {
    if let Some(value) = patch.value() {
        if !value.as_str().validate_url() {
            let label = field.replace('_', " ");
            violation(errors, field, "url", format!("The {label} field must be a valid URL."));
        }
    }
}

fn email(errors: &mut ValidationErrors, field: &'static str, patch: &Patch<String>) {
    if let Some(value) = patch.value() {
        if !value.as_str().validate_email() {
            violation(
                errors,
                field,
                "email",
                "The email field must be a valid email address.".to_string(),
            );
        }
    }
}

fn finish(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

const LONG_TEXT: usize = 5000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateAuthorDto {
    pub first_name: Patch<String>,
    pub last_name: Patch<String>,
    pub nationality: Patch<String>,
    pub biography: Patch<String>,
    pub image_url: Patch<String>,
    pub user_id: Patch<i64>,
}

impl Validate for UpdateAuthorDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        not_null(&mut errors, "first_name", &self.first_name);
        not_null(&mut errors, "last_name", &self.last_name);
        not_null(&mut errors, "nationality", &self.nationality);
        length(&mut errors, "first_name", &self.first_name, 1, 255);
        length(&mut errors, "last_name", &self.last_name, 1, 255);
        length(&mut errors, "nationality", &self.nationality, 1, 100);
        length(&mut errors, "biography", &self.biography, 0, LONG_TEXT);
        url(&mut errors, "image_url", &self.image_url);
        finish(errors)
    }
}

impl UpdateAuthorDto {
    #[must_use]
    pub fn to_map(&self, include_nulls: bool) -> Map<String, Value> {
        PatchMap::new(include_nulls)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("nationality", &self.nationality)
            .field("biography", &self.biography)
            .field("image_url", &self.image_url)
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateBookDto {
    pub title: Patch<String>,
    pub synopsis: Patch<String>,
    pub isbn: Patch<String>,
    pub pages_amount: Patch<i64>,
    pub chapters_amount: Patch<i64>,
    pub published_at: Patch<NaiveDate>,
    pub image_url: Patch<String>,
    pub author_ids: Patch<Vec<i64>>,
    pub genre_ids: Patch<Vec<i64>>,
    pub tag_ids: Patch<Vec<i64>>,
}

impl Validate for UpdateBookDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        not_null(&mut errors, "title", &self.title);
        not_null(&mut errors, "synopsis", &self.synopsis);
        not_null(&mut errors, "isbn", &self.isbn);
        not_null(&mut errors, "pages_amount", &self.pages_amount);
        not_null(&mut errors, "chapters_amount", &self.chapters_amount);
        not_null(&mut errors, "published_at", &self.published_at);
        length(&mut errors, "title", &self.title, 1, 255);
        length(&mut errors, "synopsis", &self.synopsis, 1, usize::MAX);
        length(&mut errors, "isbn", &self.isbn, 10, 17);
        range(&mut errors, "pages_amount", &self.pages_amount, 1, i64::MAX);
        range(&mut errors, "chapters_amount", &self.chapters_amount, 1, i64::MAX);
        url(&mut errors, "image_url", &self.image_url);
        if self.author_ids.value().is_some_and(Vec::is_empty) {
            violation(
                &mut errors,
                "author_ids",
                "length",
                "A book needs at least one author.".to_string(),
            );
        }
        finish(errors)
    }
}

impl UpdateBookDto {
    #[must_use]
    pub fn to_map(&self, include_nulls: bool) -> Map<String, Value> {
        PatchMap::new(include_nulls)
            .field("title", &self.title)
            .field("synopsis", &self.synopsis)
            .field("isbn", &self.isbn)
            .field("pages_amount", &self.pages_amount)
            .field("chapters_amount", &self.chapters_amount)
            .field("published_at", &self.published_at)
            .field("image_url", &self.image_url)
            .field("author_ids", &self.author_ids)
            .field("genre_ids", &self.genre_ids)
            .field("tag_ids", &self.tag_ids)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateGenreDto {
    pub name: Patch<String>,
}

impl Validate for UpdateGenreDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        not_null(&mut errors, "name", &self.name);
        length(&mut errors, "name", &self.name, 1, 100);
        finish(errors)
    }
}

impl UpdateGenreDto {
    #[must_use]
    pub fn to_map(&self, include_nulls: bool) -> Map<String, Value> {
        PatchMap::new(include_nulls)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateTagDto {
    pub name: Patch<String>,
}

impl Validate for UpdateTagDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        not_null(&mut errors, "name", &self.name);
        length(&mut errors, "name", &self.name, 1, 100);
        finish(errors)
    }
}

impl UpdateTagDto {
    #[must_use]
    pub fn to_map(&self, include_nulls: bool) -> Map<String, Value> {
        PatchMap::new(include_nulls)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePostDto {
    pub body: Patch<String>,
    pub progress: Patch<i64>,
}

impl Validate for UpdatePostDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        not_null(&mut errors, "body", &self.body);
        not_null(&mut errors, "progress", &self.progress);
        length(&mut errors, "body", &self.body, 1, usize::MAX);
        range(&mut errors, "progress", &self.progress, 0, 100);
        finish(errors)
    }
}

impl UpdatePostDto {
    #[must_use]
    pub fn to_map(&self, include_nulls: bool) -> Map<String, Value> {
        PatchMap::new(include_nulls)
            .field("body", &self.body)
            .field("progress", &self.progress)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateReviewDto {
    pub rating: Patch<i64>,
    pub comment: Patch<String>,
}

impl Validate for UpdateReviewDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        not_null(&mut errors, "rating", &self.rating);
        not_null(&mut errors, "comment", &self.comment);
        range(&mut errors, "rating", &self.rating, 1, 5);
        length(&mut errors, "comment", &self.comment, 1, LONG_TEXT);
        finish(errors)
    }
}

impl UpdateReviewDto {
    #[must_use]
    pub fn to_map(&self, include_nulls: bool) -> Map<String, Value> {
        PatchMap::new(include_nulls)
            .field("rating", &self.rating)
            .field("comment", &self.comment)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateCommentDto {
    pub body: Patch<String>,
}

impl Validate for UpdateCommentDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        not_null(&mut errors, "body", &self.body);
        length(&mut errors, "body", &self.body, 1, 2000);
        finish(errors)
    }
}

impl UpdateCommentDto {
    #[must_use]
    pub fn to_map(&self, include_nulls: bool) -> Map<String, Value> {
        PatchMap::new(include_nulls)
            .field("body", &self.body)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserDto {
    pub name: Patch<String>,
    pub email: Patch<String>,
    pub password: Patch<String>,
    pub birth_date: Patch<NaiveDate>,
    pub biography: Patch<String>,
    pub image_url: Patch<String>,
    pub roles: Patch<Vec<Role>>,
}

impl Validate for UpdateUserDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        not_null(&mut errors, "name", &self.name);
        not_null(&mut errors, "email", &self.email);
        not_null(&mut errors, "password", &self.password);
        length(&mut errors, "name", &self.name, 1, 255);
        email(&mut errors, "email", &self.email);
        length(&mut errors, "password", &self.password, 8, usize::MAX);
        length(&mut errors, "biography", &self.biography, 0, LONG_TEXT);
        url(&mut errors, "image_url", &self.image_url);
        finish(errors)
    }
}

impl UpdateUserDto {
    #[must_use]
    pub fn to_map(&self, include_nulls: bool) -> Map<String, Value> {
        PatchMap::new(include_nulls)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &self.password)
            .field("birth_date", &self.birth_date)
            .field("biography", &self.biography)
            .field("image_url", &self.image_url)
            .field("roles", &self.roles)
            .finish()
    }
}
