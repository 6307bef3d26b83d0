#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use bookshelf_api::{
    AppState, Config, build_rate_limiter, build_router, create_jwt_tokens, db,
    dto::{StoreAuthorDto, StoreBookDto, StoreTagDto, StoreUserDto},
    models::{Author, Book, Tag, User},
    permissions::Role,
    services::{AuthorService, BookService, TagService, UserService},
};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".into(),
        jwt_secret: "super_secret_test_key".into(),
        server_port: 0,
        db_max_connections: 1,
        rate_limit_per_minute: 1000,
        admin_email: None,
        admin_password: None,
    }
}

pub async fn test_db() -> SqlitePool {
    let pool = db::connect_in_memory().await.expect("in-memory sqlite");
    db::migrate(&pool).await.expect("migrations apply");
    pool
}

pub async fn test_state() -> Arc<AppState> {
    let config = test_config();
    Arc::new(AppState {
        db: test_db().await,
        rate_limiter: build_rate_limiter(config.rate_limit_per_minute),
        config,
    })
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let state = test_state().await;
        let router = build_router(state.clone());
        Self { state, router }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.state.db
    }

    pub fn token_for(&self, user: &User) -> String {
        create_jwt_tokens(user.id, &self.state.config)
            .expect("token issued")
            .access
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body collects")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }
}

pub async fn create_user(db: &SqlitePool, name: &str, roles: &[Role]) -> User {
    UserService::new(db)
        .store(StoreUserDto {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            password: "password123".into(),
            birth_date: None,
            biography: None,
            image_url: None,
            roles: roles.to_vec(),
        })
        .await
        .expect("user stored")
}

pub async fn create_author(db: &SqlitePool, first: &str, last: &str) -> Author {
    AuthorService::new(db)
        .store(StoreAuthorDto {
            first_name: first.into(),
            last_name: last.into(),
            nationality: "British".into(),
            biography: None,
            image_url: None,
            user_id: None,
        })
        .await
        .expect("author stored")
}

pub async fn create_book(db: &SqlitePool, owner: &User, title: &str, pages: i64) -> Book {
    let author = create_author(db, "Jane", title).await;
    BookService::new(db)
        .store(StoreBookDto {
            user_id: owner.id,
            title: title.into(),
            synopsis: "A story.".into(),
            isbn: "978-0141439518".into(),
            pages_amount: pages,
            chapters_amount: 10,
            published_at: NaiveDate::from_ymd_opt(1813, 1, 28).expect("valid date"),
            image_url: None,
            author_ids: vec![author.id],
            genre_ids: Vec::new(),
            tag_ids: Vec::new(),
        })
        .await
        .expect("book stored")
}

pub async fn create_tag(db: &SqlitePool, name: &str) -> Tag {
    TagService::new(db)
        .store(StoreTagDto { name: name.into() })
        .await
        .expect("tag stored")
}
