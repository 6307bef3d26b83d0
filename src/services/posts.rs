use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::instrument;

use crate::dto::{PageParams, StorePostDto, UpdatePostDto};
use crate::errors::AppResult;
use crate::models::{Book, Post, User};
use crate::permissions::Resource;
use crate::services::{
    Page, apply_update, fetch_by_ids, find_by_key, paginate, soft_delete, unique_slug,
};
use crate::utils::excerpt;

pub struct PostService<'a> {
    db: &'a SqlitePool,
}

impl<'a> PostService<'a> {
    #[must_use]
    pub fn new(db: &'a SqlitePool) -> Self {
        Self { db }
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn index(&self, params: PageParams) -> AppResult<Page<Post>> {
        let mut page = paginate(self.db, "posts", None, params).await?;
        self.load_relations(&mut page.items).await?;
        Ok(page)
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn by_book(&self, book_id: i64, params: PageParams) -> AppResult<Page<Post>> {
        let mut page = paginate(self.db, "posts", Some(("book_id = ", book_id)), params).await?;
        self.load_relations(&mut page.items).await?;
        Ok(page)
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn by_user(&self, user_id: i64, params: PageParams) -> AppResult<Page<Post>> {
        let mut page = paginate(self.db, "posts", Some(("user_id = ", user_id)), params).await?;
        self.load_relations(&mut page.items).await?;
        Ok(page)
    }

    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn find(&self, slug: &str) -> AppResult<Post> {
        find_by_key(self.db, Resource::Post, slug).await
    }

    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn show(&self, slug: &str) -> AppResult<Post> {
        let mut posts = vec![self.find(slug).await?];
        self.load_relations(&mut posts).await?;
        Ok(posts.remove(0))
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto), fields(book_id = dto.book_id, user_id = dto.user_id))]
    pub async fn store(&self, dto: StorePostDto) -> AppResult<Post> {
        let slug = unique_slug(self.db, "posts", &excerpt(&dto.body, 8)).await?;
        sqlx::query(
            "INSERT INTO posts (book_id, user_id, body, progress, slug) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(dto.book_id)
        .bind(dto.user_id)
        .bind(&dto.body)
        .bind(dto.progress)
        .bind(&slug)
        .execute(self.db)
        .await?;

        tracing::info!(%slug, "post created");
        self.show(&slug).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto, post), fields(post_id = post.id))]
    pub async fn update(&self, dto: UpdatePostDto, post: &Post) -> AppResult<Post> {
        apply_update(self.db, "posts", post.id, &dto.to_map(false)).await?;
        self.show(&post.slug).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, post), fields(post_id = post.id))]
    pub async fn destroy(&self, post: &Post) -> AppResult<()> {
        soft_delete(self.db, Resource::Post, post.id).await
    }

    async fn load_relations(&self, posts: &mut [Post]) -> AppResult<()> {
        let book_ids: Vec<i64> = posts.iter().map(|p| p.book_id).collect();
        let user_ids: Vec<i64> = posts.iter().map(|p| p.user_id).collect();

        let books: HashMap<i64, Book> = fetch_by_ids::<Book>(self.db, "books", &book_ids)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();
        let users: HashMap<i64, User> = fetch_by_ids::<User>(self.db, "users", &user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        for post in posts {
            post.book = books.get(&post.book_id).cloned();
            post.user = users.get(&post.user_id).cloned();
        }
        Ok(())
    }
}
