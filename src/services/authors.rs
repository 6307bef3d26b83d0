use sqlx::SqlitePool;
use tracing::instrument;

use crate::dto::{PageParams, StoreAuthorDto, UpdateAuthorDto};
use crate::errors::AppResult;
use crate::models::{Author, Book};
use crate::permissions::Resource;
use crate::services::{Page, apply_update, find_by_key, paginate, soft_delete, unique_slug};

pub struct AuthorService<'a> {
    db: &'a SqlitePool,
}

impl<'a> AuthorService<'a> {
    #[must_use]
    pub fn new(db: &'a SqlitePool) -> Self {
        Self { db }
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn index(&self, params: PageParams) -> AppResult<Page<Author>> {
        paginate(self.db, "authors", None, params).await
    }

    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn find(&self, slug: &str) -> AppResult<Author> {
        find_by_key(self.db, Resource::Author, slug).await
    }

    /// Author with their books.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn show(&self, slug: &str) -> AppResult<Author> {
        let mut author = self.find(slug).await?;
        author.books = Some(self.books_of(author.id).await?);
        Ok(author)
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto))]
    pub async fn store(&self, dto: StoreAuthorDto) -> AppResult<Author> {
        let slug = unique_slug(
            self.db,
            "authors",
            &format!("{} {}", dto.first_name, dto.last_name),
        )
        .await?;

        let id = sqlx::query(
            "INSERT INTO authors (user_id, first_name, last_name, nationality, biography, image_url, slug) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(dto.user_id)
        .bind(&dto.first_name)
        .bind(&dto.last_name)
        .bind(&dto.nationality)
        .bind(&dto.biography)
        .bind(&dto.image_url)
        .bind(&slug)
        .execute(self.db)
        .await?
        .last_insert_rowid();

        tracing::info!(author_id = id, %slug, "author created");
        self.find(&slug).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto, author), fields(author_id = author.id))]
    pub async fn update(&self, dto: UpdateAuthorDto, author: &Author) -> AppResult<Author> {
        apply_update(self.db, "authors", author.id, &dto.to_map(false)).await?;
        self.find(&author.slug).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, author), fields(author_id = author.id))]
    pub async fn destroy(&self, author: &Author) -> AppResult<()> {
        soft_delete(self.db, Resource::Author, author.id).await?;
        tracing::info!("author deleted");
        Ok(())
    }

    async fn books_of(&self, author_id: i64) -> AppResult<Vec<Book>> {
        Ok(sqlx::query_as::<_, Book>(
            "SELECT b.* FROM books b JOIN author_book ab ON ab.book_id = b.id \
             WHERE ab.author_id = ? AND b.deleted_at IS NULL ORDER BY b.id",
        )
        .bind(author_id)
        .fetch_all(self.db)
        .await?)
    }
}
