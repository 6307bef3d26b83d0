use sqlx::SqlitePool;
use tracing::instrument;

use crate::dto::{PageParams, StoreTagDto, UpdateTagDto};
use crate::errors::{AppError, AppResult};
use crate::models::{Book, Tag};
use crate::permissions::Resource;
use crate::services::{Page, apply_update, find_by_key, paginate, soft_delete, unique_slug};

pub struct TagService<'a> {
    db: &'a SqlitePool,
}

impl<'a> TagService<'a> {
    #[must_use]
    pub fn new(db: &'a SqlitePool) -> Self {
        Self { db }
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn index(&self, params: PageParams) -> AppResult<Page<Tag>> {
        paginate(self.db, "tags", None, params).await
    }

    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn find(&self, slug: &str) -> AppResult<Tag> {
        find_by_key(self.db, Resource::Tag, slug).await
    }

    /// # Errors
    /// Returns `NotFound` when no live tag has this id.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Tag> {
        sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Tag with the books it is directly attached to.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn show(&self, slug: &str) -> AppResult<Tag> {
        let mut tag = self.find(slug).await?;
        tag.books = Some(
            sqlx::query_as::<_, Book>(
                "SELECT b.* FROM books b JOIN book_tag bt ON bt.book_id = b.id \
                 WHERE bt.tag_id = ? AND b.deleted_at IS NULL ORDER BY b.id",
            )
            .bind(tag.id)
            .fetch_all(self.db)
            .await?,
        );
        Ok(tag)
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto))]
    pub async fn store(&self, dto: StoreTagDto) -> AppResult<Tag> {
        let slug = unique_slug(self.db, "tags", &dto.name).await?;
        sqlx::query("INSERT INTO tags (name, slug) VALUES (?, ?)")
            .bind(&dto.name)
            .bind(&slug)
            .execute(self.db)
            .await?;
        tracing::info!(%slug, "tag created");
        self.find(&slug).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto, tag), fields(tag_id = tag.id))]
    pub async fn update(&self, dto: UpdateTagDto, tag: &Tag) -> AppResult<Tag> {
        apply_update(self.db, "tags", tag.id, &dto.to_map(false)).await?;
        self.find(&tag.slug).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, tag), fields(tag_id = tag.id))]
    pub async fn destroy(&self, tag: &Tag) -> AppResult<()> {
        soft_delete(self.db, Resource::Tag, tag.id).await
    }
}
