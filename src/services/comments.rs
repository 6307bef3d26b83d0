use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::instrument;

use crate::dto::{PageParams, StoreCommentDto, UpdateCommentDto};
use crate::errors::{AppError, AppResult};
use crate::models::{Comment, Commentable, Post, Review, User};
use crate::permissions::Resource;
use crate::services::{
    Page, UserService, apply_update, fetch_by_ids, find_by_key, paginate, soft_delete,
    unique_slug,
};
use crate::utils::excerpt;

pub struct CommentService<'a> {
    db: &'a SqlitePool,
}

impl<'a> CommentService<'a> {
    #[must_use]
    pub fn new(db: &'a SqlitePool) -> Self {
        Self { db }
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn index(&self, params: PageParams) -> AppResult<Page<Comment>> {
        let mut page = paginate(self.db, "comments", None, params).await?;
        self.load_users(&mut page.items).await?;
        Ok(page)
    }

    /// Comments attached to one book, post or review.
    ///
    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn by_commentable(
        &self,
        commentable: Commentable,
        params: PageParams,
    ) -> AppResult<Page<Comment>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments \
             WHERE commentable_type = ? AND commentable_id = ? AND deleted_at IS NULL",
        )
        .bind(commentable.kind())
        .bind(commentable.id())
        .fetch_one(self.db)
        .await?;

        let mut items = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments \
             WHERE commentable_type = ? AND commentable_id = ? AND deleted_at IS NULL \
             ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(commentable.kind())
        .bind(commentable.id())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.db)
        .await?;

        self.load_users(&mut items).await?;
        Ok(Page::new(items, total, params))
    }

    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn find(&self, slug: &str) -> AppResult<Comment> {
        find_by_key(self.db, Resource::Comment, slug).await
    }

    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn show(&self, slug: &str) -> AppResult<Comment> {
        let mut comments = vec![self.find(slug).await?];
        self.load_users(&mut comments).await?;
        Ok(comments.remove(0))
    }

    /// Comment on a book. Books are open to every reader.
    ///
    /// # Errors
    /// Returns database errors.
    pub async fn store_by_book(&self, book_id: i64, user_id: i64, body: String) -> AppResult<Comment> {
        self.insert(StoreCommentDto {
            user_id,
            body,
            commentable: Commentable::Book(book_id),
        })
        .await
    }

    /// Comment on a post. The commenter must follow the post's author.
    ///
    /// # Errors
    /// Returns a conflict when the commenter does not follow the post's author.
    pub async fn store_by_post(&self, post: &Post, user_id: i64, body: String) -> AppResult<Comment> {
        self.ensure_follows(user_id, post.user_id).await?;
        self.insert(StoreCommentDto {
            user_id,
            body,
            commentable: Commentable::Post(post.id),
        })
        .await
    }

    /// Comment on a review. The commenter must follow the reviewer.
    ///
    /// # Errors
    /// Returns a conflict when the commenter does not follow the reviewer.
    pub async fn store_by_review(
        &self,
        review: &Review,
        user_id: i64,
        body: String,
    ) -> AppResult<Comment> {
        self.ensure_follows(user_id, review.user_id).await?;
        self.insert(StoreCommentDto {
            user_id,
            body,
            commentable: Commentable::Review(review.id),
        })
        .await
    }

    /// Store a comment on whichever target the DTO names, applying that target's rules.
    ///
    /// # Errors
    /// Returns `NotFound` when the target is gone, or a conflict when the follow rule fails.
    #[instrument(skip(self, dto), fields(user_id = dto.user_id, commentable = ?dto.commentable))]
    pub async fn store(&self, dto: StoreCommentDto) -> AppResult<Comment> {
        match dto.commentable {
            Commentable::Book(id) => {
                let live: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM books WHERE id = ? AND deleted_at IS NULL",
                )
                .bind(id)
                .fetch_one(self.db)
                .await?;
                if live == 0 {
                    return Err(AppError::NotFound);
                }
                self.store_by_book(id, dto.user_id, dto.body).await
            }
            Commentable::Post(id) => {
                let post = sqlx::query_as::<_, Post>(
                    "SELECT * FROM posts WHERE id = ? AND deleted_at IS NULL",
                )
                .bind(id)
                .fetch_optional(self.db)
                .await?
                .ok_or(AppError::NotFound)?;
                self.store_by_post(&post, dto.user_id, dto.body).await
            }
            Commentable::Review(id) => {
                let review = sqlx::query_as::<_, Review>(
                    "SELECT * FROM reviews WHERE id = ? AND deleted_at IS NULL",
                )
                .bind(id)
                .fetch_optional(self.db)
                .await?
                .ok_or(AppError::NotFound)?;
                self.store_by_review(&review, dto.user_id, dto.body).await
            }
        }
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto, comment), fields(comment_id = comment.id))]
    pub async fn update(&self, dto: UpdateCommentDto, comment: &Comment) -> AppResult<Comment> {
        apply_update(self.db, "comments", comment.id, &dto.to_map(false)).await?;
        self.show(&comment.slug).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, comment), fields(comment_id = comment.id))]
    pub async fn destroy(&self, comment: &Comment) -> AppResult<()> {
        soft_delete(self.db, Resource::Comment, comment.id).await
    }

    async fn ensure_follows(&self, commenter_id: i64, owner_id: i64) -> AppResult<()> {
        if commenter_id == owner_id {
            return Ok(());
        }
        if UserService::new(self.db)
            .is_following(commenter_id, owner_id)
            .await?
        {
            Ok(())
        } else {
            tracing::debug!(commenter_id, owner_id, "comment rejected, not following");
            Err(AppError::conflict("Not following"))
        }
    }

    async fn insert(&self, dto: StoreCommentDto) -> AppResult<Comment> {
        let slug = unique_slug(self.db, "comments", &excerpt(&dto.body, 8)).await?;
        sqlx::query(
            "INSERT INTO comments (user_id, body, slug, commentable_type, commentable_id) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(dto.user_id)
        .bind(&dto.body)
        .bind(&slug)
        .bind(dto.commentable.kind())
        .bind(dto.commentable.id())
        .execute(self.db)
        .await?;

        tracing::info!(%slug, "comment created");
        self.show(&slug).await
    }

    async fn load_users(&self, comments: &mut [Comment]) -> AppResult<()> {
        let ids: Vec<i64> = comments.iter().map(|c| c.user_id).collect();
        let users: HashMap<i64, User> = fetch_by_ids::<User>(self.db, "users", &ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        for comment in comments {
            comment.user = users.get(&comment.user_id).cloned();
        }
        Ok(())
    }
}
