use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::instrument;

use crate::dto::{PageParams, StoreReviewDto, UpdateReviewDto};
use crate::errors::{AppError, AppResult};
use crate::models::{Book, Likeable, Review, User};
use crate::permissions::Resource;
use crate::services::{BookService, Page, apply_update, fetch_by_ids, paginate, soft_delete};

/// A reader's reaction to a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    fn is_dislike(self) -> bool {
        matches!(self, Reaction::Dislike)
    }

    fn counter(self) -> &'static str {
        match self {
            Reaction::Like => "like_count",
            Reaction::Dislike => "dislike_count",
        }
    }

    fn from_dislike(is_dislike: bool) -> Self {
        if is_dislike {
            Reaction::Dislike
        } else {
            Reaction::Like
        }
    }

    #[must_use]
    pub fn done_message(self) -> &'static str {
        match self {
            Reaction::Like => "Review liked",
            Reaction::Dislike => "Review disliked",
        }
    }

    #[must_use]
    pub fn repeated_message(self) -> &'static str {
        match self {
            Reaction::Like => "Review already liked",
            Reaction::Dislike => "Review already disliked",
        }
    }
}

pub struct ReviewService<'a> {
    db: &'a SqlitePool,
}

impl<'a> ReviewService<'a> {
    #[must_use]
    pub fn new(db: &'a SqlitePool) -> Self {
        Self { db }
    }

    /// Reviews with their book and author loaded.
    ///
    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn index(&self, params: PageParams) -> AppResult<Page<Review>> {
        let mut page = paginate(self.db, "reviews", None, params).await?;
        self.load_relations(&mut page.items).await?;
        Ok(page)
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn by_book(&self, book_id: i64, params: PageParams) -> AppResult<Page<Review>> {
        let mut page = paginate(self.db, "reviews", Some(("book_id = ", book_id)), params).await?;
        self.load_relations(&mut page.items).await?;
        Ok(page)
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn by_user(&self, user_id: i64, params: PageParams) -> AppResult<Page<Review>> {
        let mut page = paginate(self.db, "reviews", Some(("user_id = ", user_id)), params).await?;
        self.load_relations(&mut page.items).await?;
        Ok(page)
    }

    /// # Errors
    /// Returns `NotFound` for an unknown or trashed review.
    pub async fn find(&self, id: i64) -> AppResult<Review> {
        sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// # Errors
    /// Returns `NotFound` for an unknown or trashed review.
    pub async fn show(&self, id: i64) -> AppResult<Review> {
        let mut reviews = vec![self.find(id).await?];
        self.load_relations(&mut reviews).await?;
        Ok(reviews.remove(0))
    }

    /// Only readers who completed the book may review it.
    ///
    /// # Errors
    /// Returns a conflict when the author of the review has not completed the book.
    #[instrument(skip(self, dto, book), fields(book_id = book.id, user_id = dto.user_id))]
    pub async fn store(&self, dto: StoreReviewDto, book: &Book) -> AppResult<Review> {
        if !BookService::new(self.db)
            .is_completed(book, dto.user_id)
            .await?
        {
            return Err(AppError::conflict("Book not completed"));
        }

        let id = sqlx::query(
            "INSERT INTO reviews (book_id, user_id, rating, comment) VALUES (?, ?, ?, ?)",
        )
        .bind(book.id)
        .bind(dto.user_id)
        .bind(dto.rating)
        .bind(&dto.comment)
        .execute(self.db)
        .await?
        .last_insert_rowid();

        tracing::info!(review_id = id, "review created");
        self.show(id).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto, review), fields(review_id = review.id))]
    pub async fn update(&self, dto: UpdateReviewDto, review: &Review) -> AppResult<Review> {
        apply_update(self.db, "reviews", review.id, &dto.to_map(false)).await?;
        self.show(review.id).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, review), fields(review_id = review.id))]
    pub async fn destroy(&self, review: &Review) -> AppResult<()> {
        soft_delete(self.db, Resource::Review, review.id).await
    }

    /// Apply `reaction` from `user_id`. Switching from the opposite reaction retracts it
    /// and moves both counters within the same transaction.
    ///
    /// # Errors
    /// Returns a conflict when the user already holds this reaction.
    #[instrument(skip(self))]
    pub async fn react(&self, review_id: i64, user_id: i64, reaction: Reaction) -> AppResult<Review> {
        let target = Likeable::Review(review_id);
        let mut tx = self.db.begin().await?;

        let existing: Option<(i64, bool)> = sqlx::query_as(
            "SELECT id, is_dislike FROM likes \
             WHERE user_id = ? AND likeable_type = ? AND likeable_id = ?",
        )
        .bind(user_id)
        .bind(target.kind())
        .bind(target.id())
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            Some((_, is_dislike)) if Reaction::from_dislike(is_dislike) == reaction => {
                return Err(AppError::conflict(reaction.repeated_message()));
            }
            Some((like_id, is_dislike)) => {
                let previous = Reaction::from_dislike(is_dislike);
                sqlx::query("UPDATE likes SET is_dislike = ? WHERE id = ?")
                    .bind(reaction.is_dislike())
                    .bind(like_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(&format!(
                    "UPDATE reviews SET {up} = {up} + 1, {down} = MAX({down} - 1, 0) WHERE id = ?",
                    up = reaction.counter(),
                    down = previous.counter(),
                ))
                .bind(review_id)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO likes (user_id, is_dislike, likeable_type, likeable_id) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(user_id)
                .bind(reaction.is_dislike())
                .bind(target.kind())
                .bind(target.id())
                .execute(&mut *tx)
                .await?;
                sqlx::query(&format!(
                    "UPDATE reviews SET {c} = {c} + 1 WHERE id = ?",
                    c = reaction.counter(),
                ))
                .bind(review_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        tracing::info!(?reaction, "review reaction recorded");
        self.find(review_id).await
    }

    /// Remove whatever reaction `user_id` holds on the review. No-op without one.
    ///
    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn retract(&self, review_id: i64, user_id: i64) -> AppResult<Review> {
        let target = Likeable::Review(review_id);
        let mut tx = self.db.begin().await?;

        let existing: Option<(i64, bool)> = sqlx::query_as(
            "SELECT id, is_dislike FROM likes \
             WHERE user_id = ? AND likeable_type = ? AND likeable_id = ?",
        )
        .bind(user_id)
        .bind(target.kind())
        .bind(target.id())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((like_id, is_dislike)) = existing {
            sqlx::query("DELETE FROM likes WHERE id = ?")
                .bind(like_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(&format!(
                "UPDATE reviews SET {c} = MAX({c} - 1, 0) WHERE id = ?",
                c = Reaction::from_dislike(is_dislike).counter(),
            ))
            .bind(review_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.find(review_id).await
    }

    async fn load_relations(&self, reviews: &mut [Review]) -> AppResult<()> {
        let book_ids: Vec<i64> = reviews.iter().map(|r| r.book_id).collect();
        let user_ids: Vec<i64> = reviews.iter().map(|r| r.user_id).collect();

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

        for review in reviews {
            review.book = books.get(&review.book_id).cloned();
            review.user = users.get(&review.user_id).cloned();
        }
        Ok(())
    }
}
