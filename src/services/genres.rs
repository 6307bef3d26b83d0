use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::instrument;

use crate::dto::{PageParams, StoreGenreDto, UpdateGenreDto};
use crate::errors::AppResult;
use crate::models::{Book, Genre};
use crate::permissions::Resource;
use crate::services::{Page, apply_update, find_by_key, paginate, soft_delete, unique_slug};

#[derive(sqlx::FromRow)]
struct GenreBookRow {
    pivot_genre_id: i64,
    #[sqlx(flatten)]
    book: Book,
}

pub struct GenreService<'a> {
    db: &'a SqlitePool,
}

impl<'a> GenreService<'a> {
    #[must_use]
    pub fn new(db: &'a SqlitePool) -> Self {
        Self { db }
    }

    /// Genres with their books.
    ///
    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn index(&self, params: PageParams) -> AppResult<Page<Genre>> {
        let mut page: Page<Genre> = paginate(self.db, "genres", None, params).await?;
        self.load_books(&mut page.items).await?;
        Ok(page)
    }

    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn find(&self, slug: &str) -> AppResult<Genre> {
        find_by_key(self.db, Resource::Genre, slug).await
    }

    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn show(&self, slug: &str) -> AppResult<Genre> {
        let mut genres = vec![self.find(slug).await?];
        self.load_books(&mut genres).await?;
        Ok(genres.remove(0))
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto))]
    pub async fn store(&self, dto: StoreGenreDto) -> AppResult<Genre> {
        let slug = unique_slug(self.db, "genres", &dto.name).await?;
        sqlx::query("INSERT INTO genres (name, slug) VALUES (?, ?)")
            .bind(&dto.name)
            .bind(&slug)
            .execute(self.db)
            .await?;
        tracing::info!(%slug, "genre created");
        self.find(&slug).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto, genre), fields(genre_id = genre.id))]
    pub async fn update(&self, dto: UpdateGenreDto, genre: &Genre) -> AppResult<Genre> {
        apply_update(self.db, "genres", genre.id, &dto.to_map(false)).await?;
        self.find(&genre.slug).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, genre), fields(genre_id = genre.id))]
    pub async fn destroy(&self, genre: &Genre) -> AppResult<()> {
        soft_delete(self.db, Resource::Genre, genre.id).await
    }

    async fn load_books(&self, genres: &mut [Genre]) -> AppResult<()> {
        if genres.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT bg.genre_id AS pivot_genre_id, b.* FROM books b \
             JOIN book_genre bg ON bg.book_id = b.id \
             WHERE b.deleted_at IS NULL AND bg.genre_id IN (",
        );
        let mut list = qb.separated(", ");
        for genre in genres.iter() {
            list.push_bind(genre.id);
        }
        list.push_unseparated(") ORDER BY b.id");
        let rows = qb.build_query_as::<GenreBookRow>().fetch_all(self.db).await?;

        let mut by_genre: HashMap<i64, Vec<Book>> = HashMap::new();
        for row in rows {
            by_genre.entry(row.pivot_genre_id).or_default().push(row.book);
        }
        for genre in genres {
            genre.books = Some(by_genre.remove(&genre.id).unwrap_or_default());
        }
        Ok(())
    }
}
