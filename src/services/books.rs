use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::instrument;

use crate::dto::{BookFilterDto, PageParams, StoreBookDto, UpdateBookDto};
use crate::errors::{AppError, AppResult};
use crate::models::{Author, Book, Genre, Reading, Tag};
use crate::permissions::Resource;
use crate::services::{Page, apply_update, find_by_key, soft_delete, sync_pivot, unique_slug};

/// Name of the tag marking a book as finished by a reader, compared case-insensitively.
pub const COMPLETED_TAG: &str = "completed";

#[derive(sqlx::FromRow)]
struct BookAuthorRow {
    pivot_book_id: i64,
    #[sqlx(flatten)]
    author: Author,
}

#[derive(sqlx::FromRow)]
struct BookGenreRow {
    pivot_book_id: i64,
    #[sqlx(flatten)]
    genre: Genre,
}

#[derive(sqlx::FromRow)]
struct BookTagRow {
    pivot_book_id: i64,
    #[sqlx(flatten)]
    tag: Tag,
}

pub struct BookService<'a> {
    db: &'a SqlitePool,
}

impl<'a> BookService<'a> {
    #[must_use]
    pub fn new(db: &'a SqlitePool) -> Self {
        Self { db }
    }

    /// Filtered listing with authors and genres loaded. The tag filter applies to the
    /// tags `user_id` assigned on their own shelf.
    ///
    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, filter))]
    pub async fn index(&self, filter: &BookFilterDto, user_id: i64) -> AppResult<Page<Book>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM books b");
        push_filter(&mut count, filter, user_id);
        let total: i64 = count.build_query_scalar().fetch_one(self.db).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT b.* FROM books b");
        push_filter(&mut select, filter, user_id);
        select
            .push(" ORDER BY b.id LIMIT ")
            .push_bind(filter.page.limit())
            .push(" OFFSET ")
            .push_bind(filter.page.offset());
        let mut books = select.build_query_as::<Book>().fetch_all(self.db).await?;

        self.load_authors(&mut books).await?;
        self.load_genres(&mut books).await?;
        Ok(Page::new(books, total, filter.page))
    }

    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn find(&self, slug: &str) -> AppResult<Book> {
        find_by_key(self.db, Resource::Book, slug).await
    }

    /// # Errors
    /// Returns `NotFound` when no live book has this id.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Book with all relations and the reading state of `user_id`.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown or trashed slug.
    pub async fn show(&self, slug: &str, user_id: i64) -> AppResult<Book> {
        let book = self.find(slug).await?;
        self.with_relations(book, user_id).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto), fields(user_id = dto.user_id))]
    pub async fn store(&self, dto: StoreBookDto) -> AppResult<Book> {
        let slug = unique_slug(self.db, "books", &dto.title).await?;

        let mut tx = self.db.begin().await?;
        let id = sqlx::query(
            "INSERT INTO books (user_id, title, synopsis, isbn, pages_amount, chapters_amount, \
             published_at, image_url, slug) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(dto.user_id)
        .bind(&dto.title)
        .bind(&dto.synopsis)
        .bind(&dto.isbn)
        .bind(dto.pages_amount)
        .bind(dto.chapters_amount)
        .bind(dto.published_at)
        .bind(&dto.image_url)
        .bind(&slug)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sync_pivot(&mut tx, "author_book", "book_id", id, "author_id", &dto.author_ids).await?;
        sync_pivot(&mut tx, "book_genre", "book_id", id, "genre_id", &dto.genre_ids).await?;
        sync_pivot(&mut tx, "book_tag", "book_id", id, "tag_id", &dto.tag_ids).await?;
        tx.commit().await?;

        tracing::info!(book_id = id, %slug, "book created");
        let book = self.find(&slug).await?;
        self.with_relations(book, dto.user_id).await
    }

    /// Partial update; relation id lists, when supplied, replace the current set.
    ///
    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, dto, book), fields(book_id = book.id))]
    pub async fn update(&self, dto: UpdateBookDto, book: &Book, user_id: i64) -> AppResult<Book> {
        let mut fields = dto.to_map(false);
        fields.remove("author_ids");
        fields.remove("genre_ids");
        fields.remove("tag_ids");

        let mut tx = self.db.begin().await?;
        apply_update(&mut *tx, "books", book.id, &fields).await?;
        if let Some(ids) = dto.author_ids.value() {
            sync_pivot(&mut tx, "author_book", "book_id", book.id, "author_id", ids).await?;
        }
        if let Some(ids) = dto.genre_ids.value() {
            sync_pivot(&mut tx, "book_genre", "book_id", book.id, "genre_id", ids).await?;
        }
        if let Some(ids) = dto.tag_ids.value() {
            sync_pivot(&mut tx, "book_tag", "book_id", book.id, "tag_id", ids).await?;
        }
        tx.commit().await?;

        let book = self.find(&book.slug).await?;
        self.with_relations(book, user_id).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, book), fields(book_id = book.id))]
    pub async fn destroy(&self, book: &Book) -> AppResult<()> {
        soft_delete(self.db, Resource::Book, book.id).await?;
        tracing::info!("book deleted");
        Ok(())
    }

    /// Put `book` on the shelf of `user_id` under `tag`. The completed tag also marks
    /// every page as read.
    ///
    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, book, tag), fields(book_id = book.id, tag = %tag.slug))]
    pub async fn assign_tag(&self, book: &Book, user_id: i64, tag: &Tag) -> AppResult<Book> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO book_user (book_id, user_id, tag_id) VALUES (?, ?, ?) \
             ON CONFLICT (book_id, user_id) DO UPDATE SET tag_id = excluded.tag_id, \
             updated_at = CURRENT_TIMESTAMP",
        )
        .bind(book.id)
        .bind(user_id)
        .bind(tag.id)
        .execute(&mut *tx)
        .await?;

        if tag.name.eq_ignore_ascii_case(COMPLETED_TAG) {
            sqlx::query("UPDATE book_user SET pages_read = ? WHERE book_id = ? AND user_id = ?")
                .bind(book.pages_amount)
                .bind(book.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.with_relations(book.clone(), user_id).await
    }

    /// Record how far `user_id` got. Reaching the last page assigns the completed tag.
    ///
    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, book), fields(book_id = book.id))]
    pub async fn update_progress(&self, book: &Book, user_id: i64, pages_read: i64) -> AppResult<Book> {
        let pages_read = pages_read.clamp(0, book.pages_amount);
        let completed_tag = if pages_read >= book.pages_amount {
            self.completed_tag_id().await?
        } else {
            None
        };

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO book_user (book_id, user_id, pages_read) VALUES (?, ?, ?) \
             ON CONFLICT (book_id, user_id) DO UPDATE SET pages_read = excluded.pages_read, \
             updated_at = CURRENT_TIMESTAMP",
        )
        .bind(book.id)
        .bind(user_id)
        .bind(pages_read)
        .execute(&mut *tx)
        .await?;

        if let Some(tag_id) = completed_tag {
            sqlx::query("UPDATE book_user SET tag_id = ? WHERE book_id = ? AND user_id = ?")
                .bind(tag_id)
                .bind(book.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.with_relations(book.clone(), user_id).await
    }

    /// Whether `user_id` finished `book`: the completed tag is assigned and every page
    /// has been read.
    ///
    /// # Errors
    /// Returns database errors.
    pub async fn is_completed(&self, book: &Book, user_id: i64) -> AppResult<bool> {
        let row: Option<(i64, Option<String>)> = sqlx::query_as(
            "SELECT bu.pages_read, t.name FROM book_user bu \
             LEFT JOIN tags t ON t.id = bu.tag_id AND t.deleted_at IS NULL \
             WHERE bu.book_id = ? AND bu.user_id = ?",
        )
        .bind(book.id)
        .bind(user_id)
        .fetch_optional(self.db)
        .await?;

        Ok(row.is_some_and(|(pages_read, name)| {
            name.is_some_and(|name| name.eq_ignore_ascii_case(COMPLETED_TAG))
                && pages_read >= book.pages_amount
        }))
    }

    async fn completed_tag_id(&self) -> AppResult<Option<i64>> {
        Ok(
            sqlx::query_scalar(
                "SELECT id FROM tags WHERE LOWER(name) = ? AND deleted_at IS NULL \
                 ORDER BY id DESC LIMIT 1",
            )
            .bind(COMPLETED_TAG)
            .fetch_optional(self.db)
            .await?,
        )
    }

    async fn with_relations(&self, book: Book, user_id: i64) -> AppResult<Book> {
        let mut books = vec![book];
        self.load_authors(&mut books).await?;
        self.load_genres(&mut books).await?;
        self.load_tags(&mut books).await?;
        let mut book = books.remove(0);
        book.reading = self.reading(&book, user_id).await?;
        Ok(book)
    }

    async fn reading(&self, book: &Book, user_id: i64) -> AppResult<Option<Reading>> {
        let reading = sqlx::query_as::<_, Reading>(
            "SELECT book_id, user_id, tag_id, pages_read FROM book_user \
             WHERE book_id = ? AND user_id = ?",
        )
        .bind(book.id)
        .bind(user_id)
        .fetch_optional(self.db)
        .await?;

        let Some(mut reading) = reading else {
            return Ok(None);
        };
        if let Some(tag_id) = reading.tag_id {
            reading.tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ?")
                .bind(tag_id)
                .fetch_optional(self.db)
                .await?;
        }
        Ok(Some(reading))
    }

    pub(crate) async fn load_authors(&self, books: &mut [Book]) -> AppResult<()> {
        if books.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT ab.book_id AS pivot_book_id, a.* FROM authors a \
             JOIN author_book ab ON ab.author_id = a.id \
             WHERE a.deleted_at IS NULL AND ab.book_id IN (",
        );
        push_book_ids(&mut qb, books);
        qb.push(" ORDER BY a.id");
        let rows = qb.build_query_as::<BookAuthorRow>().fetch_all(self.db).await?;

        let mut by_book: HashMap<i64, Vec<Author>> = HashMap::new();
        for row in rows {
            by_book.entry(row.pivot_book_id).or_default().push(row.author);
        }
        for book in books {
            book.authors = Some(by_book.remove(&book.id).unwrap_or_default());
        }
        Ok(())
    }

    pub(crate) async fn load_genres(&self, books: &mut [Book]) -> AppResult<()> {
        if books.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT bg.book_id AS pivot_book_id, g.* FROM genres g \
             JOIN book_genre bg ON bg.genre_id = g.id \
             WHERE g.deleted_at IS NULL AND bg.book_id IN (",
        );
        push_book_ids(&mut qb, books);
        qb.push(" ORDER BY g.id");
        let rows = qb.build_query_as::<BookGenreRow>().fetch_all(self.db).await?;

        let mut by_book: HashMap<i64, Vec<Genre>> = HashMap::new();
        for row in rows {
            by_book.entry(row.pivot_book_id).or_default().push(row.genre);
        }
        for book in books {
            book.genres = Some(by_book.remove(&book.id).unwrap_or_default());
        }
        Ok(())
    }

    pub(crate) async fn load_tags(&self, books: &mut [Book]) -> AppResult<()> {
        if books.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT bt.book_id AS pivot_book_id, t.* FROM tags t \
             JOIN book_tag bt ON bt.tag_id = t.id \
             WHERE t.deleted_at IS NULL AND bt.book_id IN (",
        );
        push_book_ids(&mut qb, books);
        qb.push(" ORDER BY t.id");
        let rows = qb.build_query_as::<BookTagRow>().fetch_all(self.db).await?;

        let mut by_book: HashMap<i64, Vec<Tag>> = HashMap::new();
        for row in rows {
            by_book.entry(row.pivot_book_id).or_default().push(row.tag);
        }
        for book in books {
            book.tags = Some(by_book.remove(&book.id).unwrap_or_default());
        }
        Ok(())
    }
}

fn push_book_ids(qb: &mut QueryBuilder<'_, Sqlite>, books: &[Book]) {
    let mut list = qb.separated(", ");
    for book in books {
        list.push_bind(book.id);
    }
    list.push_unseparated(")");
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &BookFilterDto, user_id: i64) {
    qb.push(" WHERE b.deleted_at IS NULL");

    if let Some(title) = &filter.title {
        qb.push(" AND b.title LIKE ").push_bind(format!("%{title}%"));
    }
    if let Some(author) = &filter.author {
        qb.push(
            " AND EXISTS (SELECT 1 FROM author_book ab JOIN authors a ON a.id = ab.author_id \
             WHERE ab.book_id = b.id AND a.deleted_at IS NULL \
             AND (a.first_name || ' ' || a.last_name) LIKE ",
        )
        .push_bind(format!("%{author}%"))
        .push(")");
    }
    if let Some(genre) = &filter.genre {
        qb.push(
            " AND EXISTS (SELECT 1 FROM book_genre bg JOIN genres g ON g.id = bg.genre_id \
             WHERE bg.book_id = b.id AND g.deleted_at IS NULL AND g.name LIKE ",
        )
        .push_bind(format!("%{genre}%"))
        .push(")");
    }
    if let Some(tag) = &filter.tag {
        qb.push(
            " AND EXISTS (SELECT 1 FROM book_user bu JOIN tags t ON t.id = bu.tag_id \
             WHERE bu.book_id = b.id AND bu.user_id = ",
        )
        .push_bind(user_id)
        .push(" AND t.name LIKE ")
        .push_bind(format!("%{tag}%"))
        .push(")");
    }
}
