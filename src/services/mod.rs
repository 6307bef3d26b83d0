//! Service layer: one service per resource plus the helpers they share.

pub mod auth;
pub mod authors;
pub mod books;
pub mod comments;
pub mod genres;
pub mod posts;
pub mod reviews;
pub mod tags;
pub mod users;

pub use auth::AuthService;
pub use authors::AuthorService;
pub use books::BookService;
pub use comments::CommentService;
pub use genres::GenreService;
pub use posts::PostService;
pub use reviews::{Reaction, ReviewService};
pub use tags::TagService;
pub use users::UserService;

use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::dto::PageParams;
use crate::errors::{AppError, AppResult};
use crate::models::{CommentableType, LikeableType};
use crate::permissions::Resource;

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub params: PageParams,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, params: PageParams) -> Self {
        Self {
            items,
            total,
            params,
        }
    }

    #[must_use]
    pub fn last_page(&self) -> i64 {
        let per_page = i64::from(self.params.per_page);
        ((self.total + per_page - 1) / per_page).max(1)
    }
}

/// Generic paginated `SELECT * FROM table` over live rows matching `filter`.
///
/// `filter` is a trusted SQL fragment; its single optional parameter is bound as `arg`.
pub(crate) async fn paginate<T>(
    db: &SqlitePool,
    table: &'static str,
    filter: Option<(&'static str, i64)>,
    params: PageParams,
) -> AppResult<Page<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut count = QueryBuilder::<Sqlite>::new(format!(
        "SELECT COUNT(*) FROM {table} WHERE deleted_at IS NULL"
    ));
    let mut select = QueryBuilder::<Sqlite>::new(format!(
        "SELECT * FROM {table} WHERE deleted_at IS NULL"
    ));
    if let Some((clause, arg)) = filter {
        count.push(format!(" AND {clause}")).push_bind(arg);
        select.push(format!(" AND {clause}")).push_bind(arg);
    }
    select
        .push(" ORDER BY id LIMIT ")
        .push_bind(params.limit())
        .push(" OFFSET ")
        .push_bind(params.offset());

    let total: i64 = count.build_query_scalar().fetch_one(db).await?;
    let items = select.build_query_as::<T>().fetch_all(db).await?;
    Ok(Page::new(items, total, params))
}

/// Rows of `table` with the given ids, trashed ones included.
pub(crate) async fn fetch_by_ids<T>(
    db: &SqlitePool,
    table: &'static str,
    ids: &[i64],
) -> AppResult<Vec<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {table} WHERE id IN ("));
    let mut list = qb.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(")");
    Ok(qb.build_query_as::<T>().fetch_all(db).await?)
}

/// Live row of `table` whose route key matches.
pub(crate) async fn find_by_key<T>(db: &SqlitePool, resource: Resource, key: &str) -> AppResult<T>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT * FROM {} WHERE deleted_at IS NULL AND ",
        resource.table()
    ));
    push_route_key(&mut qb, resource, key)?;
    qb.build_query_as::<T>()
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)
}

fn push_route_key(qb: &mut QueryBuilder<'_, Sqlite>, resource: Resource, key: &str) -> AppResult<()> {
    match resource.route_key() {
        "id" => {
            let id: i64 = key.parse().map_err(|_| AppError::NotFound)?;
            qb.push("id = ").push_bind(id);
        }
        column => {
            qb.push(format!("{column} = ")).push_bind(key.to_string());
        }
    }
    Ok(())
}

/// URL-safe slug for `source`, unique within `table`.
///
/// Trashed rows keep their slug, so they count as taken.
pub(crate) async fn unique_slug(
    db: &SqlitePool,
    table: &'static str,
    source: &str,
) -> AppResult<String> {
    let mut base = slug::slugify(source);
    if base.is_empty() {
        base = table.trim_end_matches('s').to_string();
    }

    let mut candidate = base.clone();
    let mut suffix = 0u32;
    loop {
        let taken: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} WHERE slug = ?"
        ))
        .bind(&candidate)
        .fetch_one(db)
        .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        suffix += 1;
        candidate = format!("{base}-{suffix}");
    }
}

/// Partial update of one row from a column map. Only the supplied columns change.
pub(crate) async fn apply_update<'e, E>(
    executor: E,
    table: &'static str,
    id: i64,
    fields: &Map<String, Value>,
) -> AppResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    if fields.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(format!("UPDATE {table} SET "));
    let mut set = qb.separated(", ");
    for (column, value) in fields {
        set.push(format!("{column} = "));
        match value {
            Value::Null => {
                set.push_bind_unseparated(None::<String>);
            }
            Value::Bool(b) => {
                set.push_bind_unseparated(*b);
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    set.push_bind_unseparated(i);
                } else {
                    set.push_bind_unseparated(n.as_f64().unwrap_or_default());
                }
            }
            Value::String(s) => {
                set.push_bind_unseparated(s.clone());
            }
            other => {
                set.push_bind_unseparated(other.to_string());
            }
        }
    }
    set.push("updated_at = CURRENT_TIMESTAMP");
    qb.push(" WHERE id = ").push_bind(id);
    qb.build().execute(executor).await?;
    Ok(())
}

/// Replace the rows of a pivot table owned by `owner_id`.
pub(crate) async fn sync_pivot(
    conn: &mut sqlx::SqliteConnection,
    table: &'static str,
    owner_column: &'static str,
    owner_id: i64,
    other_column: &'static str,
    ids: &[i64],
) -> AppResult<()> {
    sqlx::query(&format!("DELETE FROM {table} WHERE {owner_column} = ?"))
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;

    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    for id in unique {
        sqlx::query(&format!(
            "INSERT INTO {table} ({owner_column}, {other_column}) VALUES (?, ?)"
        ))
        .bind(owner_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// "exists" rule: every id must reference a live row of `table`.
///
/// # Errors
/// Returns a validation error on `field` naming the first missing id.
pub async fn ensure_exists(
    db: &SqlitePool,
    table: &'static str,
    field: &str,
    ids: &[i64],
) -> AppResult<()> {
    for id in ids {
        let found: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_one(db)
        .await?;
        if found == 0 {
            return Err(AppError::invalid(
                field,
                format!("The selected {} is invalid.", field.replace('_', " ")),
            ));
        }
    }
    Ok(())
}

/// Mark a row as trashed.
pub(crate) async fn soft_delete(db: &SqlitePool, resource: Resource, id: i64) -> AppResult<()> {
    sqlx::query(&format!(
        "UPDATE {} SET deleted_at = CURRENT_TIMESTAMP WHERE id = ? AND deleted_at IS NULL",
        resource.table()
    ))
    .bind(id)
    .execute(db)
    .await?;
    Ok(())
}

/// Bring a trashed row back.
///
/// # Errors
/// Returns `NotFound` when no trashed row matches the key.
#[tracing::instrument(skip(db))]
pub async fn restore(db: &SqlitePool, resource: Resource, key: &str) -> AppResult<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT id FROM {} WHERE deleted_at IS NOT NULL AND ",
        resource.table()
    ));
    push_route_key(&mut qb, resource, key)?;
    let id: i64 = qb
        .build_query_scalar()
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

    sqlx::query(&format!(
        "UPDATE {} SET deleted_at = NULL WHERE id = ?",
        resource.table()
    ))
    .bind(id)
    .execute(db)
    .await?;

    tracing::info!(id, "record restored");
    Ok(id)
}

/// Remove a row for good, trashed or not, along with its comments and likes.
///
/// Posts and reviews removed by a book or user cascade take their comments and likes
/// with them. A purged user's reactions are withdrawn from review counters first.
///
/// # Errors
/// Returns `NotFound` when no row matches the key.
#[tracing::instrument(skip(db))]
pub async fn force_delete(db: &SqlitePool, resource: Resource, key: &str) -> AppResult<()> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT id FROM {} WHERE ", resource.table()));
    push_route_key(&mut qb, resource, key)?;
    let id: i64 = qb
        .build_query_scalar()
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut tx = db.begin().await?;

    let commentable = match resource {
        Resource::Book => Some(CommentableType::Book),
        Resource::Post => Some(CommentableType::Post),
        Resource::Review => Some(CommentableType::Review),
        _ => None,
    };
    if let Some(kind) = commentable {
        sqlx::query("DELETE FROM comments WHERE commentable_type = ? AND commentable_id = ?")
            .bind(kind)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    if resource == Resource::Review {
        sqlx::query("DELETE FROM likes WHERE likeable_type = ? AND likeable_id = ?")
            .bind(LikeableType::Review)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    if resource == Resource::User {
        withdraw_reactions(&mut tx, id).await?;
    }
    if let Some(column) = match resource {
        Resource::Book => Some("book_id"),
        Resource::User => Some("user_id"),
        _ => None,
    } {
        purge_cascaded_children(&mut tx, column, id).await?;
    }

    sqlx::query(&format!("DELETE FROM {} WHERE id = ?", resource.table()))
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(id, "record force deleted");
    Ok(())
}

/// Take back every like and dislike `user_id` cast, keeping review counters in step.
async fn withdraw_reactions(conn: &mut sqlx::SqliteConnection, user_id: i64) -> AppResult<()> {
    sqlx::query(
        "UPDATE reviews SET \
         like_count = MAX(like_count - (SELECT COUNT(*) FROM likes l WHERE l.user_id = ? \
             AND l.likeable_type = ? AND l.likeable_id = reviews.id AND l.is_dislike = 0), 0), \
         dislike_count = MAX(dislike_count - (SELECT COUNT(*) FROM likes l WHERE l.user_id = ? \
             AND l.likeable_type = ? AND l.likeable_id = reviews.id AND l.is_dislike = 1), 0) \
         WHERE id IN (SELECT likeable_id FROM likes WHERE user_id = ? AND likeable_type = ?)",
    )
    .bind(user_id)
    .bind(LikeableType::Review)
    .bind(user_id)
    .bind(LikeableType::Review)
    .bind(user_id)
    .bind(LikeableType::Review)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM likes WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Drop comments and likes hanging off the posts and reviews whose `column` is `id`.
/// Those rows go with the parent through foreign key cascades; their polymorphic
/// children have no foreign key and must be removed by hand.
async fn purge_cascaded_children(conn: &mut sqlx::SqliteConnection, column: &str, id: i64) -> AppResult<()> {
    for (kind, table) in [
        (CommentableType::Post, "posts"),
        (CommentableType::Review, "reviews"),
    ] {
        sqlx::query(&format!(
            "DELETE FROM comments WHERE commentable_type = ? \
             AND commentable_id IN (SELECT id FROM {table} WHERE {column} = ?)"
        ))
        .bind(kind)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query(&format!(
        "DELETE FROM likes WHERE likeable_type = ? \
         AND likeable_id IN (SELECT id FROM reviews WHERE {column} = ?)"
    ))
    .bind(LikeableType::Review)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
