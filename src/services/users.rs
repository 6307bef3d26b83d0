use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::instrument;

use crate::dto::{PageParams, StoreUserDto, UpdateUserDto};
use crate::errors::{AppError, AppResult};
use crate::models::User;
use crate::permissions::{Resource, Role};
use crate::services::{Page, apply_update, soft_delete};
use crate::utils::hash_password;

pub struct UserService<'a> {
    db: &'a SqlitePool,
}

impl<'a> UserService<'a> {
    #[must_use]
    pub fn new(db: &'a SqlitePool) -> Self {
        Self { db }
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn index(&self, params: PageParams) -> AppResult<Page<User>> {
        let mut page: Page<User> = super::paginate(self.db, "users", None, params).await?;
        self.load_roles(&mut page.items).await?;
        Ok(page)
    }

    /// Live user by id, roles loaded.
    ///
    /// # Errors
    /// Returns `NotFound` when the user does not exist or is trashed.
    pub async fn find(&self, id: i64) -> AppResult<User> {
        let mut user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(self.db)
        .await?
        .ok_or(AppError::NotFound)?;
        user.roles = Some(self.roles_of(user.id).await?);
        Ok(user)
    }

    /// # Errors
    /// Returns a validation error when the email is taken, or database errors.
    #[instrument(skip(self, dto), fields(email = %dto.email))]
    pub async fn store(&self, dto: StoreUserDto) -> AppResult<User> {
        self.ensure_email_free(&dto.email, None).await?;
        let password_hash = hash_password(&dto.password)?;

        let mut tx = self.db.begin().await?;
        let id = sqlx::query(
            "INSERT INTO users (name, email, password_hash, birth_date, biography, image_url) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&dto.name)
        .bind(&dto.email)
        .bind(&password_hash)
        .bind(dto.birth_date)
        .bind(&dto.biography)
        .bind(&dto.image_url)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        replace_roles(&mut tx, id, &dto.roles).await?;
        tx.commit().await?;

        tracing::info!(user_id = id, "user created");
        self.find(id).await
    }

    /// # Errors
    /// Returns a validation error when the new email is taken, or database errors.
    #[instrument(skip(self, dto, user), fields(user_id = user.id))]
    pub async fn update(&self, dto: UpdateUserDto, user: &User) -> AppResult<User> {
        let mut fields = dto.to_map(false);
        fields.remove("roles");

        if let Some(email) = dto.email.value() {
            self.ensure_email_free(email, Some(user.id)).await?;
        }
        if let Some(password) = dto.password.value() {
            fields.remove("password");
            fields.insert("password_hash".into(), hash_password(password)?.into());
        }

        let mut tx = self.db.begin().await?;
        apply_update(&mut *tx, "users", user.id, &fields).await?;
        if let Some(roles) = dto.roles.value() {
            replace_roles(&mut tx, user.id, roles).await?;
        }
        tx.commit().await?;

        self.find(user.id).await
    }

    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn destroy(&self, user: &User) -> AppResult<()> {
        soft_delete(self.db, Resource::User, user.id).await?;
        tracing::info!("user deleted");
        Ok(())
    }

    /// Create the configured admin account when no user holds that email yet.
    ///
    /// # Errors
    /// Returns database or hashing errors.
    pub async fn seed_admin(&self, email: &str, password: &str) -> AppResult<()> {
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.db)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        self.store(StoreUserDto {
            name: "Administrator".into(),
            email: email.into(),
            password: password.into(),
            birth_date: None,
            biography: None,
            image_url: None,
            roles: vec![Role::Admin],
        })
        .await?;
        tracing::info!(email, "admin account seeded");
        Ok(())
    }

    /// Roles assigned to a user.
    ///
    /// # Errors
    /// Returns database errors.
    pub async fn roles_of(&self, user_id: i64) -> AppResult<Vec<Role>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = ? ORDER BY role")
                .bind(user_id)
                .fetch_all(self.db)
                .await?;
        Ok(parse_roles(names))
    }

    async fn load_roles(&self, users: &mut [User]) -> AppResult<()> {
        if users.is_empty() {
            return Ok(());
        }
        let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT user_id, role FROM user_roles WHERE user_id IN (",
        );
        let mut list = qb.separated(", ");
        for user in users.iter() {
            list.push_bind(user.id);
        }
        list.push_unseparated(") ORDER BY role");

        let rows: Vec<(i64, String)> = qb.build_query_as().fetch_all(self.db).await?;
        let mut by_user: HashMap<i64, Vec<String>> = HashMap::new();
        for (user_id, role) in rows {
            by_user.entry(user_id).or_default().push(role);
        }
        for user in users {
            user.roles = Some(parse_roles(by_user.remove(&user.id).unwrap_or_default()));
        }
        Ok(())
    }

    /// Idempotent: following twice leaves a single edge.
    ///
    /// # Errors
    /// Returns a conflict when a user tries to follow themselves.
    #[instrument(skip(self))]
    pub async fn follow(&self, follower_id: i64, followed_id: i64) -> AppResult<()> {
        if follower_id == followed_id {
            return Err(AppError::conflict("You cannot follow yourself"));
        }
        sqlx::query("INSERT OR IGNORE INTO follows (follower_id, followed_id) VALUES (?, ?)")
            .bind(follower_id)
            .bind(followed_id)
            .execute(self.db)
            .await?;
        Ok(())
    }

    /// Idempotent: unfollowing a user that is not followed is a no-op.
    ///
    /// # Errors
    /// Returns database errors.
    #[instrument(skip(self))]
    pub async fn unfollow(&self, follower_id: i64, followed_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
            .bind(follower_id)
            .bind(followed_id)
            .execute(self.db)
            .await?;
        Ok(())
    }

    /// # Errors
    /// Returns database errors.
    pub async fn is_following(&self, follower_id: i64, followed_id: i64) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND followed_id = ?",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(self.db)
        .await?;
        Ok(count > 0)
    }

    /// Users following `user_id`.
    ///
    /// # Errors
    /// Returns database errors.
    pub async fn followers(&self, user_id: i64, params: PageParams) -> AppResult<Page<User>> {
        self.edge_page(user_id, "followed_id", "follower_id", params)
            .await
    }

    /// Users `user_id` follows.
    ///
    /// # Errors
    /// Returns database errors.
    pub async fn following(&self, user_id: i64, params: PageParams) -> AppResult<Page<User>> {
        self.edge_page(user_id, "follower_id", "followed_id", params)
            .await
    }

    async fn edge_page(
        &self,
        user_id: i64,
        anchor: &'static str,
        other: &'static str,
        params: PageParams,
    ) -> AppResult<Page<User>> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM follows f JOIN users u ON u.id = f.{other} \
             WHERE f.{anchor} = ? AND u.deleted_at IS NULL"
        ))
        .bind(user_id)
        .fetch_one(self.db)
        .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT u.* FROM follows f JOIN users u ON u.id = f.{other} \
             WHERE f.{anchor} = ? AND u.deleted_at IS NULL ORDER BY f.id LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.db)
        .await?;

        Ok(Page::new(users, total, params))
    }

    async fn ensure_email_free(&self, email: &str, except: Option<i64>) -> AppResult<()> {
        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id <> ?")
                .bind(email)
                .bind(except.unwrap_or(0))
                .fetch_one(self.db)
                .await?;
        if taken > 0 {
            return Err(AppError::invalid(
                "email",
                "The email has already been taken.",
            ));
        }
        Ok(())
    }
}

async fn replace_roles(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    user_id: i64,
    roles: &[Role],
) -> AppResult<()> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    let mut roles = roles.to_vec();
    roles.sort();
    roles.dedup();
    for role in roles {
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES (?, ?)")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

fn parse_roles(names: Vec<String>) -> Vec<Role> {
    names
        .into_iter()
        .filter_map(|name| match name.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unknown role");
                None
            }
        })
        .collect()
}
