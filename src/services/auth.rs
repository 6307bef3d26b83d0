use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::dto::RegisterDto;
use crate::errors::{AppError, AppResult};
use crate::models::{Claims, User};
use crate::services::UserService;
use crate::utils::{IssuedTokens, create_jwt_tokens, decode_jwt, verify_password};

/// Registration, login and bearer token lifecycle.
pub struct AuthService<'a> {
    db: &'a SqlitePool,
    config: &'a Config,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub fn new(db: &'a SqlitePool, config: &'a Config) -> Self {
        Self { db, config }
    }

    /// # Errors
    /// Returns a validation error when the email is taken, or database errors.
    #[instrument(skip(self, dto), fields(email = %dto.email))]
    pub async fn register(&self, dto: RegisterDto) -> AppResult<(User, IssuedTokens)> {
        let user = UserService::new(self.db).store(dto.into()).await?;
        let tokens = create_jwt_tokens(user.id, self.config)?;
        tracing::info!(user_id = user.id, "user registered");
        Ok((user, tokens))
    }

    /// # Errors
    /// Returns `InvalidCredentials` for an unknown email or a wrong password.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(User, IssuedTokens)> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = ? AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        let tokens = create_jwt_tokens(user.id, self.config)?;
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a new pair; the used refresh token is revoked.
    ///
    /// # Errors
    /// Returns `Unauthorized` for access tokens, revoked tokens, invalid signatures or
    /// subjects that no longer exist or are trashed.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<IssuedTokens> {
        let claims = decode_jwt(refresh_token, self.config)?;
        if !claims.refresh || self.is_revoked(claims.jti).await? {
            return Err(AppError::Unauthorized);
        }
        UserService::new(self.db)
            .find(claims.sub)
            .await
            .map_err(|err| match err {
                AppError::NotFound => AppError::Unauthorized,
                other => other,
            })?;
        self.revoke(&claims).await?;
        create_jwt_tokens(claims.sub, self.config)
    }

    /// Revoke the token described by `claims`.
    ///
    /// # Errors
    /// Returns database errors.
    pub async fn revoke(&self, claims: &Claims) -> AppResult<()> {
        let expires_at = i64::try_from(claims.exp).unwrap_or(i64::MAX);
        sqlx::query("INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?, ?)")
            .bind(claims.jti.to_string())
            .bind(expires_at)
            .execute(self.db)
            .await?;

        sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < ?")
            .bind(Utc::now().timestamp())
            .execute(self.db)
            .await?;
        Ok(())
    }

    /// # Errors
    /// Returns database errors.
    pub async fn is_revoked(&self, jti: Uuid) -> AppResult<bool> {
        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM revoked_tokens WHERE jti = ?")
            .bind(jti.to_string())
            .fetch_one(self.db)
            .await?;
        Ok(found > 0)
    }
}
