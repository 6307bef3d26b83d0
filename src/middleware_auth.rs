use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::{
    AppState,
    errors::AppError,
    models::Claims,
    policy::AuthUser,
    services::{AuthService, UserService},
    utils::decode_jwt,
};

/// Authentication middleware validating JWT access tokens.
///
/// On success the request carries the caller as `AuthUser` and the token `Claims`.
///
/// # Errors
/// Returns unauthorized for a missing, invalid, refresh or revoked token, or when the
/// account no longer exists; too many requests once the per-user quota is spent.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;
    let claims: Claims = decode_jwt(token, &state.config)?;
    if claims.refresh {
        return Err(AppError::Unauthorized);
    }
    if AuthService::new(&state.db, &state.config)
        .is_revoked(claims.jti)
        .await?
    {
        return Err(AppError::Unauthorized);
    }

    let key = claims.sub.to_string();
    if state.rate_limiter.check_key(&key).is_err() {
        tracing::warn!(user_id = claims.sub, "rate limit exceeded");
        return Err(AppError::TooManyRequests);
    }

    let user = UserService::new(&state.db)
        .find(claims.sub)
        .await
        .map_err(|e| match e {
            AppError::NotFound => AppError::Unauthorized,
            other => other,
        })?;

    req.extensions_mut()
        .insert(AuthUser::new(user.id, user.roles.unwrap_or_default()));
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
