use std::sync::Arc;

use axum::{Extension, extract::State, http::StatusCode};

use crate::{
    AppState,
    dto::RegisterDto,
    errors::{AppError, AppResult},
    extract::ValidatedJson,
    models::Claims,
    permissions::{self, Role},
    policy::AuthUser,
    requests::{LoginRequest, RefreshRequest, RegisterRequest},
    resources::{
        Created, JsonResponse, RoleResource, SessionResource, TokenResource, UserResource,
        created, ok,
    },
    services::{AuthService, UserService},
};

/// Register a new reader account.
///
/// # Errors
/// Returns validation errors (including a taken email) or database errors.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> AppResult<Created<SessionResource>> {
    let dto = RegisterDto::from_request(payload)?;
    let (user, tokens) = AuthService::new(&state.db, &state.config)
        .register(dto)
        .await?;

    Ok(created(
        "User registered",
        SessionResource {
            user: user.into(),
            tokens: tokens.into(),
        },
    ))
}

/// Authenticate a user and return JWT tokens.
///
/// # Errors
/// Returns validation, invalid credentials, or database errors.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<JsonResponse<SessionResource>> {
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    let (user, tokens) = AuthService::new(&state.db, &state.config)
        .login(&email, &password)
        .await?;

    let user = UserService::new(&state.db).find(user.id).await?;
    Ok(ok(
        "Logged in",
        SessionResource {
            user: user.into(),
            tokens: tokens.into(),
        },
    ))
}

/// Exchange a refresh token for a new token pair.
///
/// # Errors
/// Returns unauthorized for access, revoked or invalid tokens.
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<RefreshRequest>,
) -> AppResult<JsonResponse<TokenResource>> {
    let tokens = AuthService::new(&state.db, &state.config)
        .refresh(&body.refresh_token)
        .await?;
    Ok(ok("Token refreshed", tokens.into()))
}

/// Revoke the access token used for this request.
///
/// # Errors
/// Returns database errors.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> AppResult<StatusCode> {
    AuthService::new(&state.db, &state.config)
        .revoke(&claims)
        .await?;
    tracing::info!(user_id = claims.sub, "user logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// The authenticated user with roles.
///
/// # Errors
/// Returns not found when the account was removed meanwhile.
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
) -> AppResult<JsonResponse<UserResource>> {
    let user = UserService::new(&state.db).find(actor.id).await?;
    Ok(ok("User retrieved", user.into()))
}

/// The permission table, role by role. Admin only.
///
/// # Errors
/// Returns forbidden for non-admins.
#[allow(clippy::unused_async)]
pub async fn roles(
    Extension(actor): Extension<AuthUser>,
) -> AppResult<JsonResponse<Vec<RoleResource>>> {
    if !actor.is_admin() {
        return Err(AppError::Forbidden);
    }
    let table = permissions::table();
    let roles = Role::ALL
        .into_iter()
        .map(|role| RoleResource::new(role, table.bundle(role)))
        .collect();
    Ok(ok("Roles retrieved", roles))
}
