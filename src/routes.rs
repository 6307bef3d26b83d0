use std::sync::Arc;

use axum::http::header::STRICT_TRANSPORT_SECURITY;
use axum::{
    Extension, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderValue, StatusCode},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    handlers::{
        self, auth, authors, books, comments, genres, posts, reviews, tags, trash, users,
    },
    middleware_auth,
    permissions::Resource,
    policy::AuthUser,
};

/// The full application router with its middleware stack.
pub fn build_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/register", post(auth::register))
        .route("/api/v1/login", post(auth::login))
        .route("/api/v1/refresh", post(auth::refresh_token));

    let mut protected_routes = Router::new()
        .route("/api/v1/logout", post(auth::logout))
        .route("/api/v1/me", get(auth::me))
        .route("/api/v1/roles", get(auth::roles))
        // authors
        .route("/api/v1/authors", get(authors::index).post(authors::store))
        .route(
            "/api/v1/authors/{author}",
            get(authors::show)
                .put(authors::update)
                .patch(authors::update)
                .delete(authors::destroy),
        )
        // books
        .route("/api/v1/books", get(books::index).post(books::store))
        .route(
            "/api/v1/books/{book}",
            get(books::show)
                .put(books::update)
                .patch(books::update)
                .delete(books::destroy),
        )
        .route("/api/v1/books/{book}/tags", put(books::assign_tag))
        .route("/api/v1/books/{book}/reading-progress", put(books::reading_progress))
        .route(
            "/api/v1/books/{book}/posts",
            get(books::posts).post(books::store_post),
        )
        .route(
            "/api/v1/books/{book}/reviews",
            get(books::reviews).post(books::store_review),
        )
        .route(
            "/api/v1/books/{book}/comments",
            get(books::comments).post(books::store_comment),
        )
        // genres
        .route("/api/v1/genres", get(genres::index).post(genres::store))
        .route(
            "/api/v1/genres/{genre}",
            get(genres::show)
                .put(genres::update)
                .patch(genres::update)
                .delete(genres::destroy),
        )
        // tags
        .route("/api/v1/tags", get(tags::index).post(tags::store))
        .route(
            "/api/v1/tags/{tag}",
            get(tags::show)
                .put(tags::update)
                .patch(tags::update)
                .delete(tags::destroy),
        )
        // posts
        .route("/api/v1/posts", get(posts::index).post(posts::store))
        .route(
            "/api/v1/posts/{post}",
            get(posts::show)
                .put(posts::update)
                .patch(posts::update)
                .delete(posts::destroy),
        )
        .route(
            "/api/v1/posts/{post}/comments",
            get(posts::comments).post(posts::store_comment),
        )
        // reviews
        .route("/api/v1/reviews", get(reviews::index).post(reviews::store))
        .route(
            "/api/v1/reviews/{review}",
            get(reviews::show)
                .put(reviews::update)
                .patch(reviews::update)
                .delete(reviews::destroy),
        )
        .route(
            "/api/v1/reviews/{review}/like",
            post(reviews::like).delete(reviews::unlike),
        )
        .route("/api/v1/reviews/{review}/dislike", post(reviews::dislike))
        .route(
            "/api/v1/reviews/{review}/comments",
            get(reviews::comments).post(reviews::store_comment),
        )
        // comments
        .route("/api/v1/comments", get(comments::index).post(comments::store))
        .route(
            "/api/v1/comments/{comment}",
            get(comments::show)
                .put(comments::update)
                .patch(comments::update)
                .delete(comments::destroy),
        )
        // users
        .route("/api/v1/users", get(users::index).post(users::store))
        .route(
            "/api/v1/users/{user}",
            get(users::show)
                .put(users::update)
                .patch(users::update)
                .delete(users::destroy),
        )
        .route("/api/v1/users/{user}/reviews", get(users::reviews))
        .route(
            "/api/v1/users/{user}/posts",
            get(users::posts).post(users::store_post),
        )
        .route(
            "/api/v1/users/{user}/follow",
            post(users::follow).delete(users::unfollow),
        )
        .route("/api/v1/users/{user}/followers", get(users::followers))
        .route("/api/v1/users/{user}/following", get(users::following));

    for resource in Resource::ALL {
        let base = format!("/api/v1/{}/{{{}}}", resource.plural(), resource.singular());
        protected_routes = protected_routes
            .route(
                &format!("{base}/restore"),
                post(
                    move |State(state): State<Arc<AppState>>,
                          Extension(actor): Extension<AuthUser>,
                          Path(key): Path<String>| async move {
                        trash::restore(&state.db, &actor, resource, &key).await
                    },
                ),
            )
            .route(
                &format!("{base}/force"),
                delete(
                    move |State(state): State<Arc<AppState>>,
                          Extension(actor): Extension<AuthUser>,
                          Path(key): Path<String>| async move {
                        trash::force_delete(&state.db, &actor, resource, &key)
                            .await
                            .map(|()| StatusCode::NO_CONTENT)
                    },
                ),
            );
    }

    let protected_routes = protected_routes.route_layer(middleware::from_fn_with_state(
        state.clone(),
        middleware_auth::auth_middleware,
    ));

    let hsts_value: HeaderValue =
        HeaderValue::from_static("max-age=63072000; includeSubDomains; preload");

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            tower_http::set_header::SetResponseHeaderLayer::if_not_present(
                STRICT_TRANSPORT_SECURITY,
                hsts_value,
            ),
        )
}
