mod common;

use axum::http::{Method, StatusCode};
use bookshelf_api::{
    dto::{StoreAuthorDto, StorePostDto},
    permissions::Role,
    services::{AuthorService, PostService, UserService},
};
use common::{TestApp, create_author, create_book, create_tag, create_user};
use serde_json::json;

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api/v1/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .request(Method::GET, "/api/v1/books", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_me_logout() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/register",
            None,
            Some(json!({
                "name": "Reader",
                "email": "reader@example.com",
                "password": "password123"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User registered");
    assert_eq!(body["data"]["token_type"], "Bearer");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/login",
            None,
            Some(json!({ "email": "reader@example.com", "password": "wrongpassword" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/login",
            None,
            Some(json!({ "email": "reader@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["roles"], json!(["user"]));
    let access = body["data"]["access_token"].as_str().unwrap().to_string();
    let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

    let (status, body) = app.request(Method::GET, "/api/v1/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "reader@example.com");

    let (status, _) = app
        .request(Method::GET, "/api/v1/me", Some(&refresh), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "refresh tokens cannot call the API");

    let (status, _) = app
        .request(Method::POST, "/api/v1/logout", Some(&access), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.request(Method::GET, "/api/v1/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "revoked token is rejected");
}

#[tokio::test]
async fn refresh_rotates_tokens() {
    let app = TestApp::new().await;
    let (_, body) = app
        .request(
            Method::POST,
            "/api/v1/register",
            None,
            Some(json!({
                "name": "Reader",
                "email": "reader@example.com",
                "password": "password123"
            })),
        )
        .await;
    let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Token refreshed");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "a used refresh token is spent");
}

#[tokio::test]
async fn validation_errors_use_the_envelope() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(Method::POST, "/api/v1/register", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Validation errors");
    assert_eq!(body["data"]["name"][0], "The name field is required.");
    assert!(body["data"]["email"].is_array());
}

#[tokio::test]
async fn admin_creates_author_with_slug() {
    let app = TestApp::new().await;
    let admin = create_user(app.db(), "Admin", &[Role::Admin]).await;
    let token = app.token_for(&admin);

    let payload = json!({ "first_name": "John", "last_name": "Doe", "nationality": "American" });
    let (status, body) = app
        .request(Method::POST, "/api/v1/authors", Some(&token), Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Author created");
    assert_eq!(body["data"]["slug"], "john-doe");
    assert_eq!(body["data"]["full_name"], "John Doe");

    let (_, body) = app
        .request(Method::POST, "/api/v1/authors", Some(&token), Some(payload))
        .await;
    assert_eq!(body["data"]["slug"], "john-doe-1");

    let (status, body) = app
        .request(Method::GET, "/api/v1/authors/john-doe", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nationality"], "American");
}

#[tokio::test]
async fn non_admin_cannot_create_author() {
    let app = TestApp::new().await;
    let reader = create_user(app.db(), "Reader", &[Role::User]).await;
    let token = app.token_for(&reader);
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/authors",
            Some(&token),
            Some(json!({ "first_name": "John", "last_name": "Doe", "nationality": "American" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "This action is unauthorized.");

    let (status, _) = app.request(Method::GET, "/api/v1/roles", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn listings_carry_pagination_meta() {
    let app = TestApp::new().await;
    let reader = create_user(app.db(), "Reader", &[Role::User]).await;
    for name in ["Classic", "Gothic", "Satire"] {
        create_tag(app.db(), name).await;
    }
    let token = app.token_for(&reader);

    let (status, body) = app
        .request(Method::GET, "/api/v1/tags?per_page=2&page=2", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["meta"]["last_page"], 2);
    assert_eq!(body["meta"]["current_page"], 2);

    let (status, _) = app
        .request(Method::GET, "/api/v1/tags?per_page=500", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn review_flow_requires_completion_and_single_reaction() {
    let app = TestApp::new().await;
    let owner = create_user(app.db(), "Owner", &[Role::Author]).await;
    let reader = create_user(app.db(), "Reader", &[Role::User]).await;
    let fan = create_user(app.db(), "Fan", &[Role::User]).await;
    let book = create_book(app.db(), &owner, "Persuasion", 249).await;
    let completed = create_tag(app.db(), "Completed").await;
    let reader_token = app.token_for(&reader);
    let fan_token = app.token_for(&fan);
    let reviews_uri = format!("/api/v1/books/{}/reviews", book.slug);
    let review = json!({ "rating": 5, "comment": "Anne Elliot deserved better." });

    let (status, body) = app
        .request(Method::POST, &reviews_uri, Some(&reader_token), Some(review.clone()))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Book not completed");

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/books/{}/tags", book.slug),
            Some(&reader_token),
            Some(json!({ "tag_id": completed.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reading"]["pages_read"], 249);

    let (status, body) = app
        .request(Method::POST, &reviews_uri, Some(&reader_token), Some(review))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let review_id = body["data"]["id"].as_i64().unwrap();
    let like_uri = format!("/api/v1/reviews/{review_id}/like");

    let (status, body) = app
        .request(Method::POST, &like_uri, Some(&fan_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Review liked");
    assert_eq!(body["data"]["like_count"], 1);

    let (status, body) = app
        .request(Method::POST, &like_uri, Some(&fan_token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Review already liked");

    let (_, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/reviews/{review_id}"),
            Some(&fan_token),
            None,
        )
        .await;
    assert_eq!(body["data"]["like_count"], 1);

    let (status, body) = app
        .request(Method::DELETE, &like_uri, Some(&fan_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Reaction removed");
    assert_eq!(body["data"]["like_count"], 0);
}

#[tokio::test]
async fn owners_edit_their_records_and_others_cannot() {
    let app = TestApp::new().await;
    let owner = create_user(app.db(), "Owner", &[Role::User]).await;
    let other = create_user(app.db(), "Other", &[Role::User]).await;
    let moderator = create_user(app.db(), "Mod", &[Role::Moderator]).await;
    let book = create_book(app.db(), &owner, "Emma", 474).await;
    let post = PostService::new(app.db())
        .store(StorePostDto {
            book_id: book.id,
            user_id: owner.id,
            body: "Emma is insufferable and I love her".into(),
            progress: 10,
        })
        .await
        .unwrap();
    let uri = format!("/api/v1/posts/{}", post.slug);

    let (status, _) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&app.token_for(&other)),
            Some(json!({ "progress": 20 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&app.token_for(&owner)),
            Some(json!({ "progress": 20 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["progress"], 20);
    assert_eq!(body["data"]["body"], "Emma is insufferable and I love her");

    let (status, _) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&app.token_for(&owner)),
            Some(json!({ "body": null })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .request(Method::DELETE, &uri, Some(&app.token_for(&moderator)), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .request(Method::GET, &uri, Some(&app.token_for(&owner)), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_admins_change_roles() {
    let app = TestApp::new().await;
    let reader = create_user(app.db(), "Reader", &[Role::User]).await;
    let admin = create_user(app.db(), "Admin", &[Role::Admin]).await;
    let uri = format!("/api/v1/users/{}", reader.id);

    let (status, _) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&app.token_for(&reader)),
            Some(json!({ "roles": ["admin"] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&app.token_for(&admin)),
            Some(json!({ "roles": ["editor"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["roles"], json!(["editor"]));
}

#[tokio::test]
async fn comment_on_review_needs_a_follow() {
    let app = TestApp::new().await;
    let owner = create_user(app.db(), "Owner", &[Role::Author]).await;
    let reader = create_user(app.db(), "Reader", &[Role::User]).await;
    let book = create_book(app.db(), &owner, "Sanditon", 120).await;
    let completed = create_tag(app.db(), "Completed").await;
    let owner_token = app.token_for(&owner);
    let reader_token = app.token_for(&reader);

    app.request(
        Method::PUT,
        &format!("/api/v1/books/{}/tags", book.slug),
        Some(&owner_token),
        Some(json!({ "tag_id": completed.id })),
    )
    .await;
    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/books/{}/reviews", book.slug),
            Some(&owner_token),
            Some(json!({ "rating": 4, "comment": "Tantalising fragment." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comments_uri = format!("/api/v1/reviews/{}/comments", body["data"]["id"]);
    let comment = json!({ "body": "Fair point" });

    let (status, body) = app
        .request(Method::POST, &comments_uri, Some(&reader_token), Some(comment.clone()))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Not following");

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/users/{}/follow", owner.id),
            Some(&reader_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User followed");
    assert!(UserService::new(app.db()).is_following(reader.id, owner.id).await.unwrap());

    let (status, body) = app
        .request(Method::POST, &comments_uri, Some(&reader_token), Some(comment))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["slug"], "fair-point");
}

#[tokio::test]
async fn trashed_records_restore_and_force_delete() {
    let app = TestApp::new().await;
    let admin = create_user(app.db(), "Admin", &[Role::Admin]).await;
    let moderator = create_user(app.db(), "Mod", &[Role::Moderator]).await;
    create_tag(app.db(), "Gothic").await;
    let admin_token = app.token_for(&admin);
    let mod_token = app.token_for(&moderator);

    let (status, _) = app
        .request(Method::DELETE, "/api/v1/tags/gothic", Some(&mod_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .request(Method::POST, "/api/v1/tags/gothic/restore", Some(&mod_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Tag restored");

    let (status, _) = app
        .request(Method::POST, "/api/v1/tags/gothic/restore", Some(&mod_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "nothing left to restore");

    let (status, _) = app
        .request(Method::DELETE, "/api/v1/tags/gothic/force", Some(&mod_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::DELETE, "/api/v1/tags/gothic/force", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .request(Method::GET, "/api/v1/tags/gothic", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn relations_appear_only_where_loaded() {
    let app = TestApp::new().await;
    let owner = create_user(app.db(), "Owner", &[Role::Author]).await;
    let reader = create_user(app.db(), "Reader", &[Role::User]).await;
    let token = app.token_for(&reader);
    let book = create_book(app.db(), &owner, "Emma", 474).await;
    let idle = create_author(app.db(), "Cassandra", "Austen").await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/authors", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let authors = body["data"].as_array().unwrap();
    assert_eq!(authors.len(), 2);
    assert!(authors.iter().all(|a| a.get("books").is_none()));

    let (_, body) = app
        .request(Method::GET, "/api/v1/authors/jane-emma", Some(&token), None)
        .await;
    assert_eq!(body["data"]["books"][0]["slug"], book.slug.as_str());

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/authors/{}", idle.slug),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["books"], json!([]));

    let (_, body) = app
        .request(Method::GET, "/api/v1/books", Some(&token), None)
        .await;
    let listed = &body["data"][0];
    assert!(listed["authors"].is_array());
    assert!(listed.get("reading").is_none());
    assert!(listed.get("tags").is_none());

    let uri = format!("/api/v1/books/{}", book.slug);
    let (_, body) = app.request(Method::GET, &uri, Some(&token), None).await;
    assert!(body["data"].get("reading").is_none(), "never shelved");
    assert_eq!(body["data"]["tags"], json!([]));

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("{uri}/reading-progress"),
            Some(&token),
            Some(json!({ "pages_read": 12 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.request(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(body["data"]["reading"]["pages_read"], 12);
}

#[tokio::test]
async fn only_admins_reassign_an_author_record() {
    let app = TestApp::new().await;
    let writer = create_user(app.db(), "Writer", &[Role::Author]).await;
    let rival = create_user(app.db(), "Rival", &[Role::Author]).await;
    let admin = create_user(app.db(), "Admin", &[Role::Admin]).await;
    let author = AuthorService::new(app.db())
        .store(StoreAuthorDto {
            first_name: "Fanny".into(),
            last_name: "Burney".into(),
            nationality: "British".into(),
            biography: None,
            image_url: None,
            user_id: Some(writer.id),
        })
        .await
        .unwrap();
    let uri = format!("/api/v1/authors/{}", author.slug);
    let token = app.token_for(&writer);

    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "biography": "Diarist and novelist." })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["biography"], "Diarist and novelist.");

    for user_id in [json!(rival.id), json!(null)] {
        let (status, _) = app
            .request(
                Method::PATCH,
                &uri,
                Some(&token),
                Some(json!({ "user_id": user_id })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&app.token_for(&admin)),
            Some(json!({ "user_id": rival.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user_id"], rival.id);

    let (status, _) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "biography": "Mine again?" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
