mod common;

use bookshelf_api::{
    AppError,
    dto::{
        BookFilterDto, PageParams, StoreCommentDto, StoreGenreDto, StorePostDto, StoreReviewDto,
        UpdateBookDto, UpdatePostDto,
    },
    models::{Book, Commentable, Review, User},
    patch::Patch,
    permissions::{Resource, Role},
    services::{
        self, AuthService, BookService, CommentService, GenreService, PostService, Reaction,
        ReviewService, TagService, UserService,
    },
};
use common::{create_book, create_tag, create_user, test_config, test_db};
use sqlx::SqlitePool;

async fn finish_book(db: &SqlitePool, book: &Book, user_id: i64) {
    let completed = create_tag(db, "Completed").await;
    BookService::new(db)
        .assign_tag(book, user_id, &completed)
        .await
        .unwrap();
}

async fn review_book(db: &SqlitePool, book: &Book, reviewer: &User) -> Review {
    finish_book(db, book, reviewer.id).await;
    ReviewService::new(db)
        .store(
            StoreReviewDto {
                book_id: book.id,
                user_id: reviewer.id,
                rating: 4,
                comment: "Worth it.".into(),
            },
            book,
        )
        .await
        .unwrap()
}

async fn count(db: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(db)
        .await
        .unwrap()
}

#[tokio::test]
async fn follow_is_idempotent_and_unfollow_tolerates_missing_edge() {
    let db = test_db().await;
    let alice = create_user(&db, "Alice", &[Role::User]).await;
    let bob = create_user(&db, "Bob", &[Role::User]).await;
    let users = UserService::new(&db);

    users.follow(alice.id, bob.id).await.unwrap();
    users.follow(alice.id, bob.id).await.unwrap();
    assert!(users.is_following(alice.id, bob.id).await.unwrap());
    assert!(!users.is_following(bob.id, alice.id).await.unwrap());

    let followers = users.followers(bob.id, PageParams::default()).await.unwrap();
    assert_eq!(followers.total, 1);
    assert_eq!(followers.items[0].id, alice.id);
    let following = users.following(alice.id, PageParams::default()).await.unwrap();
    assert_eq!(following.items[0].id, bob.id);

    users.unfollow(alice.id, bob.id).await.unwrap();
    users.unfollow(alice.id, bob.id).await.unwrap();
    assert!(!users.is_following(alice.id, bob.id).await.unwrap());
}

#[tokio::test]
async fn self_follow_is_a_conflict() {
    let db = test_db().await;
    let alice = create_user(&db, "Alice", &[Role::User]).await;
    let err = UserService::new(&db)
        .follow(alice.id, alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let db = test_db().await;
    create_user(&db, "Alice", &[Role::User]).await;
    let err = AuthService::new(&db, &test_config())
        .register(bookshelf_api::dto::RegisterDto {
            name: "Other".into(),
            email: "alice@example.com".into(),
            password: "password123".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_) | AppError::Validation(_)));
}

#[tokio::test]
async fn review_requires_completed_book() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::Author]).await;
    let reader = create_user(&db, "Reader", &[Role::User]).await;
    let book = create_book(&db, &owner, "Persuasion", 249).await;
    let reviews = ReviewService::new(&db);
    let dto = || StoreReviewDto {
        book_id: book.id,
        user_id: reader.id,
        rating: 5,
        comment: "Wonderful.".into(),
    };

    let err = reviews.store(dto(), &book).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref m) if m == "Book not completed"));

    BookService::new(&db)
        .update_progress(&book, reader.id, 100)
        .await
        .unwrap();
    assert!(reviews.store(dto(), &book).await.is_err(), "partial reading");

    finish_book(&db, &book, reader.id).await;
    assert!(BookService::new(&db).is_completed(&book, reader.id).await.unwrap());
    let review = reviews.store(dto(), &book).await.unwrap();
    assert_eq!(review.rating, 5);
    assert_eq!(review.like_count, 0);
}

#[tokio::test]
async fn reading_every_page_marks_book_completed() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::Author]).await;
    let book = create_book(&db, &owner, "Emma", 474).await;
    create_tag(&db, "Completed").await;
    let books = BookService::new(&db);

    let updated = books.update_progress(&book, owner.id, 9_999).await.unwrap();
    let reading = updated.reading.expect("reading row loaded");
    assert_eq!(reading.pages_read, 474, "progress is capped at the page count");
    assert_eq!(reading.tag.map(|t| t.slug).as_deref(), Some("completed"));
    assert!(books.is_completed(&book, owner.id).await.unwrap());
}

#[tokio::test]
async fn likes_and_dislikes_keep_counters_consistent() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::Author]).await;
    let fan = create_user(&db, "Fan", &[Role::User]).await;
    let book = create_book(&db, &owner, "Sanditon", 120).await;
    finish_book(&db, &book, owner.id).await;
    let reviews = ReviewService::new(&db);
    let review = reviews
        .store(
            StoreReviewDto {
                book_id: book.id,
                user_id: owner.id,
                rating: 3,
                comment: "Unfinished.".into(),
            },
            &book,
        )
        .await
        .unwrap();

    let liked = reviews.react(review.id, fan.id, Reaction::Like).await.unwrap();
    assert_eq!((liked.like_count, liked.dislike_count), (1, 0));

    let err = reviews
        .react(review.id, fan.id, Reaction::Like)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref m) if m == "Review already liked"));

    let switched = reviews
        .react(review.id, fan.id, Reaction::Dislike)
        .await
        .unwrap();
    assert_eq!((switched.like_count, switched.dislike_count), (0, 1));

    let owner_like = reviews
        .react(review.id, owner.id, Reaction::Like)
        .await
        .unwrap();
    assert_eq!((owner_like.like_count, owner_like.dislike_count), (1, 1));

    let retracted = reviews.retract(review.id, fan.id).await.unwrap();
    assert_eq!((retracted.like_count, retracted.dislike_count), (1, 0));

    let again = reviews.retract(review.id, fan.id).await.unwrap();
    assert_eq!((again.like_count, again.dislike_count), (1, 0));
}

#[tokio::test]
async fn comments_on_posts_require_following_the_author() {
    let db = test_db().await;
    let writer = create_user(&db, "Writer", &[Role::User]).await;
    let stranger = create_user(&db, "Stranger", &[Role::User]).await;
    let book = create_book(&db, &writer, "Mansfield Park", 507).await;
    let post = PostService::new(&db)
        .store(StorePostDto {
            book_id: book.id,
            user_id: writer.id,
            body: "Halfway through and loving Fanny Price so far".into(),
            progress: 50,
        })
        .await
        .unwrap();
    let comments = CommentService::new(&db);

    let err = comments
        .store_by_post(&post, stranger.id, "Nice".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref m) if m == "Not following"));

    comments
        .store_by_post(&post, writer.id, "Replying to myself".into())
        .await
        .expect("authors may comment on their own posts");

    UserService::new(&db).follow(stranger.id, writer.id).await.unwrap();
    let comment = comments
        .store(StoreCommentDto {
            user_id: stranger.id,
            body: "Nice".into(),
            commentable: Commentable::Post(post.id),
        })
        .await
        .unwrap();
    assert_eq!(comment.commentable(), Commentable::Post(post.id));

    let listed = comments
        .by_commentable(Commentable::Post(post.id), PageParams::default())
        .await
        .unwrap();
    assert_eq!(listed.total, 2);
}

#[tokio::test]
async fn comments_on_books_are_open_to_everyone() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::Author]).await;
    let reader = create_user(&db, "Reader", &[Role::User]).await;
    let book = create_book(&db, &owner, "Lady Susan", 80).await;

    let comment = CommentService::new(&db)
        .store_by_book(book.id, reader.id, "Short but sharp".into())
        .await
        .unwrap();
    assert_eq!(comment.slug, "short-but-sharp");

    let err = CommentService::new(&db)
        .store(StoreCommentDto {
            user_id: reader.id,
            body: "Ghost".into(),
            commentable: Commentable::Book(book.id + 100),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn listings_paginate_with_default_page_size() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::User]).await;
    let book = create_book(&db, &owner, "Northanger Abbey", 251).await;
    let posts = PostService::new(&db);
    for i in 0..12 {
        posts
            .store(StorePostDto {
                book_id: book.id,
                user_id: owner.id,
                body: format!("Reading note number {i}"),
                progress: i,
            })
            .await
            .unwrap();
    }

    let first = posts.index(PageParams::default()).await.unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.total, 12);
    assert_eq!(first.last_page(), 2);

    let second = posts.by_book(book.id, PageParams::new(Some(2), None)).await.unwrap();
    assert_eq!(second.items.len(), 2);

    let wide = posts.by_user(owner.id, PageParams::new(None, Some(50))).await.unwrap();
    assert_eq!(wide.items.len(), 12);
    assert!(wide.items.iter().all(|p| p.book.is_some() && p.user.is_some()));
}

#[tokio::test]
async fn partial_update_leaves_other_columns() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::User]).await;
    let book = create_book(&db, &owner, "Pride and Prejudice", 432).await;
    let posts = PostService::new(&db);
    let post = posts
        .store(StorePostDto {
            book_id: book.id,
            user_id: owner.id,
            body: "It is a truth universally acknowledged".into(),
            progress: 1,
        })
        .await
        .unwrap();

    let updated = posts
        .update(
            UpdatePostDto {
                progress: Patch::Value(40),
                ..UpdatePostDto::default()
            },
            &post,
        )
        .await
        .unwrap();
    assert_eq!(updated.progress, 40);
    assert_eq!(updated.body, post.body);
    assert_eq!(updated.slug, post.slug);
}

#[tokio::test]
async fn soft_deleted_rows_can_be_restored_or_purged() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::Author]).await;
    let book = create_book(&db, &owner, "Emma", 474).await;
    let books = BookService::new(&db);

    books.destroy(&book).await.unwrap();
    assert!(matches!(books.find(&book.slug).await, Err(AppError::NotFound)));

    let id = services::restore(&db, Resource::Book, &book.slug).await.unwrap();
    assert_eq!(id, book.id);
    assert!(books.find(&book.slug).await.is_ok());
    assert!(matches!(
        services::restore(&db, Resource::Book, &book.slug).await,
        Err(AppError::NotFound)
    ));

    services::force_delete(&db, Resource::Book, &book.slug).await.unwrap();
    assert!(matches!(
        services::restore(&db, Resource::Book, &book.slug).await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn purged_user_reactions_leave_review_counters() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::Author]).await;
    let fan = create_user(&db, "Fan", &[Role::User]).await;
    let critic = create_user(&db, "Critic", &[Role::User]).await;
    let book = create_book(&db, &owner, "Sense and Sensibility", 409).await;
    let review = review_book(&db, &book, &owner).await;
    let reviews = ReviewService::new(&db);
    reviews.react(review.id, fan.id, Reaction::Like).await.unwrap();
    reviews.react(review.id, critic.id, Reaction::Dislike).await.unwrap();

    services::force_delete(&db, Resource::User, &fan.id.to_string()).await.unwrap();
    let after = reviews.find(review.id).await.unwrap();
    assert_eq!((after.like_count, after.dislike_count), (0, 1));

    services::force_delete(&db, Resource::User, &critic.id.to_string()).await.unwrap();
    let after = reviews.find(review.id).await.unwrap();
    assert_eq!((after.like_count, after.dislike_count), (0, 0));
    assert_eq!(count(&db, "likes").await, 0);
}

#[tokio::test]
async fn purging_a_book_drops_comments_and_likes_of_its_posts_and_reviews() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::Author]).await;
    let fan = create_user(&db, "Fan", &[Role::User]).await;
    let book = create_book(&db, &owner, "Emma", 474).await;
    UserService::new(&db).follow(fan.id, owner.id).await.unwrap();

    let post = PostService::new(&db)
        .store(StorePostDto {
            book_id: book.id,
            user_id: owner.id,
            body: "Mr Knightley is right again".into(),
            progress: 30,
        })
        .await
        .unwrap();
    let review = review_book(&db, &book, &owner).await;
    let comments = CommentService::new(&db);
    comments.store_by_post(&post, fan.id, "Always".into()).await.unwrap();
    comments.store_by_review(&review, fan.id, "Agreed".into()).await.unwrap();
    ReviewService::new(&db).react(review.id, fan.id, Reaction::Like).await.unwrap();

    services::force_delete(&db, Resource::Book, &book.slug).await.unwrap();
    assert_eq!(comments.index(PageParams::default()).await.unwrap().total, 0);
    assert_eq!(count(&db, "comments").await, 0);
    assert_eq!(count(&db, "likes").await, 0);
}

#[tokio::test]
async fn purging_a_user_drops_comments_on_their_posts_and_reviews() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::Author]).await;
    let fan = create_user(&db, "Fan", &[Role::User]).await;
    let book = create_book(&db, &fan, "Persuasion", 249).await;
    UserService::new(&db).follow(fan.id, owner.id).await.unwrap();

    let post = PostService::new(&db)
        .store(StorePostDto {
            book_id: book.id,
            user_id: owner.id,
            body: "Anne Elliot deserves better".into(),
            progress: 80,
        })
        .await
        .unwrap();
    let review = review_book(&db, &book, &owner).await;
    let comments = CommentService::new(&db);
    comments.store_by_post(&post, fan.id, "She does".into()).await.unwrap();
    comments.store_by_review(&review, fan.id, "Lovely".into()).await.unwrap();
    ReviewService::new(&db).react(review.id, fan.id, Reaction::Like).await.unwrap();

    services::force_delete(&db, Resource::User, &owner.id.to_string()).await.unwrap();
    assert_eq!(count(&db, "comments").await, 0);
    assert_eq!(count(&db, "likes").await, 0);
    assert!(BookService::new(&db).find(&book.slug).await.is_ok());
}

#[tokio::test]
async fn recreated_completed_tag_still_marks_completion() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::Author]).await;
    let reader = create_user(&db, "Reader", &[Role::User]).await;
    let book = create_book(&db, &owner, "Lady Susan", 80).await;
    let tags = TagService::new(&db);
    let books = BookService::new(&db);

    let original = create_tag(&db, "Completed").await;
    tags.destroy(&original).await.unwrap();
    let recreated = create_tag(&db, "Completed").await;
    assert_eq!(recreated.slug, "completed-1");

    let shelved = books.assign_tag(&book, reader.id, &recreated).await.unwrap();
    assert_eq!(shelved.reading.map(|r| r.pages_read), Some(80));
    assert!(books.is_completed(&book, reader.id).await.unwrap());

    let finished = books.update_progress(&book, owner.id, 80).await.unwrap();
    assert_eq!(
        finished.reading.and_then(|r| r.tag).map(|t| t.id),
        Some(recreated.id)
    );
    assert!(books.is_completed(&book, owner.id).await.unwrap());
}

#[tokio::test]
async fn book_listing_filters_by_title_author_genre_and_own_tags() {
    let db = test_db().await;
    let owner = create_user(&db, "Owner", &[Role::Author]).await;
    let other = create_user(&db, "Other", &[Role::User]).await;
    let emma = create_book(&db, &owner, "Emma", 474).await;
    let persuasion = create_book(&db, &owner, "Persuasion", 249).await;
    let books = BookService::new(&db);

    let romance = GenreService::new(&db)
        .store(StoreGenreDto { name: "Romance".into() })
        .await
        .unwrap();
    books
        .update(
            UpdateBookDto {
                genre_ids: Patch::Value(vec![romance.id]),
                ..UpdateBookDto::default()
            },
            &persuasion,
            owner.id,
        )
        .await
        .unwrap();
    let favourite = create_tag(&db, "Favourite").await;
    books.assign_tag(&emma, owner.id, &favourite).await.unwrap();

    let titles = |page: bookshelf_api::services::Page<Book>| {
        page.items.into_iter().map(|b| b.title).collect::<Vec<_>>()
    };

    let all = books.index(&BookFilterDto::default(), owner.id).await.unwrap();
    assert_eq!(all.total, 2);

    let by_title = BookFilterDto {
        title: Some("suas".into()),
        ..BookFilterDto::default()
    };
    assert_eq!(titles(books.index(&by_title, owner.id).await.unwrap()), ["Persuasion"]);

    let by_author = BookFilterDto {
        author: Some("Jane Emma".into()),
        ..BookFilterDto::default()
    };
    let found = books.index(&by_author, owner.id).await.unwrap();
    assert_eq!(found.total, 1);
    assert!(found.items[0].authors.as_ref().is_some_and(|a| a.len() == 1));
    assert_eq!(titles(found), ["Emma"]);

    let by_genre = BookFilterDto {
        genre: Some("roman".into()),
        ..BookFilterDto::default()
    };
    assert_eq!(titles(books.index(&by_genre, owner.id).await.unwrap()), ["Persuasion"]);

    let by_tag = BookFilterDto {
        tag: Some("favour".into()),
        ..BookFilterDto::default()
    };
    assert_eq!(titles(books.index(&by_tag, owner.id).await.unwrap()), ["Emma"]);
    assert_eq!(books.index(&by_tag, other.id).await.unwrap().total, 0, "tags are per reader");

    let nothing = BookFilterDto {
        title: Some("Emma".into()),
        genre: Some("Romance".into()),
        ..BookFilterDto::default()
    };
    assert_eq!(books.index(&nothing, owner.id).await.unwrap().total, 0);
}

#[tokio::test]
async fn refresh_is_refused_once_the_account_is_gone() {
    let db = test_db().await;
    let config = test_config();
    let auth = AuthService::new(&db, &config);
    let (user, tokens) = auth
        .register(bookshelf_api::dto::RegisterDto {
            name: "Leaver".into(),
            email: "leaver@example.com".into(),
            password: "password123".into(),
        })
        .await
        .unwrap();

    UserService::new(&db).destroy(&user).await.unwrap();
    let err = auth.refresh(&tokens.refresh).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    services::restore(&db, Resource::User, &user.id.to_string()).await.unwrap();
    assert!(auth.refresh(&tokens.refresh).await.is_ok(), "the rejected token was not spent");
}
