// tests/api_tests.rs

use std::sync::Arc;

use inkpost::{
    config::Config,
    models::directory::{Account, Blog},
    routes,
    state::AppState,
    store::{AccountDirectory, MemoryStore, Stores},
    utils::jwt::sign_jwt,
};
use serde_json::{Value, json};

const TEST_SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    store: MemoryStore,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn account(&self, username: &str) -> (Account, String) {
        let account = self.store.create_account(username).await;
        let token = sign_jwt(account.id, TEST_SECRET, 600).expect("Failed to sign token");
        (account, token)
    }

    async fn comment(&self, token: &str, blog_id: i64, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/blogs/{}/comments", blog_id)))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn comment_id(&self, token: &str, blog_id: i64, body: Value) -> i64 {
        let response = self.comment(token, blog_id, body).await;
        assert_eq!(response.status().as_u16(), 201);
        let created: Value = response.json().await.unwrap();
        created["id"].as_i64().unwrap()
    }

    async fn get_json(&self, path: &str, token: Option<&str>) -> (u16, Value) {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.expect("Failed to execute request");
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// Reads the blog in edit mode so no read is counted.
    async fn blog(&self, blog_id: i64) -> Value {
        let (status, body) = self
            .get_json(&format!("/api/blogs/{}?mode=edit", blog_id), None)
            .await;
        assert_eq!(status, 200);
        body
    }
}

/// Helper function to spawn the app on a random port for testing.
/// Uses the in-memory backend so no database is required.
async fn spawn_app() -> TestApp {
    let store = MemoryStore::new();
    let config = Config::for_memory(TEST_SECRET);

    let state = AppState::new(Stores::from_backend(Arc::new(store.clone())), config);
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        store,
        client: reqwest::Client::new(),
    }
}

async fn blog_with_author(app: &TestApp) -> (Blog, Account, String) {
    let (author, token) = app.account("author").await;
    let blog = app.store.create_blog(author.id, "First post").await;
    (blog, author, token)
}

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn writes_require_a_valid_token() {
    let app = spawn_app().await;
    let (blog, _, _) = blog_with_author(&app).await;

    let anonymous = app
        .client
        .post(app.url(&format!("/api/blogs/{}/comments", blog.id)))
        .json(&json!({ "comment": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let forged = app.comment("not-a-jwt", blog.id, json!({ "comment": "hello" })).await;
    assert_eq!(forged.status().as_u16(), 401);

    let (status, _) = app.get_json("/api/notifications", None).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn top_level_comment_updates_counters_and_notifies_author() {
    let app = spawn_app().await;
    let (blog, author, author_token) = blog_with_author(&app).await;
    let (reader, reader_token) = app.account("reader").await;

    let response = app
        .comment(&reader_token, blog.id, json!({ "comment": "  Nice <b>post</b>  " }))
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let created: Value = response.json().await.unwrap();
    assert_eq!(created["comment"], "Nice <b>post</b>");
    assert_eq!(created["user_id"], reader.id);
    assert_eq!(created["children"], json!([]));

    let blog_json = app.blog(blog.id).await;
    assert_eq!(blog_json["total_comments"], 1);
    assert_eq!(blog_json["total_parent_comments"], 1);

    let (status, feed) = app
        .get_json("/api/notifications?filter=comment", Some(&author_token))
        .await;
    assert_eq!(status, 200);
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["kind"], "comment");
    assert_eq!(feed[0]["recipient_id"], author.id);
    assert_eq!(feed[0]["actor_id"], reader.id);
    assert_eq!(feed[0]["comment_id"], created["id"]);
}

#[tokio::test]
async fn comment_bodies_round_trip_verbatim() {
    let app = spawn_app().await;
    let (blog, _, _) = blog_with_author(&app).await;
    let (_, token) = app.account("reader").await;

    let response = app
        .comment(&token, blog.id, json!({ "comment": "Tom & Jerry: 1 < 2" }))
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["comment"], "Tom & Jerry: 1 < 2");

    let ampersands = "&".repeat(300);
    let response = app
        .comment(&token, blog.id, json!({ "comment": ampersands }))
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let (_, comments) = app
        .get_json(&format!("/api/blogs/{}/comments", blog.id), None)
        .await;
    assert_eq!(comments[0]["comment"], ampersands);
    assert_eq!(comments[1]["comment"], "Tom & Jerry: 1 < 2");

    // Markup with nothing to read counts as empty.
    let markup_only = app
        .comment(&token, blog.id, json!({ "comment": "<script>alert(1)</script>" }))
        .await;
    assert_eq!(markup_only.status().as_u16(), 400);
}

#[tokio::test]
async fn invalid_comments_are_rejected() {
    let app = spawn_app().await;
    let (blog, author, _) = blog_with_author(&app).await;
    let (_, token) = app.account("reader").await;

    let blank = app.comment(&token, blog.id, json!({ "comment": "   " })).await;
    assert_eq!(blank.status().as_u16(), 400);

    let empty = app.comment(&token, blog.id, json!({ "comment": "" })).await;
    assert_eq!(empty.status().as_u16(), 400);

    let long = app
        .comment(&token, blog.id, json!({ "comment": "x".repeat(1001) }))
        .await;
    assert_eq!(long.status().as_u16(), 400);

    let wrong_author = app
        .comment(
            &token,
            blog.id,
            json!({ "comment": "hello", "blog_author": author.id + 1000 }),
        )
        .await;
    assert_eq!(wrong_author.status().as_u16(), 400);

    let missing_blog = app.comment(&token, 9999, json!({ "comment": "hello" })).await;
    assert_eq!(missing_blog.status().as_u16(), 404);

    let missing_parent = app
        .comment(
            &token,
            blog.id,
            json!({ "comment": "hello", "replying_to": 9999 }),
        )
        .await;
    assert_eq!(missing_parent.status().as_u16(), 404);

    // Nothing was written
    let blog_json = app.blog(blog.id).await;
    assert_eq!(blog_json["total_comments"], 0);
    assert_eq!(blog_json["total_parent_comments"], 0);
}

#[tokio::test]
async fn reply_links_to_parent_and_notifies_parent_author() {
    let app = spawn_app().await;
    let (blog, _, author_token) = blog_with_author(&app).await;
    let (commenter, commenter_token) = app.account("commenter").await;
    let (replier, replier_token) = app.account("replier").await;

    let parent_id = app
        .comment_id(&commenter_token, blog.id, json!({ "comment": "first" }))
        .await;
    let reply_id = app
        .comment_id(
            &replier_token,
            blog.id,
            json!({ "comment": "answer", "replying_to": parent_id }),
        )
        .await;

    let blog_json = app.blog(blog.id).await;
    assert_eq!(blog_json["total_comments"], 2);
    assert_eq!(blog_json["total_parent_comments"], 1);

    let (status, comments) = app
        .get_json(&format!("/api/blogs/{}/comments", blog.id), None)
        .await;
    assert_eq!(status, 200);
    let comments = comments.as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["children"], json!([reply_id]));
    assert_eq!(comments[0]["commented_by"]["username"], "commenter");

    let (status, replies) = app
        .get_json(&format!("/api/comments/{}/replies", parent_id), None)
        .await;
    assert_eq!(status, 200);
    let replies = replies.as_array().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["id"], reply_id);
    assert_eq!(replies[0]["is_reply"], true);
    assert_eq!(replies[0]["parent_comment_id"], parent_id);

    // The parent's author gets the reply, the blog author does not.
    let (_, feed) = app
        .get_json("/api/notifications?filter=reply", Some(&commenter_token))
        .await;
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["actor_id"], replier.id);
    assert_eq!(feed[0]["comment_id"], reply_id);
    assert_eq!(feed[0]["replied_on_comment_id"], parent_id);

    let (_, author_replies) = app
        .get_json("/api/notifications?filter=reply", Some(&author_token))
        .await;
    assert!(author_replies.as_array().unwrap().is_empty());
    assert_ne!(commenter.id, replier.id);
}

#[tokio::test]
async fn reply_from_feed_is_linked_to_that_notification() {
    let app = spawn_app().await;
    let (blog, _, author_token) = blog_with_author(&app).await;
    let (_, reader_token) = app.account("reader").await;

    let comment_id = app
        .comment_id(&reader_token, blog.id, json!({ "comment": "question?" }))
        .await;

    let (_, feed) = app.get_json("/api/notifications", Some(&author_token)).await;
    let notification_id = feed[0]["id"].as_i64().unwrap();

    let reply_id = app
        .comment_id(
            &author_token,
            blog.id,
            json!({
                "comment": "answer",
                "replying_to": comment_id,
                "notification_id": notification_id,
            }),
        )
        .await;

    let (_, feed) = app.get_json("/api/notifications", Some(&author_token)).await;
    assert_eq!(feed[0]["id"], notification_id);
    assert_eq!(feed[0]["reply_id"], reply_id);
}

#[tokio::test]
async fn comments_are_paged_newest_first() {
    let app = spawn_app().await;
    let (blog, _, _) = blog_with_author(&app).await;
    let (_, token) = app.account("reader").await;

    let mut ids = Vec::new();
    for i in 0..7 {
        ids.push(
            app.comment_id(&token, blog.id, json!({ "comment": format!("comment {}", i) }))
                .await,
        );
    }

    let (_, first) = app
        .get_json(&format!("/api/blogs/{}/comments", blog.id), None)
        .await;
    let first: Vec<i64> = first
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    let expected: Vec<i64> = ids.iter().rev().take(5).copied().collect();
    assert_eq!(first, expected);

    let (_, second) = app
        .get_json(&format!("/api/blogs/{}/comments?skip=5", blog.id), None)
        .await;
    let second: Vec<i64> = second
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert_eq!(second, vec![ids[1], ids[0]]);

    let (status, _) = app.get_json("/api/blogs/9999/comments", None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn delete_requires_comment_or_blog_author() {
    let app = spawn_app().await;
    let (blog, _, author_token) = blog_with_author(&app).await;
    let (_, reader_token) = app.account("reader").await;
    let (_, stranger_token) = app.account("stranger").await;

    let comment_id = app
        .comment_id(&reader_token, blog.id, json!({ "comment": "mine" }))
        .await;

    let forbidden = app
        .client
        .delete(app.url(&format!("/api/comments/{}", comment_id)))
        .bearer_auth(&stranger_token)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let done = app
        .client
        .delete(app.url(&format!("/api/comments/{}", comment_id)))
        .bearer_auth(&author_token)
        .send()
        .await
        .unwrap();
    assert_eq!(done.status().as_u16(), 200);
    let body: Value = done.json().await.unwrap();
    assert_eq!(body["status"], "done");

    let missing = app
        .client
        .delete(app.url(&format!("/api/comments/{}", comment_id)))
        .bearer_auth(&reader_token)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn deleting_a_thread_removes_replies_counters_and_notifications() {
    let app = spawn_app().await;
    let (blog, _, author_token) = blog_with_author(&app).await;
    let (_, reader_token) = app.account("reader").await;
    let (_, replier_token) = app.account("replier").await;

    let root = app
        .comment_id(&reader_token, blog.id, json!({ "comment": "root" }))
        .await;
    let reply = app
        .comment_id(
            &replier_token,
            blog.id,
            json!({ "comment": "reply", "replying_to": root }),
        )
        .await;
    app.comment_id(
        &reader_token,
        blog.id,
        json!({ "comment": "nested", "replying_to": reply }),
    )
    .await;
    let other = app
        .comment_id(&replier_token, blog.id, json!({ "comment": "unrelated" }))
        .await;

    let blog_json = app.blog(blog.id).await;
    assert_eq!(blog_json["total_comments"], 4);
    assert_eq!(blog_json["total_parent_comments"], 2);

    let response = app
        .client
        .delete(app.url(&format!("/api/comments/{}", root)))
        .bearer_auth(&reader_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let blog_json = app.blog(blog.id).await;
    assert_eq!(blog_json["total_comments"], 1);
    assert_eq!(blog_json["total_parent_comments"], 1);

    let (_, comments) = app
        .get_json(&format!("/api/blogs/{}/comments", blog.id), None)
        .await;
    let comments = comments.as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["id"], other);

    let (status, _) = app
        .get_json(&format!("/api/comments/{}/replies", reply), None)
        .await;
    assert_eq!(status, 404);

    // Only the notification about the surviving comment is left.
    let (_, count) = app
        .get_json("/api/notifications/count", Some(&author_token))
        .await;
    assert_eq!(count["total_docs"], 1);
    let (_, replies) = app
        .get_json("/api/notifications?filter=reply", Some(&reader_token))
        .await;
    assert!(replies.as_array().unwrap().is_empty());
    let (_, replies) = app
        .get_json("/api/notifications?filter=reply", Some(&replier_token))
        .await;
    assert!(replies.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_reply_detaches_it_from_its_parent() {
    let app = spawn_app().await;
    let (blog, _, _) = blog_with_author(&app).await;
    let (_, token) = app.account("reader").await;

    let root = app.comment_id(&token, blog.id, json!({ "comment": "root" })).await;
    let reply = app
        .comment_id(&token, blog.id, json!({ "comment": "reply", "replying_to": root }))
        .await;

    let response = app
        .client
        .delete(app.url(&format!("/api/comments/{}", reply)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let (_, comments) = app
        .get_json(&format!("/api/blogs/{}/comments", blog.id), None)
        .await;
    assert_eq!(comments[0]["children"], json!([]));

    let blog_json = app.blog(blog.id).await;
    assert_eq!(blog_json["total_comments"], 1);
    assert_eq!(blog_json["total_parent_comments"], 1);
}

#[tokio::test]
async fn like_toggles_and_notifies_once() {
    let app = spawn_app().await;
    let (blog, _, author_token) = blog_with_author(&app).await;
    let (_, reader_token) = app.account("reader").await;

    let like_url = app.url(&format!("/api/blogs/{}/like", blog.id));
    let liked_path = format!("/api/blogs/{}/liked", blog.id);

    let first: Value = app
        .client
        .post(&like_url)
        .bearer_auth(&reader_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["liked_by_user"], true);

    let (_, liked) = app.get_json(&liked_path, Some(&reader_token)).await;
    assert_eq!(liked["result"], true);
    assert_eq!(app.blog(blog.id).await["total_likes"], 1);

    let (_, likes) = app
        .get_json("/api/notifications?filter=like", Some(&author_token))
        .await;
    assert_eq!(likes.as_array().unwrap().len(), 1);

    let second: Value = app
        .client
        .post(&like_url)
        .bearer_auth(&reader_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["liked_by_user"], false);

    let (_, liked) = app.get_json(&liked_path, Some(&reader_token)).await;
    assert_eq!(liked["result"], false);
    assert_eq!(app.blog(blog.id).await["total_likes"], 0);

    let (_, count) = app
        .get_json("/api/notifications/count?filter=like", Some(&author_token))
        .await;
    assert_eq!(count["total_docs"], 0);

    let (status, _) = app.get_json("/api/blogs/9999/liked", Some(&reader_token)).await;
    assert_eq!(status, 200);
    let missing = app
        .client
        .post(app.url("/api/blogs/9999/like"))
        .bearer_auth(&reader_token)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn listing_notifications_marks_them_seen() {
    let app = spawn_app().await;
    let (blog, _, author_token) = blog_with_author(&app).await;
    let (_, reader_token) = app.account("reader").await;

    let (_, unseen) = app
        .get_json("/api/notifications/unseen", Some(&author_token))
        .await;
    assert_eq!(unseen["new_notification_available"], false);

    app.comment_id(&reader_token, blog.id, json!({ "comment": "hi" })).await;

    let (_, unseen) = app
        .get_json("/api/notifications/unseen", Some(&author_token))
        .await;
    assert_eq!(unseen["new_notification_available"], true);

    let (_, feed) = app.get_json("/api/notifications", Some(&author_token)).await;
    assert_eq!(feed[0]["seen"], false);

    let (_, unseen) = app
        .get_json("/api/notifications/unseen", Some(&author_token))
        .await;
    assert_eq!(unseen["new_notification_available"], false);

    let (_, feed) = app.get_json("/api/notifications", Some(&author_token)).await;
    assert_eq!(feed[0]["seen"], true);
}

#[tokio::test]
async fn own_actions_never_reach_the_feed() {
    let app = spawn_app().await;
    let (blog, _, author_token) = blog_with_author(&app).await;

    app.comment_id(&author_token, blog.id, json!({ "comment": "pinned note" }))
        .await;
    app.client
        .post(app.url(&format!("/api/blogs/{}/like", blog.id)))
        .bearer_auth(&author_token)
        .send()
        .await
        .unwrap();

    let (_, count) = app
        .get_json("/api/notifications/count", Some(&author_token))
        .await;
    assert_eq!(count["total_docs"], 0);
    let (_, unseen) = app
        .get_json("/api/notifications/unseen", Some(&author_token))
        .await;
    assert_eq!(unseen["new_notification_available"], false);
}

#[tokio::test]
async fn notification_pages_account_for_deleted_records() {
    let app = spawn_app().await;
    let (blog, _, author_token) = blog_with_author(&app).await;
    let (_, reader_token) = app.account("reader").await;

    for i in 0..12 {
        app.comment_id(&reader_token, blog.id, json!({ "comment": format!("c{}", i) }))
            .await;
    }

    let (_, first) = app.get_json("/api/notifications", Some(&author_token)).await;
    assert_eq!(first.as_array().unwrap().len(), 10);

    let (_, second) = app
        .get_json("/api/notifications?page=2", Some(&author_token))
        .await;
    assert_eq!(second.as_array().unwrap().len(), 2);

    let (_, shifted) = app
        .get_json(
            "/api/notifications?page=2&deleted_doc_count=3",
            Some(&author_token),
        )
        .await;
    assert_eq!(shifted.as_array().unwrap().len(), 5);

    let (status, _) = app
        .get_json("/api/notifications?filter=bogus", Some(&author_token))
        .await;
    assert_eq!(status, 400);
    let (status, _) = app
        .get_json("/api/notifications/count?filter=bogus", Some(&author_token))
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn reading_a_blog_counts_for_blog_and_author() {
    let app = spawn_app().await;
    let (blog, author, _) = blog_with_author(&app).await;

    for _ in 0..2 {
        let (status, body) = app
            .get_json(&format!("/api/blogs/{}", blog.id), None)
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["title"], "First post");
    }

    assert_eq!(app.blog(blog.id).await["total_reads"], 2);
    let account = app
        .store
        .find_account(author.id)
        .await
        .unwrap()
        .expect("author exists");
    assert_eq!(account.total_reads, 2);

    let (status, _) = app.get_json("/api/blogs/9999", None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn drafts_are_only_readable_in_edit_mode() {
    let app = spawn_app().await;
    let (author, _) = app.account("author").await;
    let draft = app.store.create_draft(author.id, "Work in progress").await;

    let (status, _) = app.get_json(&format!("/api/blogs/{}", draft.id), None).await;
    assert_eq!(status, 404);

    let body = app.blog(draft.id).await;
    assert_eq!(body["draft"], true);
    assert_eq!(body["total_reads"], 0);
}
