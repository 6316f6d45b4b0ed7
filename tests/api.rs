use std::sync::{Arc, Mutex};

use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use serde_json::{json, Value};

use tasklist::config::Config;
use tasklist::mailer::{MailError, Mailer};
use tasklist::{configure, AppState};

const SECRET: &str = "integration-secret";

/// Keeps reset links instead of mailing them.
#[derive(Default)]
struct Outbox(Mutex<Vec<String>>);

#[async_trait]
impl Mailer for Outbox {
    async fn send_password_reset(&self, _to: &str, link: &str) -> Result<(), MailError> {
        self.0.lock().unwrap().push(link.to_string());
        Ok(())
    }
}

fn test_state() -> (AppState, Arc<Outbox>) {
    let outbox = Arc::new(Outbox::default());
    (AppState::in_memory(Config::local(SECRET), outbox.clone()), outbox)
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(configure),
        )
        .await
    };
}

/// Sends the request and returns the status and the JSON body (`Null` when empty).
macro_rules! send {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        let json: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }};
}

/// Registers a user and returns a bearer token for it.
macro_rules! sign_in {
    ($app:expr, $email:expr) => {{
        let (status, _) = send!(
            $app,
            test::TestRequest::post()
                .uri("/register")
                .set_json(json!({ "name": "Tester", "email": $email, "password": "secret1" }))
        );
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send!(
            $app,
            test::TestRequest::post()
                .uri("/login")
                .set_json(json!({ "email": $email, "password": "secret1" }))
        );
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }};
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

fn task(title: &str, status: &str) -> Value {
    json!({ "title": title, "description": format!("{} details", title), "status": status })
}

#[actix_web::test]
async fn task_lifecycle_over_http() {
    let (state, _) = test_state();
    let app = app!(state);
    let token = sign_in!(app, "ada@example.com");

    let (status, created) = send!(
        app,
        test::TestRequest::post()
            .uri("/addlist")
            .insert_header(bearer(&token))
            .set_json(task("Buy Milk", "Pending"))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "List added successfully");
    let id = created["list"]["_id"].as_str().unwrap().to_string();
    assert_eq!(created["list"]["status"], "Pending");

    let (status, fetched) = send!(
        app,
        test::TestRequest::get()
            .uri(&format!("/getlist/{}", id))
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["list"]["title"], "Buy Milk");

    let (status, updated) = send!(
        app,
        test::TestRequest::put()
            .uri(&format!("/updatelist/{}", id))
            .insert_header(bearer(&token))
            .set_json(json!({ "status": "Completed" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], "List updated successfully");
    assert_eq!(updated["list"]["status"], "Completed");
    assert_eq!(updated["list"]["title"], "Buy Milk");

    let (status, page) = send!(
        app,
        test::TestRequest::get()
            .uri("/todos?searchTerm=milk&status=Completed")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["page"], 1);
    assert_eq!(page["limit"], 5);
    assert_eq!(page["totalPages"], 1);
    assert_eq!(page["lists"][0]["_id"], id.as_str());

    let (status, deleted) = send!(
        app,
        test::TestRequest::delete()
            .uri(&format!("/deletelist/{}", id))
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["message"], "List deleted successfully");

    let (status, again) = send!(
        app,
        test::TestRequest::delete()
            .uri(&format!("/deletelist/{}", id))
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(again["message"], "List not found");
}

#[actix_web::test]
async fn protected_routes_reject_missing_and_bad_tokens() {
    let (state, _) = test_state();
    let app = app!(state);

    let (status, body) = send!(app, test::TestRequest::get().uri("/todos"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");
    assert_eq!(body["message"], "No token provided");

    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri("/addlist")
            .insert_header(("Authorization", "Bearer not.a.token"))
            .set_json(task("x", "Pending"))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credential");

    let (status, _) = send!(app, test::TestRequest::get().uri("/profile"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn token_for_unknown_user_is_rejected() {
    let (state, _) = test_state();
    let app = app!(state);
    let ghost = tasklist::auth::create_jwt(
        &mongodb::bson::oid::ObjectId::new(),
        tasklist::auth::TokenPurpose::Access,
        5,
        SECRET,
    )
    .unwrap();

    let (status, body) = send!(
        app,
        test::TestRequest::get().uri("/todos").insert_header(bearer(&ghost))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized");
}

#[actix_web::test]
async fn tasks_are_invisible_across_users() {
    let (state, _) = test_state();
    let app = app!(state);
    let alice = sign_in!(app, "alice@example.com");
    let bob = sign_in!(app, "bob@example.com");

    let (_, created) = send!(
        app,
        test::TestRequest::post()
            .uri("/addlist")
            .insert_header(bearer(&alice))
            .set_json(task("private", "Pending"))
    );
    let id = created["list"]["_id"].as_str().unwrap().to_string();

    let (status, _) = send!(
        app,
        test::TestRequest::get()
            .uri(&format!("/getlist/{}", id))
            .insert_header(bearer(&bob))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send!(
        app,
        test::TestRequest::put()
            .uri(&format!("/updatelist/{}", id))
            .insert_header(bearer(&bob))
            .set_json(json!({ "title": "mine now" }))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send!(
        app,
        test::TestRequest::delete()
            .uri(&format!("/deletelist/{}", id))
            .insert_header(bearer(&bob))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, page) = send!(
        app,
        test::TestRequest::get().uri("/todos").insert_header(bearer(&bob))
    );
    assert_eq!(page["total"], 0);
    assert_eq!(page["totalPages"], 0);

    let (_, page) = send!(
        app,
        test::TestRequest::get().uri("/todos").insert_header(bearer(&alice))
    );
    assert_eq!(page["total"], 1);
    assert_eq!(page["lists"][0]["title"], "private");
}

#[actix_web::test]
async fn invalid_input_is_400_with_every_field() {
    let (state, _) = test_state();
    let app = app!(state);
    let token = sign_in!(app, "ada@example.com");

    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri("/addlist")
            .insert_header(bearer(&token))
            .set_json(json!({ "status": "Done" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["title", "description", "status"]);

    let (status, body) = send!(
        app,
        test::TestRequest::delete()
            .uri("/deletelist/12345")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["message"], "Invalid task ID format");

    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri("/addlist")
            .insert_header(bearer(&token))
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[actix_web::test]
async fn pagination_over_http() {
    let (state, _) = test_state();
    let app = app!(state);
    let token = sign_in!(app, "ada@example.com");

    for i in 0..13 {
        let (status, _) = send!(
            app,
            test::TestRequest::post()
                .uri("/addlist")
                .insert_header(bearer(&token))
                .set_json(task(&format!("task {:02}", i), "Pending"))
        );
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, page) = send!(
        app,
        test::TestRequest::get()
            .uri("/todos?page=3&limit=5&sortBy=title&sortOrder=asc")
            .insert_header(bearer(&token))
    );
    assert_eq!(page["total"], 13);
    assert_eq!(page["totalPages"], 3);
    let titles: Vec<&str> = page["lists"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["task 10", "task 11", "task 12"]);

    let (_, page) = send!(
        app,
        test::TestRequest::get()
            .uri("/todos?page=abc&limit=-3")
            .insert_header(bearer(&token))
    );
    assert_eq!(page["page"], 1);
    assert_eq!(page["limit"], 5);
    assert_eq!(page["lists"].as_array().unwrap().len(), 5);
}

#[actix_web::test]
async fn password_reset_over_http() {
    let (state, outbox) = test_state();
    let app = app!(state);
    sign_in!(app, "ada@example.com");

    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri("/forgotpassword")
            .set_json(json!({ "email": "nobody@example.com" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User not found");

    let (status, _) = send!(
        app,
        test::TestRequest::post()
            .uri("/forgotpassword")
            .set_json(json!({ "email": "ada@example.com" }))
    );
    assert_eq!(status, StatusCode::OK);
    let link = outbox.0.lock().unwrap().pop().unwrap();
    let reset_token = link.rsplit('/').next().unwrap().to_string();

    // Not usable as a session.
    let (status, _) = send!(
        app,
        test::TestRequest::get().uri("/todos").insert_header(bearer(&reset_token))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send!(
        app,
        test::TestRequest::put()
            .uri("/resetpassword")
            .set_json(json!({ "token": reset_token, "password": "brandnew" }))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "email": "ada@example.com", "password": "secret1" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "email": "ada@example.com", "password": "brandnew" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Tester");
}

#[actix_web::test]
async fn profile_and_password_change() {
    let (state, _) = test_state();
    let app = app!(state);
    let token = sign_in!(app, "ada@example.com");

    let (status, body) = send!(
        app,
        test::TestRequest::get().uri("/profile").insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("password").is_none());

    let (status, body) = send!(
        app,
        test::TestRequest::put()
            .uri("/profile")
            .insert_header(bearer(&token))
            .set_json(json!({ "age": 30, "dateOfBirth": "1995-04-01", "profileImage": "avatars/ada.png" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["age"], 30);
    assert_eq!(body["user"]["dateOfBirth"], "1995-04-01");

    let (status, body) = send!(
        app,
        test::TestRequest::put()
            .uri("/changepassword")
            .insert_header(bearer(&token))
            .set_json(json!({ "oldPassword": "wrong-one", "newPassword": "secret2" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Incorrect old password");

    let (status, _) = send!(
        app,
        test::TestRequest::put()
            .uri("/changepassword")
            .insert_header(bearer(&token))
            .set_json(json!({ "oldPassword": "secret1", "newPassword": "secret2" }))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send!(
        app,
        test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "email": "ada@example.com", "password": "secret2" }))
    );
    assert_eq!(status, StatusCode::OK);
}
