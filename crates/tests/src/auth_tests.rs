use crate::fixtures::test_app::{ADMIN_EMAIL, TestApp};
use serde_json::Value;

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn register_creates_student_and_returns_tokens() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "email": "Alice@Test.com",
            "display_name": "Alice",
            "password": "Password123!",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert_eq!(json["user"]["email"], "alice@test.com");
    assert_eq!(json["user"]["role"], "student");
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn configured_admin_email_gets_admin_role() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;

    let resp = app
        .auth_get("/api/auth/me", &admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["email"], ADMIN_EMAIL);
    assert_eq!(json["role"], "admin");
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn register_duplicate_email_fails() {
    let app = TestApp::spawn().await;
    app.register_user("dup@test.com", "First", "Password123!").await;

    let resp = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "email": "dup@test.com",
            "display_name": "Second",
            "password": "Password123!",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn login_with_wrong_password_is_rejected() {
    let app = TestApp::spawn().await;
    app.register_user("carol@test.com", "Carol", "Password123!").await;

    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({
            "email": "carol@test.com",
            "password": "not-the-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn refresh_issues_new_access_token() {
    let app = TestApp::spawn().await;
    app.register_user("dave@test.com", "Dave", "Password123!").await;

    let login: Value = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({
            "email": "dave@test.com",
            "password": "Password123!",
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let resp = app
        .client
        .post(app.url("/api/auth/refresh"))
        .json(&serde_json::json!({ "refresh_token": login["refresh_token"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert!(json["access_token"].is_string());
}
