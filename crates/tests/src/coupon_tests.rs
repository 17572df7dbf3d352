use crate::fixtures::test_app::TestApp;
use bson::oid::ObjectId;
use coursehub_services::coupon::{CouponError, OrderContext};
use serde_json::{Value, json};

async fn validate(app: &TestApp, token: &str, code: &str, course_id: &str) -> reqwest::Response {
    app.auth_post("/api/coupon/validate", token)
        .json(&json!({ "code": code, "course_id": course_id }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn validate_prices_without_redeeming() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Hana").await;
    let coupon_id = app
        .create_coupon(
            &admin,
            json!({
                "code": "FLAT15",
                "discount_type": "fixed",
                "discount_value": 1500,
            }),
        )
        .await;

    let resp = validate(&app, &student.access_token, "flat15", "rust-101").await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["original_cents"], 4900);
    assert_eq!(json["discount_cents"], 1500);
    assert_eq!(json["final_cents"], 3400);

    let coupon: Value = app
        .auth_get(&format!("/api/admin/coupon/{}", coupon_id), &admin.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(coupon["usage_count"], 0);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn single_use_coupon_is_redeemed_once() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let first = app.seed_student("Ivan").await;
    let second = app.seed_student("Jo").await;
    app.create_coupon(
        &admin,
        json!({
            "code": "ONCE",
            "discount_type": "percentage",
            "discount_value": 100,
            "usage_limit": 1,
        }),
    )
    .await;

    let resp = app
        .auth_post("/api/checkout/free", &first.access_token)
        .json(&json!({ "course_id": "rust-101", "coupon_code": "ONCE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let resp = app
        .auth_post("/api/checkout/free", &second.access_token)
        .json(&json!({ "course_id": "rust-101", "coupon_code": "ONCE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "coupon_rejected");
    assert_eq!(json["reason"], "usage_limit_reached");
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn per_user_limit_holds_against_a_stale_validation() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Jade").await;
    let other = app.seed_student("Karl").await;
    let coupon_id = app
        .create_coupon(
            &admin,
            json!({
                "code": "ONCEEACH",
                "discount_type": "percentage",
                "discount_value": 10,
                "usage_limit_per_user": 1,
            }),
        )
        .await;

    let user_id = ObjectId::parse_str(&student.id).unwrap();
    let order = OrderContext {
        user_id: &user_id,
        user_email: &student.email,
        course_id: "rust-101",
        amount_cents: 4900,
    };
    let (coupon, breakdown) = app.state.coupons.validate("ONCEEACH", &order).await.unwrap();

    // Both redemptions come from the same validated snapshot.
    app.state
        .coupons
        .record_usage(&coupon, &order, &breakdown, Some("ORDER-1"))
        .await
        .unwrap();
    let second = app
        .state
        .coupons
        .record_usage(&coupon, &order, &breakdown, Some("ORDER-2"))
        .await;
    assert!(matches!(second, Err(CouponError::RedemptionConflict)));

    let resp = validate(&app, &student.access_token, "ONCEEACH", "async-201").await;
    assert_eq!(resp.status().as_u16(), 422);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["reason"], "per_user_limit_reached");

    let ok = validate(&app, &other.access_token, "ONCEEACH", "rust-101").await;
    assert_eq!(ok.status().as_u16(), 200);

    let stored: Value = app
        .auth_get(&format!("/api/admin/coupon/{}", coupon_id), &admin.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["usage_count"], 1);
    assert_eq!(stored["usage_history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn course_specific_coupon_only_applies_to_its_course() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Kim").await;
    app.create_coupon(
        &admin,
        json!({
            "code": "ASYNC10",
            "discount_type": "percentage",
            "discount_value": 10,
            "target_type": "course_specific",
            "target_course_ids": ["async-201"],
        }),
    )
    .await;

    let ok = validate(&app, &student.access_token, "ASYNC10", "async-201").await;
    assert_eq!(ok.status().as_u16(), 200);

    let resp = validate(&app, &student.access_token, "ASYNC10", "rust-101").await;
    assert_eq!(resp.status().as_u16(), 422);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["reason"], "not_for_course");
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn user_specific_coupon_rejects_other_accounts() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let invited = app.seed_student("Lea").await;
    let other = app.seed_student("Max").await;
    app.create_coupon(
        &admin,
        json!({
            "code": "LEAONLY",
            "discount_type": "fixed",
            "discount_value": 500,
            "target_type": "user_specific",
            "target_user_emails": [invited.email],
        }),
    )
    .await;

    let ok = validate(&app, &invited.access_token, "LEAONLY", "rust-101").await;
    assert_eq!(ok.status().as_u16(), 200);

    let resp = validate(&app, &other.access_token, "LEAONLY", "rust-101").await;
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["reason"], "not_for_user");
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn admin_coupon_lifecycle() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Ned").await;
    let coupon_id = app
        .create_coupon(
            &admin,
            json!({
                "code": "SPRING",
                "discount_type": "percentage",
                "discount_value": 25,
            }),
        )
        .await;

    // Same code again
    let resp = app
        .auth_post("/api/admin/coupon", &admin.access_token)
        .json(&json!({
            "code": "spring",
            "discount_type": "fixed",
            "discount_value": 100,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    let resp = app
        .auth_post(
            &format!("/api/admin/coupon/{}/deactivate", coupon_id),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "inactive");

    let resp = validate(&app, &student.access_token, "SPRING", "rust-101").await;
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["reason"], "inactive");

    let resp = app
        .auth_post(
            &format!("/api/admin/coupon/{}/activate", coupon_id),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .auth_post(&format!("/api/admin/coupon/{}/email", coupon_id), &admin.access_token)
        .json(&json!({ "to_email": "friend@example.com", "to_name": "Friend" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "sent");
    let mail = app.mail.sent_to("friend@example.com");
    assert_eq!(mail.len(), 1);
    assert!(mail[0].text.contains("SPRING"));

    let list: Value = app
        .auth_get("/api/admin/coupon?status=active", &admin.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 1);

    let resp = app
        .auth_delete(&format!("/api/admin/coupon/{}", coupon_id), &admin.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["outcome"], "deleted");
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn used_coupon_is_deactivated_instead_of_deleted() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Olga").await;
    let coupon_id = app
        .create_coupon(
            &admin,
            json!({
                "code": "GIFT",
                "discount_type": "percentage",
                "discount_value": 100,
            }),
        )
        .await;

    let resp = app
        .auth_post("/api/checkout/free", &student.access_token)
        .json(&json!({ "course_id": "rust-101", "coupon_code": "GIFT" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let resp = app
        .auth_delete(&format!("/api/admin/coupon/{}", coupon_id), &admin.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["outcome"], "deactivated");
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn coupon_for_unknown_course_is_invalid() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;

    let resp = app
        .auth_post("/api/admin/coupon", &admin.access_token)
        .json(&json!({
            "code": "GHOST",
            "discount_type": "percentage",
            "discount_value": 10,
            "target_type": "course_specific",
            "target_course_ids": ["no-such-course"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}
