use crate::fixtures::test_app::TestApp;
use bson::doc;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn paypal_checkout_enrolls_and_sends_confirmation() {
    let app = TestApp::spawn().await;
    let student = app.seed_student("Alice").await;

    let resp = app
        .paypal_checkout(&student, "rust-101", "ORDER-1", "49.00", None)
        .await;
    assert_eq!(resp.status().as_u16(), 201);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["created"], true);
    assert_eq!(json["enrollment"]["course_id"], "rust-101");
    assert_eq!(json["enrollment"]["batch_number"], 1);
    assert_eq!(json["enrollment"]["enrollment_source"], "web_purchase");
    assert_eq!(json["payment"]["amount_cents"], 4900);
    assert_eq!(json["payment"]["method"], "paypal");
    assert_eq!(json["email"]["status"], "sent");

    let mail = app.mail.sent_to(&student.email);
    assert_eq!(mail.len(), 1);
    assert!(mail[0].subject.contains("Rust from Scratch"));
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn replayed_order_does_not_duplicate_anything() {
    let app = TestApp::spawn().await;
    let student = app.seed_student("Bob").await;

    let first = app
        .paypal_checkout(&student, "rust-101", "ORDER-REPLAY", "49.00", None)
        .await;
    assert_eq!(first.status().as_u16(), 201);

    let second = app
        .paypal_checkout(&student, "rust-101", "ORDER-REPLAY", "49.00", None)
        .await;
    assert_eq!(second.status().as_u16(), 200);
    let json: Value = second.json().await.unwrap();
    assert_eq!(json["created"], false);

    let payments = app
        .db
        .collection::<bson::Document>("payments")
        .count_documents(doc! { "order_id": "ORDER-REPLAY" })
        .await
        .unwrap();
    assert_eq!(payments, 1);

    let enrollments = app
        .db
        .collection::<bson::Document>("enrollments")
        .count_documents(doc! { "course_id": "rust-101" })
        .await
        .unwrap();
    assert_eq!(enrollments, 1);
    assert_eq!(app.mail.sent_to(&student.email).len(), 1);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn captured_order_only_pays_for_its_own_purchase() {
    let app = TestApp::spawn().await;
    let buyer = app.seed_student("Hedy").await;
    let other = app.seed_student("Ivo").await;

    let resp = app
        .paypal_checkout(&buyer, "rust-101", "ORDER-A", "49.00", None)
        .await;
    assert_eq!(resp.status().as_u16(), 201);

    // Same order id, different course.
    let resp = app
        .paypal_checkout(&buyer, "async-201", "ORDER-A", "49.00", None)
        .await;
    assert_eq!(resp.status().as_u16(), 409);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "conflict");

    // Same order id, different buyer.
    let resp = app
        .paypal_checkout(&other, "rust-101", "ORDER-A", "49.00", None)
        .await;
    assert_eq!(resp.status().as_u16(), 409);

    let enrollments = app
        .db
        .collection::<bson::Document>("enrollments")
        .count_documents(doc! {})
        .await
        .unwrap();
    assert_eq!(enrollments, 1);

    let theirs: Vec<Value> = app
        .auth_get("/api/enrollment", &other.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(theirs.is_empty());
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn wrong_amount_is_refused_without_enrolling() {
    let app = TestApp::spawn().await;
    let student = app.seed_student("Carol").await;

    let resp = app
        .paypal_checkout(&student, "rust-101", "ORDER-CHEAP", "10.00", None)
        .await;
    assert_eq!(resp.status().as_u16(), 402);

    let mine: Vec<Value> = app
        .auth_get("/api/enrollment", &student.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(mine.is_empty());
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn coupon_discount_is_charged_and_redeemed() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Dana").await;
    let coupon_id = app
        .create_coupon(
            &admin,
            json!({
                "code": "save20",
                "discount_type": "percentage",
                "discount_value": 20,
            }),
        )
        .await;

    let resp = app
        .paypal_checkout(&student, "rust-101", "ORDER-SAVE", "39.20", Some("SAVE20"))
        .await;
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["discount"]["final_cents"], 3920);
    assert_eq!(json["payment"]["coupon_code"], "SAVE20");
    assert!(json["warnings"].as_array().unwrap().is_empty());

    let coupon: Value = app
        .auth_get(&format!("/api/admin/coupon/{}", coupon_id), &admin.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(coupon["usage_count"], 1);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn full_discount_goes_through_free_checkout() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Eve").await;
    app.create_coupon(
        &admin,
        json!({
            "code": "FREE100",
            "discount_type": "percentage",
            "discount_value": 100,
        }),
    )
    .await;

    // PayPal has nothing to capture for a zero total.
    let resp = app
        .paypal_checkout(&student, "rust-101", "ORDER-ZERO", "0.00", Some("FREE100"))
        .await;
    assert_eq!(resp.status().as_u16(), 400);

    let resp = app
        .auth_post("/api/checkout/free", &student.access_token)
        .json(&json!({ "course_id": "rust-101", "coupon_code": "FREE100" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["payment"]["amount_cents"], 0);
    assert_eq!(json["payment"]["method"], "free_coupon");
    assert_eq!(json["enrollment"]["enrollment_source"], "free_coupon");

    // Enrolled users cannot burn another redemption.
    let again = app
        .auth_post("/api/checkout/free", &student.access_token)
        .json(&json!({ "course_id": "rust-101", "coupon_code": "FREE100" }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn partial_discount_is_not_free() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Finn").await;
    app.create_coupon(
        &admin,
        json!({
            "code": "TENOFF",
            "discount_type": "fixed",
            "discount_value": 1000,
        }),
    )
    .await;

    let resp = app
        .auth_post("/api/checkout/free", &student.access_token)
        .json(&json!({ "course_id": "rust-101", "coupon_code": "TENOFF" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn failed_email_is_queued_and_retried() {
    let app = TestApp::spawn().await;
    let student = app.seed_student("Gus").await;
    app.mail.set_failing(true);

    let resp = app
        .paypal_checkout(&student, "rust-101", "ORDER-MAIL", "49.00", None)
        .await;
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["email"]["status"], "queued");
    assert_eq!(json["warnings"].as_array().unwrap().len(), 1);

    app.mail.set_failing(false);
    assert_eq!(app.state.notifier.retry_due().await, 1);
    assert_eq!(app.mail.sent_to(&student.email).len(), 1);
    assert_eq!(app.state.notifier.retry_due().await, 0);
}
