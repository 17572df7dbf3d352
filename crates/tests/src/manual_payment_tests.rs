use crate::fixtures::{seed::SeededUser, test_app::TestApp};
use bson::doc;
use serde_json::{Value, json};

async fn submit(app: &TestApp, student: &SeededUser, reference: &str) -> String {
    let resp = app
        .auth_post("/api/manual-payment", &student.access_token)
        .json(&json!({
            "course_id": "async-201",
            "amount_cents": 9900,
            "method": "bank_transfer",
            "reference": reference,
            "note": "Paid from my business account",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "pending_manual_verification");
    json["_id"]["$oid"].as_str().unwrap().to_string()
}

async fn count(app: &TestApp, collection: &str) -> u64 {
    app.db
        .collection::<bson::Document>(collection)
        .count_documents(doc! {})
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn verify_enrolls_records_payment_and_emails() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Lina").await;
    let id = submit(&app, &student, "TRX-1001").await;

    let resp = app
        .auth_post(
            &format!("/api/admin/manual-payment/{}/verify", id),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["manual_payment"]["status"], "verified_and_enrolled");
    assert_eq!(json["enrollment"]["course_id"], "async-201");
    assert_eq!(
        json["enrollment"]["enrollment_source"],
        "admin_manual"
    );
    assert_eq!(json["email"]["status"], "sent");

    let payment = app
        .db
        .collection::<bson::Document>("payments")
        .find_one(doc! { "order_id": format!("manual-{}", id) })
        .await
        .unwrap()
        .expect("manual payment not recorded");
    assert_eq!(payment.get_str("method").unwrap(), "manual");
    assert_eq!(app.mail.sent_to(&student.email).len(), 1);

    // Verifying twice is an invalid transition.
    let resp = app
        .auth_post(
            &format!("/api/admin/manual-payment/{}/verify", id),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    assert_eq!(count(&app, "enrollments").await, 1);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn rejecting_a_duplicate_claim_creates_nothing() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Mira").await;
    let id = submit(&app, &student, "TRX-2002").await;

    let resp = app
        .auth_post(
            &format!("/api/admin/manual-payment/{}/reject", id),
            &admin.access_token,
        )
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    let resp = app
        .auth_post(
            &format!("/api/admin/manual-payment/{}/reject", id),
            &admin.access_token,
        )
        .json(&json!({ "reason": "duplicate" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "rejected");
    assert_eq!(json["rejection_reason"], "duplicate");

    assert_eq!(count(&app, "enrollments").await, 0);
    assert_eq!(count(&app, "payments").await, 0);
    assert!(app.mail.sent_to(&student.email).is_empty());
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn restored_claim_can_be_verified() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Nils").await;
    let id = submit(&app, &student, "TRX-3003").await;

    let resp = app
        .auth_post(
            &format!("/api/admin/manual-payment/{}/archive", id),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .auth_post(
            &format!("/api/admin/manual-payment/{}/restore", id),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "pending_manual_verification");
    assert!(json["rejection_reason"].is_null());
    assert_eq!(json["history"].as_array().unwrap().len(), 2);

    let resp = app
        .auth_post(
            &format!("/api/admin/manual-payment/{}/verify", id),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    // A verified claim is final.
    let resp = app
        .auth_post(
            &format!("/api/admin/manual-payment/{}/archive", id),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn claims_are_listed_per_student_and_by_status() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Olli").await;
    let other = app.seed_student("Pia").await;
    submit(&app, &student, "TRX-4004").await;
    let rejected = submit(&app, &other, "TRX-4005").await;

    app.auth_post(
        &format!("/api/admin/manual-payment/{}/reject", rejected),
        &admin.access_token,
    )
    .json(&json!({ "reason": "no matching transfer" }))
    .send()
    .await
    .unwrap();

    let mine: Vec<Value> = app
        .auth_get("/api/manual-payment", &student.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["reference"], "TRX-4004");

    let pending: Value = app
        .auth_get(
            "/api/admin/manual-payment?status=pending_manual_verification",
            &admin.access_token,
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pending["total"], 1);

    let resp = app
        .auth_get("/api/admin/manual-payment", &student.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn verify_refuses_a_student_enrolled_another_way() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Rune").await;
    let id = submit(&app, &student, "TRX-5005").await;

    // The student pays online before the transfer is checked.
    let resp = app
        .paypal_checkout(&student, "async-201", "ORDER-BOTH", "99.00", None)
        .await;
    assert_eq!(resp.status().as_u16(), 201);

    let resp = app
        .auth_post(
            &format!("/api/admin/manual-payment/{}/verify", id),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    assert_eq!(count(&app, "payments").await, 1);
    assert_eq!(count(&app, "enrollments").await, 1);
    assert_eq!(app.mail.sent_to(&student.email).len(), 1);

    let resp = app
        .auth_post(
            &format!("/api/admin/manual-payment/{}/reject", id),
            &admin.access_token,
        )
        .json(&json!({ "reason": "paid through PayPal" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}
