use crate::fixtures::test_app::TestApp;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn full_batch_rolls_over_to_the_next_one() {
    let app = TestApp::spawn().await;
    let first = app.seed_student("Alma").await;
    let second = app.seed_student("Ben").await;

    let resp = app
        .paypal_checkout(&first, "rust-101", "ORDER-A", "49.00", None)
        .await;
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["enrollment"]["batch_number"], 1);

    let resp = app
        .paypal_checkout(&second, "rust-101", "ORDER-B", "49.00", None)
        .await;
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["enrollment"]["batch_number"], 2);

    let batches: Vec<Value> = app
        .client
        .get(app.url("/api/course/rust-101/batch"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(batches[0]["enrolled"], 1);
    assert_eq!(batches[0]["is_full"], true);
    assert_eq!(batches[1]["enrolled"], 1);
    assert_eq!(batches[1]["is_full"], false);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn double_submit_takes_a_single_seat() {
    let app = TestApp::spawn().await;
    let student = app.seed_student("Abe").await;

    let (first, second) = tokio::join!(
        app.paypal_checkout(&student, "rust-101", "ORDER-TWICE", "49.00", None),
        app.paypal_checkout(&student, "rust-101", "ORDER-TWICE", "49.00", None),
    );
    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 201]);

    let enrollments = app
        .db
        .collection::<bson::Document>("enrollments")
        .count_documents(bson::doc! { "course_id": "rust-101" })
        .await
        .unwrap();
    assert_eq!(enrollments, 1);

    let batches: Vec<Value> = app
        .client
        .get(app.url("/api/course/rust-101/batch"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let taken: u64 = batches
        .iter()
        .map(|b| b["enrolled"].as_u64().unwrap())
        .sum();
    assert_eq!(taken, 1);
    assert_eq!(app.mail.sent_to(&student.email).len(), 1);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn enrolled_student_sees_class_links() {
    let app = TestApp::spawn().await;
    let student = app.seed_student("Cleo").await;
    let outsider = app.seed_student("Dirk").await;
    app.paypal_checkout(&student, "rust-101", "ORDER-C", "49.00", None)
        .await;

    let resp = app
        .auth_get("/api/enrollment/rust-101", &student.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(
        json["batch"]["class_links"]["meeting_url"],
        "https://meet.example.com/rust-1"
    );
    assert_eq!(json["enrollment"]["progress"], 0);

    let resp = app
        .auth_get("/api/enrollment/rust-101", &outsider.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    // The public course view never carries the links.
    let course: Value = app
        .client
        .get(app.url("/api/course/rust-101"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(course["batches"][0].get("class_links").is_none());
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn student_progress_is_bounded() {
    let app = TestApp::spawn().await;
    let student = app.seed_student("Edda").await;
    let outsider = app.seed_student("Fritz").await;
    app.paypal_checkout(&student, "rust-101", "ORDER-P", "49.00", None)
        .await;

    let resp = app
        .auth_put("/api/enrollment/rust-101/progress", &student.access_token)
        .json(&json!({ "progress": 60 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["progress"], 60);
    assert_eq!(json["status"], "enrolled");

    let resp = app
        .auth_put("/api/enrollment/rust-101/progress", &student.access_token)
        .json(&json!({ "progress": 150 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    let resp = app
        .auth_put("/api/enrollment/rust-101/progress", &student.access_token)
        .json(&json!({ "progress": 100 }))
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "completed");
    assert!(json["completed_at"].is_string());

    let resp = app
        .auth_put("/api/enrollment/rust-101/progress", &outsider.access_token)
        .json(&json!({ "progress": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn admin_enrolls_into_a_named_batch_and_removes_it() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let paying = app.seed_student("Gale").await;
    let invited = app.seed_student("Hugo").await;
    app.paypal_checkout(&paying, "rust-101", "ORDER-G", "49.00", None)
        .await;

    // Batch 1 is full; admins may still place someone there.
    let resp = app
        .auth_post("/api/admin/enrollment", &admin.access_token)
        .json(&json!({
            "user_email": invited.email,
            "course_id": "rust-101",
            "batch_number": 1,
            "reason": "scholarship",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["batch_number"], 1);
    assert_eq!(created["enrollment_source"], "admin_manual");
    let enrollment_id = created["id"].as_str().unwrap().to_string();

    let again = app
        .auth_post("/api/admin/enrollment", &admin.access_token)
        .json(&json!({
            "user_id": invited.id,
            "course_id": "rust-101",
            "batch_number": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);

    let list: Value = app
        .auth_get(
            "/api/admin/enrollment?course_id=rust-101&batch_number=1",
            &admin.access_token,
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 2);

    let resp = app
        .auth_delete(
            &format!("/api/admin/enrollment/{}", enrollment_id),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let batches: Vec<Value> = app
        .client
        .get(app.url("/api/course/rust-101/batch"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(batches[0]["enrolled"], 1);

    let audit = app
        .db
        .collection::<bson::Document>("audit_logs")
        .count_documents(bson::doc! { "target_id": &enrollment_id })
        .await
        .unwrap();
    assert_eq!(audit, 2);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn reviews_mark_enrolled_authors_as_verified() {
    let app = TestApp::spawn().await;
    let student = app.seed_student("Ines").await;
    let visitor = app.seed_student("Jens").await;
    app.paypal_checkout(&student, "rust-101", "ORDER-R", "49.00", None)
        .await;

    let resp = app
        .auth_post("/api/course/rust-101/review", &student.access_token)
        .json(&json!({ "rating": 5, "comment": "Great pacing" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["verified"], true);

    let resp = app
        .auth_post("/api/course/rust-101/review", &visitor.access_token)
        .json(&json!({ "rating": 3 }))
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["verified"], false);

    let resp = app
        .auth_post("/api/course/rust-101/review", &visitor.access_token)
        .json(&json!({ "rating": 6 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    let reviews: Value = app
        .client
        .get(app.url("/api/course/rust-101/review"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reviews["summary"]["count"], 2);
    assert_eq!(reviews["summary"]["average"], 4.0);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn admin_progress_overview_counts_completions() {
    let app = TestApp::spawn().await;
    let admin = app.seed_admin().await;
    let student = app.seed_student("Kai").await;
    let resp = app
        .paypal_checkout(&student, "rust-101", "ORDER-K", "49.00", None)
        .await;
    let json: Value = resp.json().await.unwrap();
    let enrollment_id = json["enrollment"]["id"].as_str().unwrap().to_string();

    let resp = app
        .auth_put(
            &format!("/api/admin/enrollment/{}/progress", enrollment_id),
            &admin.access_token,
        )
        .json(&json!({ "progress": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let overview: Value = app
        .auth_get("/api/admin/progress", &admin.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(overview["total_enrollments"], 1);
    assert_eq!(overview["completed"], 1);
}
