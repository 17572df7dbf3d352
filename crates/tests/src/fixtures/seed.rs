use serde_json::{Value, json};

use super::test_app::{ADMIN_EMAIL, TestApp};

pub struct SeededUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub access_token: String,
}

impl TestApp {
    /// Register a user and return their auth info.
    pub async fn register_user(&self, email: &str, display_name: &str, password: &str) -> SeededUser {
        let resp = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "email": email,
                "display_name": display_name,
                "password": password,
            }))
            .send()
            .await
            .expect("Register request failed");

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        assert_eq!(status, 201, "Register failed: {}", body);

        let json: Value = serde_json::from_str(&body).expect("Failed to parse register response");
        SeededUser {
            id: json["user"]["id"].as_str().unwrap().to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            access_token: json["access_token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn seed_student(&self, name: &str) -> SeededUser {
        self.register_user(
            &format!("{}@students.test", name.to_lowercase()),
            name,
            "Student123!",
        )
        .await
    }

    pub async fn seed_admin(&self) -> SeededUser {
        self.register_user(ADMIN_EMAIL, "Course Admin", "Admin123!").await
    }

    /// Create an authenticated request with the given token.
    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    /// Create a coupon as admin and return its hex id.
    pub async fn create_coupon(&self, admin: &SeededUser, body: Value) -> String {
        let resp = self
            .auth_post("/api/admin/coupon", &admin.access_token)
            .json(&body)
            .send()
            .await
            .expect("Create coupon failed");
        let status = resp.status().as_u16();
        let json: Value = resp.json().await.unwrap();
        assert_eq!(status, 201, "Create coupon failed: {}", json);
        json["_id"]["$oid"].as_str().unwrap().to_string()
    }

    /// Client-confirmed PayPal checkout. Order verification is off in tests,
    /// so the confirmation is trusted after the amount check.
    pub async fn paypal_checkout(
        &self,
        user: &SeededUser,
        course_id: &str,
        order_id: &str,
        amount: &str,
        coupon_code: Option<&str>,
    ) -> reqwest::Response {
        self.auth_post("/api/checkout/paypal", &user.access_token)
            .json(&json!({
                "course_id": course_id,
                "coupon_code": coupon_code,
                "order_id": order_id,
                "payment_id": format!("CAP-{}", order_id),
                "payer_email": user.email,
                "payer_name": user.display_name,
                "amount": amount,
                "currency": "USD",
            }))
            .send()
            .await
            .expect("Checkout request failed")
    }
}
