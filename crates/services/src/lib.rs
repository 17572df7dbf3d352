pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod coupon;
pub mod dao;
pub mod email;
pub mod enrollment;
pub mod payment;
pub mod paypal;
pub mod reconcile;
pub mod review;

pub use auth::AuthService;
pub use catalog::Catalog;
pub use checkout::CheckoutService;
pub use coupon::CouponService;
pub use dao::*;
pub use email::NotificationDispatcher;
pub use enrollment::EnrollmentService;
pub use payment::PaymentService;
pub use paypal::PayPalService;
pub use reconcile::ManualPaymentService;
pub use review::ReviewService;
