use coursehub_config::Settings;
use coursehub_services::{
    AuthService, Catalog, CheckoutService, CouponService, EnrollmentService,
    ManualPaymentService, NotificationDispatcher, PayPalService, PaymentService, ReviewService,
    dao::{audit::AuditDao, user::UserDao},
    email::{EmailJsTransport, EmailTransport},
};
use mongodb::Database;
use std::sync::Arc;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub catalog: Arc<Catalog>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserDao>,
    pub audit: Arc<AuditDao>,
    pub coupons: Arc<CouponService>,
    pub enrollments: Arc<EnrollmentService>,
    pub payments: Arc<PaymentService>,
    pub paypal: Arc<PayPalService>,
    pub notifier: Arc<NotificationDispatcher>,
    pub checkout: Arc<CheckoutService>,
    pub manual_payments: Arc<ManualPaymentService>,
    pub reviews: Arc<ReviewService>,
}

impl AppState {
    pub fn new(db: Database, settings: Settings, catalog: Catalog) -> Self {
        let transport: Arc<dyn EmailTransport> = Arc::new(EmailJsTransport::new(&settings.email));
        Self::with_transport(db, settings, catalog, transport)
    }

    /// Same as `new` with a caller-supplied email transport.
    pub fn with_transport(
        db: Database,
        settings: Settings,
        catalog: Catalog,
        transport: Arc<dyn EmailTransport>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let dashboard_url = format!("{}/my-courses", settings.app.public_url.trim_end_matches('/'));

        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let users = Arc::new(UserDao::new(&db));
        let audit = Arc::new(AuditDao::new(&db));
        let coupons = Arc::new(CouponService::new(&db));
        let enrollments = Arc::new(EnrollmentService::new(&db));
        let payments = Arc::new(PaymentService::new(&db));
        let paypal = Arc::new(PayPalService::new(&settings.paypal));
        let notifier = Arc::new(NotificationDispatcher::new(
            &db,
            transport,
            settings.email.max_attempts,
        ));
        let checkout = Arc::new(CheckoutService::new(
            Arc::clone(&catalog),
            Arc::clone(&coupons),
            Arc::clone(&enrollments),
            Arc::clone(&payments),
            Arc::clone(&paypal),
            Arc::clone(&notifier),
            dashboard_url.clone(),
        ));
        let manual_payments = Arc::new(ManualPaymentService::new(
            &db,
            Arc::clone(&catalog),
            Arc::clone(&enrollments),
            Arc::clone(&payments),
            Arc::clone(&notifier),
            dashboard_url,
        ));
        let reviews = Arc::new(ReviewService::new(
            &db,
            Arc::clone(&catalog),
            Arc::clone(&enrollments),
        ));

        Self {
            db,
            settings,
            catalog,
            auth,
            users,
            audit,
            coupons,
            enrollments,
            payments,
            paypal,
            notifier,
            checkout,
            manual_payments,
            reviews,
        }
    }

    pub fn require_coupons(&self) -> Result<(), ApiError> {
        if self.settings.features.coupons {
            Ok(())
        } else {
            Err(ApiError::FeatureDisabled("coupons"))
        }
    }

    pub fn require_paypal(&self) -> Result<(), ApiError> {
        if self.settings.features.paypal {
            Ok(())
        } else {
            Err(ApiError::FeatureDisabled("paypal"))
        }
    }

    pub fn require_progress(&self) -> Result<(), ApiError> {
        if self.settings.features.progress_tracking {
            Ok(())
        } else {
            Err(ApiError::FeatureDisabled("progress_tracking"))
        }
    }
}
