pub mod audit;
pub mod base;
pub mod coupon;
pub mod email_outbox;
pub mod enrollment;
pub mod manual_payment;
pub mod payment;
pub mod review;
pub mod seats;
pub mod user;

pub use base::BaseDao;
