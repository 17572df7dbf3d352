pub mod audit_log;
pub mod batch_seats;
pub mod coupon;
pub mod course;
pub mod email_outbox;
pub mod enrollment;
pub mod manual_payment;
pub mod payment;
pub mod review;
pub mod user;

pub use audit_log::*;
pub use batch_seats::*;
pub use coupon::*;
pub use course::*;
pub use email_outbox::*;
pub use enrollment::*;
pub use manual_payment::*;
pub use payment::*;
pub use review::*;
pub use user::*;
