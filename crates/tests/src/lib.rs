pub mod fixtures;

#[cfg(test)]
mod auth_tests;
#[cfg(test)]
mod checkout_tests;
#[cfg(test)]
mod coupon_tests;
#[cfg(test)]
mod enrollment_tests;
#[cfg(test)]
mod manual_payment_tests;
