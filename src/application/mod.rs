//! Application layer: the flows a user walks through.
//!
//! Each type here holds the state of one screen of the enrollment site
//! (payment, enrollment form, coupon entry, account, admin) and talks to the
//! backend only through the ports in [`crate::domain::ports`].

pub mod account;
pub mod admin;
pub mod coupon;
pub mod enrollment_form;
pub mod payment_flow;
