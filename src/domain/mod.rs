//! Entities and value objects owned by the enrollment backend, plus the
//! ports through which the rest of the crate reaches it.

pub mod admin;
pub mod age_gate;
pub mod coupon;
pub mod enrollment;
pub mod money;
pub mod payment;
pub mod ports;
pub mod product;
pub mod user;
