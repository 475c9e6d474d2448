use super::money::Money;
use super::product::ProductId;
use serde::{Deserialize, Serialize};

/// Body of `POST /enrollments/validate-coupon/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouponRequest {
    pub code: String,
    pub product_id: ProductId,
    pub amount: Money,
}

/// Successful coupon validation. Only `discount_amount` is relied upon.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CouponValidation {
    #[serde(default = "default_valid")]
    pub valid: bool,
    pub discount_amount: Money,
    #[serde(default)]
    pub final_amount: Option<Money>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_valid() -> bool {
    true
}

/// Coupon codes are matched case-insensitively by the backend; send them
/// trimmed and upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
