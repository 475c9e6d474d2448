use super::money::Money;
use super::payment::PaymentMethod;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub type ProductId = u64;
pub type BatchId = u64;

/// A pricing and availability window for a product (e.g. an early-bird lot).
///
/// Each payment method carries its own price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub name: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    /// PIX cash price.
    pub price: Money,
    pub pix_installment_price: Money,
    pub credit_card_price: Money,
    #[serde(default)]
    pub max_enrollments: Option<u32>,
    #[serde(default)]
    pub current_enrollments: Option<u32>,
    #[serde(default)]
    pub is_full: bool,
    #[serde(default)]
    pub status: Option<String>,
}

impl Batch {
    pub fn price_for(&self, method: PaymentMethod) -> Money {
        match method {
            PaymentMethod::PixCash => self.price,
            PaymentMethod::PixInstallment => self.pix_installment_price,
            PaymentMethod::CreditCard => self.credit_card_price,
        }
    }

    /// Seats left, when the backend reports capacity counters.
    pub fn remaining(&self) -> Option<u32> {
        match (self.max_enrollments, self.current_enrollments) {
            (Some(max), Some(current)) => Some(max.saturating_sub(current)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub base_price: Option<Money>,
    #[serde(default)]
    pub max_installments: Option<u8>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub active_batch: Option<Batch>,
}

fn default_active() -> bool {
    true
}

impl Product {
    /// Time left until the event starts, or `None` once it has started or
    /// when no parseable event date is known.
    pub fn time_until_event(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        let starts_at = parse_event_date(self.event_date.as_deref()?)?;
        let remaining = starts_at - now;
        (remaining > TimeDelta::zero()).then_some(remaining)
    }
}

fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Renders a countdown as `12d 03h 04m`.
pub fn format_countdown(remaining: TimeDelta) -> String {
    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;
    format!("{days}d {hours:02}h {minutes:02}m")
}

/// New or changed product fields for the admin product endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_installments: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_date: Option<String>,
}

/// New or changed batch fields for the admin batch endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_installment_price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card_price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_enrollments: Option<u32>,
}
