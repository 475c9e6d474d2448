use super::enrollment::EnrollmentStatus;
use super::money::Money;
use super::payment::PaymentMethod;
use super::product::ProductId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnrollmentCounts {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub recent: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentCounts {
    pub total: u64,
    pub confirmed: u64,
    pub pending: u64,
    pub recent: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Revenue {
    pub total: Money,
    pub pending: Money,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodCount {
    pub payment_method: Option<PaymentMethod>,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DashboardStats {
    pub enrollments: EnrollmentCounts,
    pub payments: PaymentCounts,
    pub revenue: Revenue,
    #[serde(default)]
    pub payment_methods: Vec<MethodCount>,
}

/// Query for the admin enrollment listing. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrollmentFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EnrollmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
}

impl EnrollmentFilter {
    /// Query pairs in the form the listing endpoint expects.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(product) = self.product {
            pairs.push(("product", product.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search", search.trim().to_string()));
        }
        if let Some(method) = self.payment_method {
            pairs.push(("payment_method", method.as_str().to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub status: EnrollmentStatus,
}
