use super::admin::{DashboardStats, EnrollmentFilter};
use super::coupon::{CouponRequest, CouponValidation};
use super::enrollment::{
    Enrollment, EnrollmentId, EnrollmentStatus, EnrollmentUpdate, NewEnrollment,
};
use super::payment::{CreditCardData, NewPayment, Payment};
use super::product::{Batch, BatchDraft, BatchId, Product, ProductDraft, ProductId};
use super::user::{
    AuthResponse, Credentials, PasswordChange, PasswordResetConfirm, Registration, User,
};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Catalog, enrollment and payment endpoints used by the enrollment flow.
#[async_trait]
pub trait EnrollmentApi: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>>;
    async fn get_product(&self, id: ProductId) -> Result<Product>;
    async fn create_enrollment(&self, enrollment: &NewEnrollment) -> Result<Enrollment>;
    async fn list_enrollments(&self) -> Result<Vec<Enrollment>>;
    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Enrollment>;
    async fn update_enrollment(
        &self,
        id: EnrollmentId,
        update: &EnrollmentUpdate,
    ) -> Result<Enrollment>;
    async fn validate_coupon(&self, request: &CouponRequest) -> Result<CouponValidation>;
    async fn create_payment(&self, payment: &NewPayment) -> Result<Payment>;
}

/// User account endpoints.
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn register(&self, registration: &Registration) -> Result<AuthResponse>;
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse>;
    async fn logout(&self) -> Result<()>;
    async fn profile(&self) -> Result<User>;
    async fn change_password(&self, change: &PasswordChange) -> Result<()>;
    async fn request_password_reset(&self, email: &str) -> Result<()>;
    async fn confirm_password_reset(&self, confirm: &PasswordResetConfirm) -> Result<()>;
}

/// Staff-only endpoints.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn dashboard(&self) -> Result<DashboardStats>;
    async fn search_enrollments(&self, filter: &EnrollmentFilter) -> Result<Vec<Enrollment>>;
    async fn set_enrollment_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<Enrollment>;
    async fn list_products(&self) -> Result<Vec<Product>>;
    async fn create_product(&self, draft: &ProductDraft) -> Result<Product>;
    async fn update_product(&self, id: ProductId, draft: &ProductDraft) -> Result<Product>;
    async fn delete_product(&self, id: ProductId) -> Result<()>;
    async fn create_batch(&self, draft: &BatchDraft) -> Result<Batch>;
    async fn update_batch(&self, id: BatchId, draft: &BatchDraft) -> Result<Batch>;
    async fn delete_batch(&self, id: BatchId) -> Result<()>;
}

/// What the backend receives for a card payment.
#[derive(Debug, Clone, PartialEq)]
pub enum CardPayload {
    /// Raw card fields; the backend tokenizes them with the gateway.
    Raw(CreditCardData),
    /// A gateway token obtained on the client side.
    Token(String),
}

/// Turns card details into something safe to send with a payment.
#[async_trait]
pub trait CardTokenizer: Send + Sync {
    async fn tokenize(&self, card: &CreditCardData) -> Result<CardPayload>;
}

/// Credentials that outlive a single process (the browser kept these in
/// local storage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    #[serde(default)]
    pub user: Option<User>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<StoredSession>>;
    async fn save(&self, session: &StoredSession) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

pub type EnrollmentApiRef = Arc<dyn EnrollmentApi>;
pub type AccountApiRef = Arc<dyn AccountApi>;
pub type AdminApiRef = Arc<dyn AdminApi>;
pub type CardTokenizerRef = Arc<dyn CardTokenizer>;
pub type SessionStoreBox = Box<dyn SessionStore>;
