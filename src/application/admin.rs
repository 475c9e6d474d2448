use crate::domain::admin::{DashboardStats, EnrollmentFilter};
use crate::domain::enrollment::{Enrollment, EnrollmentId, EnrollmentStatus};
use crate::domain::ports::AdminApiRef;
use crate::domain::product::{Batch, BatchDraft, BatchId, Product, ProductDraft, ProductId};
use crate::error::{EnrollError, Result};
use crate::infrastructure::session::Session;
use tracing::info;

const STAFF_ONLY: &str = "Acesso restrito a administradores";

/// Staff operations: dashboard, enrollment management and catalog edits.
///
/// Every call checks the cached session user first; the backend enforces
/// the same rule.
pub struct AdminConsole {
    api: AdminApiRef,
    session: Session,
}

impl AdminConsole {
    pub fn new(api: AdminApiRef, session: Session) -> Self {
        Self { api, session }
    }

    async fn ensure_staff(&self) -> Result<()> {
        match self.session.user().await {
            Some(user) if user.is_admin() => Ok(()),
            Some(_) => Err(EnrollError::Validation(STAFF_ONLY.into())),
            None if self.session.is_authenticated().await => Ok(()),
            None => Err(EnrollError::NotAuthenticated),
        }
    }

    pub async fn dashboard(&self) -> Result<DashboardStats> {
        self.ensure_staff().await?;
        self.api.dashboard().await
    }

    pub async fn enrollments(&self, filter: &EnrollmentFilter) -> Result<Vec<Enrollment>> {
        self.ensure_staff().await?;
        self.api.search_enrollments(filter).await
    }

    pub async fn set_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<Enrollment> {
        self.ensure_staff().await?;
        let enrollment = self.api.set_enrollment_status(id, status).await?;
        info!(enrollment = id, status = status.as_str(), "enrollment status changed");
        Ok(enrollment)
    }

    pub async fn products(&self) -> Result<Vec<Product>> {
        self.ensure_staff().await?;
        self.api.list_products().await
    }

    pub async fn create_product(&self, draft: &ProductDraft) -> Result<Product> {
        self.ensure_staff().await?;
        if draft.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            return Err(EnrollError::Validation("Informe o nome do produto".into()));
        }
        let product = self.api.create_product(draft).await?;
        info!(product = product.id, "product created");
        Ok(product)
    }

    pub async fn update_product(&self, id: ProductId, draft: &ProductDraft) -> Result<Product> {
        self.ensure_staff().await?;
        self.api.update_product(id, draft).await
    }

    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        self.ensure_staff().await?;
        self.api.delete_product(id).await?;
        info!(product = id, "product deleted");
        Ok(())
    }

    pub async fn create_batch(&self, draft: &BatchDraft) -> Result<Batch> {
        self.ensure_staff().await?;
        if draft.product.is_none() {
            return Err(EnrollError::Validation("Selecione um produto".into()));
        }
        if draft.price.is_none()
            || draft.pix_installment_price.is_none()
            || draft.credit_card_price.is_none()
        {
            return Err(EnrollError::Validation(
                "Informe os preços de PIX à vista, PIX parcelado e cartão".into(),
            ));
        }
        let batch = self.api.create_batch(draft).await?;
        info!(batch = batch.id, "batch created");
        Ok(batch)
    }

    pub async fn update_batch(&self, id: BatchId, draft: &BatchDraft) -> Result<Batch> {
        self.ensure_staff().await?;
        self.api.update_batch(id, draft).await
    }

    pub async fn delete_batch(&self, id: BatchId) -> Result<()> {
        self.ensure_staff().await?;
        self.api.delete_batch(id).await?;
        info!(batch = id, "batch deleted");
        Ok(())
    }
}
