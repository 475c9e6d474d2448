use super::coupon::CouponForm;
use crate::domain::age_gate::AgePolicy;
use crate::domain::enrollment::{
    Enrollment, EnrollmentId, EnrollmentStatus, EnrollmentUpdate, NewEnrollment, PersonalData,
};
use crate::domain::money::Money;
use crate::domain::ports::EnrollmentApiRef;
use crate::domain::product::{Product, ProductId};
use crate::error::{EnrollError, Result};
use chrono::{Local, NaiveDate};
use tracing::{info, warn};

const NO_BATCH: &str = "Nenhum produto disponível para inscrição";
const DUPLICATE: &str = "Você já possui uma inscrição ativa para este produto. \
    Cada pessoa pode fazer apenas uma inscrição.";
const CREATE_FALLBACK: &str = "Erro ao criar inscrição";
const LOAD_FALLBACK: &str = "Erro ao carregar dados da inscrição";
const UPDATE_FALLBACK: &str = "Erro ao atualizar dados";

/// The three screens of the enrollment wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStep {
    PersonalData,
    Payment,
    Confirmation,
}

impl FormStep {
    /// Where an existing enrollment sits in the wizard.
    pub fn for_enrollment(enrollment: &Enrollment) -> Self {
        match enrollment.status {
            EnrollmentStatus::Paid => FormStep::Confirmation,
            EnrollmentStatus::PendingPayment => FormStep::Payment,
            EnrollmentStatus::Cancelled | EnrollmentStatus::Expired => FormStep::PersonalData,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            FormStep::PersonalData => 1,
            FormStep::Payment => 2,
            FormStep::Confirmation => 3,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            FormStep::PersonalData => "Dados Pessoais",
            FormStep::Payment => "Pagamento",
            FormStep::Confirmation => "Confirmação",
        }
    }
}

/// Collects personal data for one product and creates the enrollment.
///
/// Submission runs its guards in order and stops at the first failure
/// without creating anything: active batch, age gate, duplicate check.
pub struct EnrollmentForm {
    api: EnrollmentApiRef,
    age_policy: AgePolicy,
    product: Product,
    data: PersonalData,
    coupon: CouponForm,
    step: FormStep,
    enrollment: Option<Enrollment>,
    error: Option<String>,
}

impl EnrollmentForm {
    pub fn new(api: EnrollmentApiRef, age_policy: AgePolicy, product: Product) -> Self {
        Self {
            coupon: CouponForm::new(api.clone()),
            api,
            age_policy,
            product,
            data: PersonalData::default(),
            step: FormStep::PersonalData,
            enrollment: None,
            error: None,
        }
    }

    /// Fetches the product, including its active batch, and opens a form for it.
    pub async fn load(
        api: EnrollmentApiRef,
        age_policy: AgePolicy,
        product_id: ProductId,
    ) -> Result<Self> {
        let product = api.get_product(product_id).await?;
        Ok(Self::new(api, age_policy, product))
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn data(&self) -> &PersonalData {
        &self.data
    }

    pub fn set_data(&mut self, data: PersonalData) {
        self.data = data;
    }

    pub fn coupon(&self) -> &CouponForm {
        &self.coupon
    }

    pub async fn apply_coupon(&mut self, code: &str) -> Result<Money> {
        self.coupon.apply(code, Some(&self.product)).await
    }

    pub fn remove_coupon(&mut self) {
        self.coupon.remove();
    }

    /// PIX cash price of the active batch, less any applied coupon.
    pub fn total(&self) -> Option<Money> {
        let batch = self.product.active_batch.as_ref()?;
        Some(self.coupon.total(batch.price))
    }

    pub fn step(&self) -> FormStep {
        self.step
    }

    pub fn enrollment(&self) -> Option<&Enrollment> {
        self.enrollment.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn submit(&mut self) -> Result<&Enrollment> {
        self.submit_on(Local::now().date_naive()).await
    }

    /// Like [`submit`](Self::submit), with the age gate evaluated on `today`.
    pub async fn submit_on(&mut self, today: NaiveDate) -> Result<&Enrollment> {
        self.error = None;
        match self.try_submit(today).await {
            Ok(enrollment) => {
                info!(
                    enrollment = enrollment.id,
                    product = self.product.id,
                    "enrollment created"
                );
                self.step = FormStep::Payment;
                Ok(&*self.enrollment.insert(enrollment))
            }
            Err(e) => {
                self.error = Some(e.user_message(CREATE_FALLBACK));
                Err(e)
            }
        }
    }

    async fn try_submit(&self, today: NaiveDate) -> Result<Enrollment> {
        let batch = self
            .product
            .active_batch
            .as_ref()
            .ok_or_else(|| EnrollError::Validation(NO_BATCH.into()))?;

        if let Some(birth_date) = self.data.birth_date {
            self.age_policy.check(birth_date, today)?;
        }

        match self.api.list_enrollments().await {
            Ok(existing) => {
                let duplicate = existing.iter().any(|e| {
                    e.belongs_to(&self.product) && e.status != EnrollmentStatus::Cancelled
                });
                if duplicate {
                    return Err(EnrollError::Validation(DUPLICATE.into()));
                }
            }
            Err(e) => warn!(error = %e, "could not check existing enrollments"),
        }

        let request = NewEnrollment {
            product_id: self.product.id,
            batch_id: batch.id,
            form_data: self.data.clone(),
            coupon_code: self.coupon.applied_code().map(str::to_string),
        };
        self.api.create_enrollment(&request).await
    }
}

/// Edits the personal data of an existing enrollment, optionally applying
/// a coupon it did not have.
pub struct EnrollmentEditor {
    api: EnrollmentApiRef,
    enrollment: Enrollment,
    loaded: PersonalData,
    data: PersonalData,
    coupon: CouponForm,
    error: Option<String>,
}

impl EnrollmentEditor {
    pub async fn load(api: EnrollmentApiRef, id: EnrollmentId) -> Result<Self> {
        let enrollment = api.get_enrollment(id).await.map_err(|e| {
            EnrollError::Validation(e.user_message(LOAD_FALLBACK))
        })?;
        let loaded = PersonalData::from_stored(&enrollment.form_data).map_err(|e| {
            warn!(enrollment = id, error = %e, "stored form data is unreadable");
            EnrollError::Decode(format!("{LOAD_FALLBACK}: {e}"))
        })?;
        Ok(Self {
            coupon: CouponForm::new(api.clone()),
            api,
            enrollment,
            data: loaded.clone(),
            loaded,
            error: None,
        })
    }

    pub fn enrollment(&self) -> &Enrollment {
        &self.enrollment
    }

    pub fn data(&self) -> &PersonalData {
        &self.data
    }

    pub fn set_data(&mut self, data: PersonalData) {
        self.data = data;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Prices the coupon against the batch the enrollment was made in, or
    /// its recorded total when the batch is not embedded.
    pub async fn apply_coupon(&mut self, code: &str) -> Result<Money> {
        let product_id = self.enrollment.product.as_ref().map(|p| p.id);
        let amount = self
            .enrollment
            .batch
            .as_ref()
            .map(|b| b.price)
            .or(self.enrollment.total_amount);
        self.coupon.apply_to(code, product_id.zip(amount)).await
    }

    /// Sends the form data, and the coupon when one was applied, as a PATCH.
    pub async fn save(&mut self) -> Result<&Enrollment> {
        self.error = None;
        let form_data = self
            .data
            .patch_stored(&self.enrollment.form_data, &self.loaded)?;
        let update = EnrollmentUpdate {
            form_data,
            coupon_code: self.coupon.applied_code().map(str::to_string),
        };
        match self.api.update_enrollment(self.enrollment.id, &update).await {
            Ok(enrollment) => {
                info!(enrollment = enrollment.id, "enrollment updated");
                self.enrollment = enrollment;
                self.loaded = self.data.clone();
                Ok(&self.enrollment)
            }
            Err(e) => {
                self.error = Some(e.user_message(UPDATE_FALLBACK));
                Err(e)
            }
        }
    }
}
