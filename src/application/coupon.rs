use crate::domain::coupon::{CouponRequest, normalize_code};
use crate::domain::money::Money;
use crate::domain::ports::EnrollmentApiRef;
use crate::domain::product::{Product, ProductId};
use crate::error::{EnrollError, Result};
use tracing::{debug, info};

const EMPTY_CODE: &str = "Digite um código de cupom";
const NO_PRODUCT: &str = "Selecione um produto primeiro";
const FALLBACK: &str = "Cupom inválido";

/// Coupon entry on the enrollment form.
///
/// The backend decides whether a code is valid and how much it is worth;
/// this only keeps what to display and which code to send with the
/// enrollment.
pub struct CouponForm {
    api: EnrollmentApiRef,
    code: String,
    applied: bool,
    discount: Money,
    error: Option<String>,
}

impl CouponForm {
    pub fn new(api: EnrollmentApiRef) -> Self {
        Self {
            api,
            code: String::new(),
            applied: false,
            discount: Money::ZERO,
            error: None,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The code to send with the enrollment, only once it has been accepted.
    pub fn applied_code(&self) -> Option<&str> {
        self.applied.then_some(self.code.as_str())
    }

    /// Total after the discount, never below zero.
    pub fn total(&self, base: Money) -> Money {
        if self.applied {
            base.saturating_sub(self.discount)
        } else {
            base
        }
    }

    /// Validates `code` against the PIX cash price of the product's active
    /// batch.
    ///
    /// A rejection leaves the coupon unapplied and keeps the backend's
    /// message verbatim in [`error`](Self::error).
    pub async fn apply(&mut self, code: &str, product: Option<&Product>) -> Result<Money> {
        let target = product.and_then(|p| p.active_batch.as_ref().map(|b| (p.id, b.price)));
        self.apply_to(code, target).await
    }

    /// Validates `code` for an explicit product and base amount, such as the
    /// batch an existing enrollment was made in. `None` means there is
    /// nothing to price the coupon against.
    pub async fn apply_to(
        &mut self,
        code: &str,
        target: Option<(ProductId, Money)>,
    ) -> Result<Money> {
        self.applied = false;
        self.discount = Money::ZERO;
        self.error = None;

        let code = normalize_code(code);
        if code.is_empty() {
            return Err(self.reject(EnrollError::Validation(EMPTY_CODE.into())));
        }
        let Some((product_id, amount)) = target else {
            return Err(self.reject(EnrollError::Validation(NO_PRODUCT.into())));
        };

        let request = CouponRequest {
            code: code.clone(),
            product_id,
            amount,
        };
        match self.api.validate_coupon(&request).await {
            Ok(validation) if validation.valid => {
                info!(code = %code, discount = %validation.discount_amount, "coupon applied");
                self.code = code;
                self.applied = true;
                self.discount = validation.discount_amount;
                Ok(self.discount)
            }
            Ok(validation) => {
                let message = validation.message.unwrap_or_else(|| FALLBACK.into());
                Err(self.reject(EnrollError::Validation(message)))
            }
            Err(e) => {
                debug!(code = %code, error = %e, "coupon rejected");
                Err(self.reject(e))
            }
        }
    }

    pub fn remove(&mut self) {
        self.code.clear();
        self.applied = false;
        self.discount = Money::ZERO;
        self.error = None;
    }

    fn reject(&mut self, e: EnrollError) -> EnrollError {
        self.error = Some(e.user_message(FALLBACK));
        e
    }
}
