use camp_enroll::domain::coupon::{CouponRequest, CouponValidation, normalize_code};
use camp_enroll::domain::enrollment::{
    Enrollment, EnrollmentId, EnrollmentStatus, EnrollmentUpdate, NewEnrollment, PersonalData,
};
use camp_enroll::domain::money::Money;
use camp_enroll::domain::payment::{NewPayment, Payment, PaymentId, PaymentMethod, PaymentStatus};
use camp_enroll::domain::ports::EnrollmentApi;
use camp_enroll::domain::product::{Batch, Product, ProductId};
use camp_enroll::error::{EnrollError, Result};
use async_trait::async_trait;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct BackendState {
    products: BTreeMap<ProductId, Product>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    coupons: HashMap<String, Money>,
    status_scripts: HashMap<PaymentId, VecDeque<PaymentStatus>>,
    payment_rejection: Option<(u16, Value)>,
    failing_fetches: usize,
    calls: HashMap<&'static str, usize>,
    next_id: u64,
}

impl BackendState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, op: &'static str) {
        *self.calls.entry(op).or_default() += 1;
    }

    fn enrollment_mut(&mut self, id: EnrollmentId) -> Result<&mut Enrollment> {
        self.enrollments.get_mut(&id).ok_or_else(not_found)
    }

    /// Moves scripted payments one step forward and marks the enrollment
    /// paid once every payment is settled.
    fn advance(&mut self, id: EnrollmentId) {
        let Some(enrollment) = self.enrollments.get_mut(&id) else {
            return;
        };
        for payment in &mut enrollment.payments {
            if let Some(status) = self
                .status_scripts
                .get_mut(&payment.id)
                .and_then(VecDeque::pop_front)
            {
                payment.status = status;
                if status.is_settled() {
                    payment.paid_at = Some("2026-10-16T12:00:00Z".into());
                }
            }
        }
        if !enrollment.payments.is_empty() && enrollment.payments.iter().all(Payment::is_settled) {
            enrollment.status = EnrollmentStatus::Paid;
            enrollment.paid_at = Some("2026-10-16T12:00:00Z".into());
        }
    }
}

fn not_found() -> EnrollError {
    EnrollError::Api {
        status: 404,
        message: "Não encontrado.".into(),
    }
}

/// A scriptable stand-in for the enrollment backend.
///
/// Keeps products, enrollments and payments in `Arc<RwLock<..>>` so clones
/// share state. Payment confirmation is simulated by scripting the statuses a
/// payment goes through on successive enrollment fetches.
#[derive(Default, Clone)]
pub struct InMemoryBackend {
    state: Arc<RwLock<BackendState>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend with one camp product (id 1) priced at R$1000 PIX cash,
    /// R$1050 PIX installments and R$1100 card, and a `PROMO10` coupon.
    pub async fn with_sample_catalog() -> Self {
        let backend = Self::new();
        backend
            .add_product(Product {
                id: 1,
                name: "Acampamento 2026".into(),
                description: "Retiro de jovens".into(),
                image: None,
                base_price: Some(Money::new(dec!(1000))),
                max_installments: Some(7),
                is_active: true,
                event_date: Some("2026-11-20".into()),
                active_batch: Some(Batch {
                    id: 1,
                    name: "Lote 1".into(),
                    start_date: Some("2026-09-01".into()),
                    end_date: Some("2026-11-01".into()),
                    price: Money::new(dec!(1000)),
                    pix_installment_price: Money::new(dec!(1050)),
                    credit_card_price: Money::new(dec!(1100)),
                    max_enrollments: Some(200),
                    current_enrollments: Some(0),
                    is_full: false,
                    status: Some("active".into()),
                }),
            })
            .await;
        backend.add_coupon("PROMO10", Money::new(dec!(100))).await;
        backend
    }

    pub async fn add_product(&self, product: Product) {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(product.id);
        state.products.insert(product.id, product);
    }

    pub async fn add_coupon(&self, code: &str, discount: Money) {
        let mut state = self.state.write().await;
        state.coupons.insert(normalize_code(code), discount);
    }

    pub async fn insert_enrollment(&self, enrollment: Enrollment) {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(enrollment.id);
        for payment in &enrollment.payments {
            state.next_id = state.next_id.max(payment.id);
        }
        state.enrollments.insert(enrollment.id, enrollment);
    }

    /// Creates a pending enrollment for `product_id` without going through
    /// the form checks.
    pub async fn seed_enrollment(&self, product_id: ProductId) -> Result<Enrollment> {
        let mut state = self.state.write().await;
        let product = state.products.get(&product_id).cloned().ok_or_else(not_found)?;
        let batch = product.active_batch.clone().ok_or_else(not_found)?;
        let id = state.next_id();
        let enrollment = new_enrollment(id, product, batch, PersonalData::default(), None);
        state.enrollments.insert(id, enrollment.clone());
        Ok(enrollment)
    }

    /// Statuses the payment takes on the next enrollment fetches, one per fetch.
    pub async fn script_statuses(&self, payment: PaymentId, statuses: Vec<PaymentStatus>) {
        let mut state = self.state.write().await;
        state.status_scripts.insert(payment, statuses.into());
    }

    /// Makes the next `create_payment` fail with the given response.
    pub async fn reject_next_payment(&self, status: u16, body: Value) {
        self.state.write().await.payment_rejection = Some((status, body));
    }

    /// Makes the next `count` enrollment fetches fail.
    pub async fn fail_next_fetches(&self, count: usize) {
        self.state.write().await.failing_fetches = count;
    }

    /// How many times `op` (a port method name) has been called.
    pub async fn calls(&self, op: &str) -> usize {
        self.state.read().await.calls.get(op).copied().unwrap_or(0)
    }

    pub async fn enrollment(&self, id: EnrollmentId) -> Option<Enrollment> {
        self.state.read().await.enrollments.get(&id).cloned()
    }
}

fn new_enrollment(
    id: EnrollmentId,
    product: Product,
    batch: Batch,
    form: PersonalData,
    discount: Option<Money>,
) -> Enrollment {
    let total = batch.price;
    Enrollment {
        id,
        user_email: Some(form.email.clone()).filter(|e| !e.is_empty()),
        product_name: Some(product.name.clone()),
        batch_name: Some(batch.name.clone()),
        product: Some(product),
        batch: Some(batch),
        form_data: serde_json::to_value(&form).unwrap_or(Value::Null),
        status: EnrollmentStatus::PendingPayment,
        payment_method: None,
        installments: Some(1),
        total_amount: Some(total),
        discount_amount: discount,
        final_amount: total.saturating_sub(discount.unwrap_or(Money::ZERO)),
        created_at: Some("2026-10-16T10:00:00Z".into()),
        paid_at: None,
        payments: Vec::new(),
    }
}

#[async_trait]
impl EnrollmentApi for InMemoryBackend {
    async fn list_products(&self) -> Result<Vec<Product>> {
        let mut state = self.state.write().await;
        state.record("list_products");
        Ok(state.products.values().cloned().collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Product> {
        let mut state = self.state.write().await;
        state.record("get_product");
        state.products.get(&id).cloned().ok_or_else(not_found)
    }

    async fn create_enrollment(&self, request: &NewEnrollment) -> Result<Enrollment> {
        let mut state = self.state.write().await;
        state.record("create_enrollment");

        let product = state
            .products
            .get(&request.product_id)
            .cloned()
            .ok_or_else(not_found)?;
        let batch = product
            .active_batch
            .clone()
            .filter(|b| b.id == request.batch_id)
            .ok_or_else(|| EnrollError::Api {
                status: 400,
                message: "Lote inválido".into(),
            })?;
        let discount = match &request.coupon_code {
            Some(code) => Some(
                state
                    .coupons
                    .get(&normalize_code(code))
                    .copied()
                    .ok_or_else(|| EnrollError::Api {
                        status: 400,
                        message: "Cupom não encontrado".into(),
                    })?,
            ),
            None => None,
        };

        let id = state.next_id();
        let enrollment = new_enrollment(id, product, batch, request.form_data.clone(), discount);
        state.enrollments.insert(id, enrollment.clone());
        Ok(enrollment)
    }

    async fn list_enrollments(&self) -> Result<Vec<Enrollment>> {
        let mut state = self.state.write().await;
        state.record("list_enrollments");
        Ok(state.enrollments.values().cloned().collect())
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Enrollment> {
        let mut state = self.state.write().await;
        state.record("get_enrollment");
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(EnrollError::Api {
                status: 503,
                message: "Serviço indisponível".into(),
            });
        }
        state.advance(id);
        state.enrollments.get(&id).cloned().ok_or_else(not_found)
    }

    async fn update_enrollment(
        &self,
        id: EnrollmentId,
        update: &EnrollmentUpdate,
    ) -> Result<Enrollment> {
        let mut state = self.state.write().await;
        state.record("update_enrollment");
        let discount = match &update.coupon_code {
            Some(code) => state.coupons.get(&normalize_code(code)).copied(),
            None => None,
        };
        let enrollment = state.enrollment_mut(id)?;
        enrollment.form_data = update.form_data.clone();
        if let Some(discount) = discount {
            let total = enrollment.total_amount.unwrap_or(enrollment.final_amount);
            enrollment.discount_amount = Some(discount);
            enrollment.final_amount = total.saturating_sub(discount);
        }
        Ok(enrollment.clone())
    }

    async fn validate_coupon(&self, request: &CouponRequest) -> Result<CouponValidation> {
        let mut state = self.state.write().await;
        state.record("validate_coupon");
        let discount = state
            .coupons
            .get(&normalize_code(&request.code))
            .copied()
            .ok_or_else(|| EnrollError::Api {
                status: 404,
                message: "Cupom não encontrado".into(),
            })?;
        Ok(CouponValidation {
            valid: true,
            discount_amount: discount,
            final_amount: Some(request.amount.saturating_sub(discount)),
            message: Some(format!("Cupom aplicado! Desconto de {discount}")),
        })
    }

    async fn create_payment(&self, request: &NewPayment) -> Result<Payment> {
        let mut state = self.state.write().await;
        state.record("create_payment");

        if let Some((status, body)) = state.payment_rejection.take() {
            return Err(EnrollError::from_response(status, &body.to_string()));
        }
        if request.payment_method == PaymentMethod::CreditCard
            && request.credit_card_data.is_none()
            && request.credit_card_token.is_none()
        {
            return Err(EnrollError::from_response(
                400,
                &json!({"error": "Dados do cartão são obrigatórios"}).to_string(),
            ));
        }

        let first_id = state.next_id + 1;
        state.next_id += u64::from(request.installments);
        let enrollment = state.enrollment_mut(request.enrollment_id)?;
        let batch = enrollment.batch.clone().ok_or_else(not_found)?;
        let total = batch
            .price_for(request.payment_method)
            .saturating_sub(enrollment.discount_amount.unwrap_or(Money::ZERO));
        let share = total.installment_share(request.installments);

        enrollment.payment_method = Some(request.payment_method);
        enrollment.installments = Some(request.installments);
        enrollment.total_amount = Some(batch.price_for(request.payment_method));
        enrollment.final_amount = total;
        enrollment.payments = (0..request.installments)
            .map(|n| {
                let id = first_id + u64::from(n);
                let pix = request.payment_method != PaymentMethod::CreditCard;
                Payment {
                    id,
                    enrollment: Some(json!(request.enrollment_id)),
                    installment_number: n + 1,
                    amount: share,
                    status: PaymentStatus::Pending,
                    due_date: None,
                    paid_at: None,
                    payment_url: None,
                    pix_qr_code: pix.then(|| "iVBORw0KGgo=".to_string()),
                    pix_copy_paste: pix.then(|| format!("00020126580014BR.GOV.BCB.PIX{id}")),
                    created_at: Some("2026-10-16T10:05:00Z".into()),
                }
            })
            .collect();

        enrollment
            .payments
            .first()
            .cloned()
            .ok_or_else(|| EnrollError::Validation("Número de parcelas inválido".into()))
    }
}
