use crate::domain::enrollment::{Enrollment, EnrollmentId};
use crate::domain::payment::{
    CreditCardData, InstallmentPlan, NewPayment, Payment, PaymentId, PaymentMethod, PaymentStatus,
};
use crate::domain::ports::{CardPayload, CardTokenizerRef, EnrollmentApiRef};
use crate::error::{EnrollError, Result};
use std::future::{self, Future};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

const LOAD_FALLBACK: &str = "Erro ao carregar inscrição";
const PIX_FALLBACK: &str = "Erro ao criar pagamento";
const CARD_FALLBACK: &str = "Erro ao processar cartão";

/// Where the user is in the payment flow of one enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    SelectingMethod,
    AwaitingSubmission,
    /// A payment exists but the gateway has not confirmed it yet.
    PaymentCreated,
    Confirmed,
}

/// Result of one poll tick (or a manual refresh).
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Pending(PaymentStatus),
    Confirmed(Payment),
    /// The refreshed enrollment no longer lists the watched payment.
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    Confirmed(Payment),
    Cancelled,
}

/// Drives one enrollment through method selection, payment creation and
/// confirmation polling.
///
/// The enrollment and payment lifecycle is owned by the backend; this type
/// only observes it. The watched payment is always matched by id, never by
/// its position in the enrollment's payment list.
pub struct PaymentFlowController {
    api: EnrollmentApiRef,
    tokenizer: CardTokenizerRef,
    enrollment_id: EnrollmentId,
    poll_interval: Duration,
    enrollment: Option<Enrollment>,
    plan: Option<InstallmentPlan>,
    payment: Option<Payment>,
    state: FlowState,
    error: Option<String>,
}

impl PaymentFlowController {
    pub fn new(
        api: EnrollmentApiRef,
        tokenizer: CardTokenizerRef,
        enrollment_id: EnrollmentId,
    ) -> Self {
        Self {
            api,
            tokenizer,
            enrollment_id,
            poll_interval: DEFAULT_POLL_INTERVAL,
            enrollment: None,
            plan: None,
            payment: None,
            state: FlowState::SelectingMethod,
            error: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn enrollment(&self) -> Option<&Enrollment> {
        self.enrollment.as_ref()
    }

    pub fn plan(&self) -> Option<&InstallmentPlan> {
        self.plan.as_ref()
    }

    pub fn payment(&self) -> Option<&Payment> {
        self.payment.as_ref()
    }

    /// The last user-facing error message, cleared by the next action.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Fetches the enrollment and picks the payment to follow.
    ///
    /// `requested` is honoured when the enrollment has a payment with that id;
    /// otherwise the first payment is used.
    pub async fn load(&mut self, requested: Option<PaymentId>) -> Result<()> {
        let enrollment = match self.api.get_enrollment(self.enrollment_id).await {
            Ok(enrollment) => enrollment,
            Err(e) => {
                self.error = Some(e.user_message(LOAD_FALLBACK));
                return Err(e);
            }
        };

        if let Some(id) = requested
            && enrollment.payment(id).is_none()
        {
            debug!(
                enrollment = self.enrollment_id,
                payment = id,
                "requested payment not found, falling back to first"
            );
        }

        self.payment = enrollment.select_payment(requested).cloned();
        self.state = match &self.payment {
            Some(p) if p.is_settled() => FlowState::Confirmed,
            Some(_) => FlowState::PaymentCreated,
            None => FlowState::SelectingMethod,
        };
        self.enrollment = Some(enrollment);
        self.error = None;
        Ok(())
    }

    /// Every plan the enrollment's batch offers.
    pub fn options(&self) -> Vec<InstallmentPlan> {
        self.enrollment
            .as_ref()
            .and_then(|e| e.batch.as_ref())
            .map(InstallmentPlan::options)
            .unwrap_or_default()
    }

    /// Chooses a payment method and recomputes the per-installment amount.
    pub fn select_method(
        &mut self,
        method: PaymentMethod,
        installments: u8,
    ) -> Result<InstallmentPlan> {
        if matches!(self.state, FlowState::PaymentCreated | FlowState::Confirmed) {
            return Err(EnrollError::Validation(
                "Já existe um pagamento para esta inscrição".into(),
            ));
        }
        let batch = self
            .enrollment
            .as_ref()
            .ok_or_else(|| EnrollError::Validation("Inscrição não carregada".into()))?
            .batch
            .as_ref()
            .ok_or_else(|| EnrollError::Validation("Inscrição sem lote ativo".into()))?;

        let plan = InstallmentPlan::new(method, installments, batch)?;
        self.plan = Some(plan);
        self.state = FlowState::AwaitingSubmission;
        self.error = None;
        Ok(plan)
    }

    /// Creates the payment for the selected plan.
    ///
    /// Card payments need `card`; PIX payments ignore it. Failures are stored
    /// in [`error`](Self::error) and never retried.
    pub async fn submit(&mut self, card: Option<&CreditCardData>) -> Result<&Payment> {
        let plan = match (self.state, self.plan) {
            (FlowState::AwaitingSubmission, Some(plan)) => plan,
            _ => {
                return Err(EnrollError::Validation(
                    "Escolha uma forma de pagamento".into(),
                ));
            }
        };
        let fallback = if plan.method.requires_card() {
            CARD_FALLBACK
        } else {
            PIX_FALLBACK
        };

        self.error = None;
        match self.create(plan, card).await {
            Ok(payment) => {
                info!(
                    enrollment = self.enrollment_id,
                    payment = payment.id,
                    method = plan.method.as_str(),
                    installments = plan.installments,
                    "payment created"
                );
                self.state = if payment.is_settled() {
                    FlowState::Confirmed
                } else {
                    FlowState::PaymentCreated
                };
                Ok(&*self.payment.insert(payment))
            }
            Err(e) => {
                warn!(enrollment = self.enrollment_id, error = %e, "payment creation failed");
                self.error = Some(e.user_message(fallback));
                Err(e)
            }
        }
    }

    async fn create(&self, plan: InstallmentPlan, card: Option<&CreditCardData>) -> Result<Payment> {
        let mut request = NewPayment {
            enrollment_id: self.enrollment_id,
            payment_method: plan.method,
            installments: plan.installments,
            credit_card_data: None,
            credit_card_token: None,
        };

        if plan.method.requires_card() {
            let card = card
                .ok_or_else(|| EnrollError::Validation("Informe os dados do cartão".into()))?;
            card.validate()?;
            match self.tokenizer.tokenize(&card.sanitized()).await? {
                CardPayload::Raw(data) => request.credit_card_data = Some(data),
                CardPayload::Token(token) => request.credit_card_token = Some(token),
            }
        }

        self.api.create_payment(&request).await
    }

    /// Re-fetches the enrollment and updates the watched payment; identical
    /// to a single poll tick.
    ///
    /// Once confirmed, the payment is kept as is and only the enrollment is
    /// refreshed.
    pub async fn refresh(&mut self) -> Result<PollOutcome> {
        let watched = self
            .payment
            .as_ref()
            .map(|p| p.id)
            .ok_or_else(|| EnrollError::Validation("Nenhum pagamento para acompanhar".into()))?;

        let enrollment = self.api.get_enrollment(self.enrollment_id).await?;
        let matched = enrollment.payment(watched).cloned();
        self.enrollment = Some(enrollment);

        if self.state == FlowState::Confirmed {
            return Ok(self.confirmed_outcome());
        }

        let Some(payment) = matched else {
            debug!(payment = watched, "watched payment missing from enrollment");
            return Ok(PollOutcome::Missing);
        };

        let outcome = if payment.is_settled() {
            info!(payment = payment.id, status = ?payment.status, "payment confirmed");
            self.state = FlowState::Confirmed;
            PollOutcome::Confirmed(payment.clone())
        } else {
            debug!(payment = payment.id, status = ?payment.status, "payment still pending");
            PollOutcome::Pending(payment.status)
        };
        self.payment = Some(payment);
        Ok(outcome)
    }

    fn confirmed_outcome(&self) -> PollOutcome {
        match &self.payment {
            Some(payment) => PollOutcome::Confirmed(payment.clone()),
            None => PollOutcome::Missing,
        }
    }

    /// Polls until the watched payment is confirmed.
    pub async fn watch(&mut self) -> Result<WatchOutcome> {
        self.watch_until(future::pending()).await
    }

    /// Polls every `poll_interval` until the watched payment is confirmed or
    /// `shutdown` completes.
    ///
    /// A failed tick is logged and the next tick proceeds. A request still in
    /// flight when `shutdown` fires is dropped. Watching an already confirmed
    /// payment returns at once without polling.
    pub async fn watch_until<F>(&mut self, shutdown: F) -> Result<WatchOutcome>
    where
        F: Future<Output = ()>,
    {
        if self.state == FlowState::Confirmed
            && let PollOutcome::Confirmed(payment) = self.confirmed_outcome()
        {
            return Ok(WatchOutcome::Confirmed(payment));
        }
        if self.payment.is_none() {
            return Err(EnrollError::Validation(
                "Nenhum pagamento para acompanhar".into(),
            ));
        }

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!(enrollment = self.enrollment_id, "polling cancelled");
                    return Ok(WatchOutcome::Cancelled);
                }
                _ = ticker.tick() => {
                    match self.refresh().await {
                        Ok(PollOutcome::Confirmed(payment)) => {
                            return Ok(WatchOutcome::Confirmed(payment));
                        }
                        Ok(_) => {}
                        Err(e) => warn!(enrollment = self.enrollment_id, error = %e, "polling tick failed"),
                    }
                }
            }
        }
    }
}
