use super::enrollment::EnrollmentId;
use super::money::Money;
use super::product::Batch;
use crate::error::{EnrollError, Result};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

pub type PaymentId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    PixCash,
    PixInstallment,
    CreditCard,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::PixCash,
        PaymentMethod::PixInstallment,
        PaymentMethod::CreditCard,
    ];

    /// Installment counts the method accepts.
    pub fn installment_range(&self) -> RangeInclusive<u8> {
        match self {
            PaymentMethod::PixCash => 1..=1,
            PaymentMethod::PixInstallment => 2..=7,
            PaymentMethod::CreditCard => 1..=7,
        }
    }

    pub fn requires_card(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::PixCash => "PIX à Vista",
            PaymentMethod::PixInstallment => "PIX Parcelado",
            PaymentMethod::CreditCard => "Cartão de Crédito",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::PixCash => "PIX_CASH",
            PaymentMethod::PixInstallment => "PIX_INSTALLMENT",
            PaymentMethod::CreditCard => "CREDIT_CARD",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = EnrollError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pix-cash" | "pix" => Ok(PaymentMethod::PixCash),
            "pix-installment" => Ok(PaymentMethod::PixInstallment),
            "credit-card" | "card" => Ok(PaymentMethod::CreditCard),
            other => Err(EnrollError::Validation(format!(
                "Forma de pagamento desconhecida: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Created,
    Pending,
    Confirmed,
    Received,
    Overdue,
    Refunded,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// CONFIRMED and RECEIVED end the wait for a payment.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Confirmed | PaymentStatus::Received)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "Criado",
            PaymentStatus::Pending => "Pendente",
            PaymentStatus::Confirmed => "Confirmado",
            PaymentStatus::Received => "Recebido",
            PaymentStatus::Overdue => "Vencido",
            PaymentStatus::Refunded => "Reembolsado",
            PaymentStatus::Cancelled => "Cancelado",
            PaymentStatus::Unknown => "Desconhecido",
        }
    }
}

/// One billable installment tied to an enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    #[serde(default)]
    pub enrollment: Option<serde_json::Value>,
    #[serde(default = "first_installment")]
    pub installment_number: u8,
    pub amount: Money,
    pub status: PaymentStatus,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub payment_url: Option<String>,
    #[serde(default)]
    pub pix_qr_code: Option<String>,
    #[serde(default)]
    pub pix_copy_paste: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn first_installment() -> u8 {
    1
}

impl Payment {
    pub fn is_settled(&self) -> bool {
        self.status.is_settled()
    }

    /// The PIX "copia e cola" code, when the gateway issued one.
    pub fn pix_code(&self) -> Option<&str> {
        self.pix_copy_paste.as_deref().filter(|code| !code.is_empty())
    }
}

/// A chosen payment method with its installment math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallmentPlan {
    pub method: PaymentMethod,
    pub installments: u8,
    pub total: Money,
    pub per_installment: Money,
}

impl InstallmentPlan {
    /// Builds the plan for `method` against the batch price for that method.
    ///
    /// PIX cash always has a single installment regardless of `installments`.
    pub fn new(method: PaymentMethod, installments: u8, batch: &Batch) -> Result<Self> {
        let installments = if method == PaymentMethod::PixCash {
            1
        } else {
            installments
        };
        let range = method.installment_range();
        if !range.contains(&installments) {
            return Err(EnrollError::Validation(format!(
                "{} aceita de {} a {} parcelas",
                method.label(),
                range.start(),
                range.end()
            )));
        }
        let total = batch.price_for(method);
        Ok(Self {
            method,
            installments,
            total,
            per_installment: total.installment_share(installments),
        })
    }

    /// Every plan a batch offers, in display order.
    pub fn options(batch: &Batch) -> Vec<Self> {
        PaymentMethod::ALL
            .iter()
            .flat_map(|method| {
                method
                    .installment_range()
                    .filter_map(move |n| Self::new(*method, n, batch).ok())
            })
            .collect()
    }
}

impl fmt::Display for InstallmentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.installments == 1 {
            write!(f, "{}: {}", self.method.label(), self.total)
        } else {
            write!(
                f,
                "{}: {}x de {} (total {})",
                self.method.label(),
                self.installments,
                self.per_installment,
                self.total
            )
        }
    }
}

/// Card details collected by the card sub-form.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardData {
    pub number: String,
    pub holder_name: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub ccv: String,
}

impl CreditCardData {
    /// Strips the spaces the card number is displayed with.
    pub fn sanitized(&self) -> Self {
        Self {
            number: self.number.chars().filter(|c| !c.is_whitespace()).collect(),
            holder_name: self.holder_name.trim().to_string(),
            expiry_month: format!("{:0>2}", self.expiry_month.trim()),
            expiry_year: self.expiry_year.trim().to_string(),
            ccv: self.ccv.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_on(Local::now().date_naive())
    }

    /// Like [`validate`](Self::validate), with expiry judged against `today`.
    /// A card stays valid through the last day of its expiry month.
    pub fn validate_on(&self, today: NaiveDate) -> Result<()> {
        let card = self.sanitized();
        let digits_only = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

        if !digits_only(&card.number) || !(13..=16).contains(&card.number.len()) {
            return Err(EnrollError::Validation("Número do cartão inválido".into()));
        }
        if card.holder_name.is_empty() {
            return Err(EnrollError::Validation("Informe o nome do titular".into()));
        }
        let month = card
            .expiry_month
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m));
        let year = Some(card.expiry_year.as_str())
            .filter(|y| digits_only(y) && y.len() == 4)
            .and_then(|y| y.parse::<i32>().ok());
        let (Some(month), Some(year)) = (month, year) else {
            return Err(EnrollError::Validation("Validade do cartão inválida".into()));
        };
        if (year, month) < (today.year(), today.month()) {
            return Err(EnrollError::Validation("Cartão vencido".into()));
        }
        if !digits_only(&card.ccv) || !(3..=4).contains(&card.ccv.len()) {
            return Err(EnrollError::Validation("CVV inválido".into()));
        }
        Ok(())
    }

    pub fn last_four(&self) -> String {
        let digits: Vec<char> = self.number.chars().filter(|c| c.is_ascii_digit()).collect();
        digits[digits.len().saturating_sub(4)..].iter().collect()
    }
}

impl fmt::Debug for CreditCardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreditCardData")
            .field("number", &format_args!("**** {}", self.last_four()))
            .field("holder_name", &self.holder_name)
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("ccv", &"***")
            .finish()
    }
}

/// Body of `POST /payments/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPayment {
    pub enrollment_id: EnrollmentId,
    pub payment_method: PaymentMethod,
    pub installments: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card_data: Option<CreditCardData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn batch() -> Batch {
        Batch {
            id: 1,
            name: "Lote 1".into(),
            start_date: None,
            end_date: None,
            price: Money::new(dec!(1000)),
            pix_installment_price: Money::new(dec!(1050)),
            credit_card_price: Money::new(dec!(1100)),
            max_enrollments: None,
            current_enrollments: None,
            is_full: false,
            status: None,
        }
    }

    fn card() -> CreditCardData {
        CreditCardData {
            number: "4111 1111 1111 1111".into(),
            holder_name: "MARIA SILVA".into(),
            expiry_month: "7".into(),
            expiry_year: "2030".into(),
            ccv: "123".into(),
        }
    }

    #[test]
    fn test_pix_installment_plan() {
        let plan = InstallmentPlan::new(PaymentMethod::PixInstallment, 3, &batch()).unwrap();
        assert_eq!(plan.total, Money::new(dec!(1050)));
        assert_eq!(plan.per_installment, Money::new(dec!(350)));
    }

    #[test]
    fn test_pix_cash_forces_single_installment() {
        let plan = InstallmentPlan::new(PaymentMethod::PixCash, 5, &batch()).unwrap();
        assert_eq!(plan.installments, 1);
        assert_eq!(plan.per_installment, Money::new(dec!(1000)));
    }

    #[test]
    fn test_installment_bounds() {
        assert!(InstallmentPlan::new(PaymentMethod::PixInstallment, 1, &batch()).is_err());
        assert!(InstallmentPlan::new(PaymentMethod::PixInstallment, 8, &batch()).is_err());
        assert!(InstallmentPlan::new(PaymentMethod::CreditCard, 1, &batch()).is_ok());
        assert!(InstallmentPlan::new(PaymentMethod::CreditCard, 7, &batch()).is_ok());
        assert!(InstallmentPlan::new(PaymentMethod::CreditCard, 0, &batch()).is_err());
    }

    #[test]
    fn test_options_cover_all_methods() {
        let options = InstallmentPlan::options(&batch());
        // 1 cash + 6 pix installment (2..=7) + 7 card (1..=7)
        assert_eq!(options.len(), 14);
        assert_eq!(options[0].method, PaymentMethod::PixCash);
    }

    #[test]
    fn test_status_settled() {
        assert!(PaymentStatus::Confirmed.is_settled());
        assert!(PaymentStatus::Received.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
        let unknown: PaymentStatus = serde_json::from_value(json!("AWAITING_RISK_ANALYSIS")).unwrap();
        assert_eq!(unknown, PaymentStatus::Unknown);
    }

    #[test]
    fn test_card_sanitize_and_validate() {
        let card = card();
        assert!(card.validate().is_ok());
        let clean = card.sanitized();
        assert_eq!(clean.number, "4111111111111111");
        assert_eq!(clean.expiry_month, "07");

        let mut bad = card.clone();
        bad.ccv = "12".into();
        assert!(matches!(bad.validate(), Err(EnrollError::Validation(_))));
    }

    #[test]
    fn test_card_expiry_against_today() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let expiring = |month: &str, year: &str| CreditCardData {
            expiry_month: month.into(),
            expiry_year: year.into(),
            ..card()
        };

        assert!(expiring("10", "2026").validate_on(today).is_ok());
        assert!(expiring("1", "2027").validate_on(today).is_ok());

        let err = expiring("9", "2026").validate_on(today).unwrap_err();
        assert_eq!(err.to_string(), "Cartão vencido");
        assert!(expiring("12", "2025").validate_on(today).is_err());
        assert_eq!(
            expiring("13", "2027").validate_on(today).unwrap_err().to_string(),
            "Validade do cartão inválida"
        );
    }

    #[test]
    fn test_card_debug_is_masked() {
        let rendered = format!("{:?}", card());
        assert!(!rendered.contains("4111 1111"));
        assert!(rendered.contains("**** 1111"));
        assert!(!rendered.contains("123"));
    }

    #[test]
    fn test_card_wire_format() {
        let value = serde_json::to_value(card().sanitized()).unwrap();
        assert_eq!(value["holderName"], "MARIA SILVA");
        assert_eq!(value["expiryMonth"], "07");
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("pix-cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::PixCash);
        assert_eq!(
            "PIX_INSTALLMENT".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::PixInstallment
        );
        assert!("boleto".parse::<PaymentMethod>().is_err());
    }
}
