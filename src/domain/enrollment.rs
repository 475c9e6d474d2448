use super::money::Money;
use super::payment::{Payment, PaymentId, PaymentMethod};
use super::product::{Batch, BatchId, Product, ProductId};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type EnrollmentId = u64;

/// Lifecycle of an enrollment. Driven entirely by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    PendingPayment,
    Paid,
    Cancelled,
    Expired,
}

impl EnrollmentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EnrollmentStatus::PendingPayment => "Aguardando Pagamento",
            EnrollmentStatus::Paid => "Pago",
            EnrollmentStatus::Cancelled => "Cancelado",
            EnrollmentStatus::Expired => "Expirado",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::PendingPayment => "PENDING_PAYMENT",
            EnrollmentStatus::Paid => "PAID",
            EnrollmentStatus::Cancelled => "CANCELLED",
            EnrollmentStatus::Expired => "EXPIRED",
        }
    }

    /// PENDING_PAYMENT and PAID hold a seat.
    pub fn is_active(&self) -> bool {
        matches!(self, EnrollmentStatus::PendingPayment | EnrollmentStatus::Paid)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = crate::error::EnrollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(
            s.trim().to_ascii_uppercase().replace('-', "_"),
        ))
        .map_err(|_| crate::error::EnrollError::Validation(format!("Status desconhecido: {s}")))
    }
}

/// A user's registration for a product/batch, tracked through payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub product: Option<Product>,
    #[serde(default)]
    pub batch: Option<Batch>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub batch_name: Option<String>,
    /// Opaque form blob; see [`PersonalData`] for the fields the client fills.
    #[serde(default)]
    pub form_data: serde_json::Value,
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub installments: Option<u8>,
    #[serde(default)]
    pub total_amount: Option<Money>,
    #[serde(default)]
    pub discount_amount: Option<Money>,
    pub final_amount: Money,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Enrollment {
    pub fn payment(&self, id: PaymentId) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == id)
    }

    /// Picks the payment to show: the requested one when present, otherwise
    /// the first in the list. An unknown id is not an error.
    pub fn select_payment(&self, requested: Option<PaymentId>) -> Option<&Payment> {
        requested
            .and_then(|id| self.payment(id))
            .or_else(|| self.payments.first())
    }

    pub fn product_label(&self) -> &str {
        self.product
            .as_ref()
            .map(|p| p.name.as_str())
            .or(self.product_name.as_deref())
            .unwrap_or("")
    }

    pub fn batch_label(&self) -> &str {
        self.batch
            .as_ref()
            .map(|b| b.name.as_str())
            .or(self.batch_name.as_deref())
            .unwrap_or("")
    }

    pub fn belongs_to(&self, product: &Product) -> bool {
        match &self.product {
            Some(p) => p.id == product.id,
            None => self.product_name.as_deref() == Some(product.name.as_str()),
        }
    }

    /// A string field out of `form_data`, empty when absent.
    pub fn form_field(&self, key: &str) -> String {
        match self.form_data.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// Finds an enrollment that already holds a seat (pending or paid).
pub fn active_enrollment(enrollments: &[Enrollment]) -> Option<&Enrollment> {
    enrollments.iter().find(|e| e.status.is_active())
}

/// The personal-data form.
///
/// Stored blobs are read leniently: a missing key stays empty, and scalars
/// that are not strings keep their text form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalData {
    #[serde(rename = "nome_completo", default, deserialize_with = "lenient_string")]
    pub full_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(rename = "telefone", default, deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(
        rename = "data_nascimento",
        default,
        deserialize_with = "empty_date_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cpf: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rg: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cep: String,
    #[serde(rename = "tamanho_camiseta", default, deserialize_with = "lenient_string")]
    pub shirt_size: String,
    #[serde(rename = "membro_batista_capital", default, deserialize_with = "lenient_string")]
    pub church_member: String,
    #[serde(rename = "igreja", default, deserialize_with = "lenient_string")]
    pub church: String,
    #[serde(rename = "lider_pg", default, deserialize_with = "lenient_string")]
    pub small_group_leader: String,
    #[serde(rename = "observacoes", default, deserialize_with = "lenient_string")]
    pub notes: String,
}

impl PersonalData {
    /// Reads the `form_data` blob of a stored enrollment. `null` means no
    /// data was saved yet.
    pub fn from_stored(form_data: &Value) -> Result<Self, serde_json::Error> {
        match form_data {
            Value::Null => Ok(Self::default()),
            other => Self::deserialize(other),
        }
    }

    /// Builds the blob for a PATCH: starts from what the backend stored and
    /// overwrites only the fields that differ from `loaded`. Keys this form
    /// does not know, and untouched values of any type, are sent back as-is.
    pub fn patch_stored(
        &self,
        stored: &Value,
        loaded: &PersonalData,
    ) -> Result<Value, serde_json::Error> {
        let mut merged = match stored {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        let before = serde_json::to_value(loaded)?;
        if let Value::Object(after) = serde_json::to_value(self)? {
            for (key, value) in after {
                if before.get(&key) != Some(&value) || !merged.contains_key(&key) {
                    merged.insert(key, value);
                }
            }
        }
        if self.birth_date.is_none() && loaded.birth_date.is_some() {
            merged.insert("data_nascimento".to_string(), Value::String(String::new()));
        }
        Ok(Value::Object(merged))
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected text, found {other}"
        ))),
    }
}

fn empty_date_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Body of `POST /enrollments/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEnrollment {
    pub product_id: ProductId,
    pub batch_id: BatchId,
    pub form_data: PersonalData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

/// Body of `PATCH /enrollments/{id}/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentUpdate {
    pub form_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentStatus;
    use serde_json::json;

    fn enrollment_with_payments() -> Enrollment {
        serde_json::from_value(json!({
            "id": 10,
            "product_name": "Acampamento",
            "status": "PENDING_PAYMENT",
            "final_amount": "1000.00",
            "form_data": {"nome_completo": "Maria", "data_nascimento": ""},
            "payments": [
                {"id": 7, "installment_number": 1, "amount": "250.00", "status": "PENDING"},
                {"id": 8, "installment_number": 2, "amount": "250.00", "status": "PENDING"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_select_payment_by_id() {
        let enrollment = enrollment_with_payments();
        assert_eq!(enrollment.select_payment(Some(8)).unwrap().id, 8);
    }

    #[test]
    fn test_select_payment_falls_back_to_first() {
        let enrollment = enrollment_with_payments();
        assert_eq!(enrollment.select_payment(Some(999)).unwrap().id, 7);
        assert_eq!(enrollment.select_payment(None).unwrap().id, 7);
    }

    #[test]
    fn test_select_payment_empty_list() {
        let mut enrollment = enrollment_with_payments();
        enrollment.payments.clear();
        assert!(enrollment.select_payment(Some(7)).is_none());
    }

    #[test]
    fn test_payment_status_parsed() {
        let enrollment = enrollment_with_payments();
        assert_eq!(enrollment.payments[0].status, PaymentStatus::Pending);
        assert_eq!(enrollment.form_field("nome_completo"), "Maria");
        assert_eq!(enrollment.form_field("cpf"), "");
    }

    #[test]
    fn test_personal_data_wire_keys() {
        let data: PersonalData = serde_json::from_value(json!({
            "nome_completo": "Maria Silva",
            "email": "maria@example.com",
            "data_nascimento": "2000-05-01",
            "tamanho_camiseta": "M"
        }))
        .unwrap();
        assert_eq!(data.birth_date, NaiveDate::from_ymd_opt(2000, 5, 1));
        assert_eq!(data.shirt_size, "M");

        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["data_nascimento"], "2000-05-01");
        assert_eq!(value["lider_pg"], "");
    }

    #[test]
    fn test_active_enrollment_skips_cancelled() {
        let mut cancelled = enrollment_with_payments();
        cancelled.status = EnrollmentStatus::Cancelled;
        let mut paid = enrollment_with_payments();
        paid.id = 2;
        paid.status = EnrollmentStatus::Paid;

        let list = vec![cancelled.clone(), paid];
        assert_eq!(active_enrollment(&list).map(|e| e.id), Some(2));
        assert!(active_enrollment(&[cancelled]).is_none());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "pending-payment".parse::<EnrollmentStatus>().unwrap(),
            EnrollmentStatus::PendingPayment
        );
        assert!("refunded".parse::<EnrollmentStatus>().is_err());
    }

    #[test]
    fn test_stored_form_data_is_read_leniently() {
        let stored = json!({
            "nome_completo": "Maria Silva",
            "membro_batista_capital": true,
            "cep": 70000000,
            "igreja": null
        });
        let data = PersonalData::from_stored(&stored).unwrap();
        assert_eq!(data.full_name, "Maria Silva");
        assert_eq!(data.email, "");
        assert_eq!(data.church_member, "true");
        assert_eq!(data.cep, "70000000");
        assert_eq!(data.church, "");

        assert_eq!(PersonalData::from_stored(&Value::Null).unwrap(), PersonalData::default());
        assert!(PersonalData::from_stored(&json!("Maria")).is_err());
        assert!(PersonalData::from_stored(&json!({"cpf": ["1"]})).is_err());
    }

    #[test]
    fn test_patch_only_overwrites_changed_fields() {
        let stored = json!({
            "nome_completo": "Maria Silva",
            "membro_batista_capital": true,
            "data_nascimento": "2000-05-20",
            "alergias": "amendoim"
        });
        let loaded = PersonalData::from_stored(&stored).unwrap();
        let mut edited = loaded.clone();
        edited.full_name = "Maria Souza".into();
        edited.birth_date = None;

        let patched = edited.patch_stored(&stored, &loaded).unwrap();
        assert_eq!(patched["nome_completo"], "Maria Souza");
        assert_eq!(patched["membro_batista_capital"], json!(true));
        assert_eq!(patched["alergias"], "amendoim");
        assert_eq!(patched["data_nascimento"], "");
    }
}
