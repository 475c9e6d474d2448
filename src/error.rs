use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum EnrollError {
    #[error("HTTP error: {0}")]
    #[diagnostic(code(camp_enroll::http), help("check --api-url and that the backend is reachable"))]
    Http(#[from] reqwest::Error),

    #[error("{}", api_text(.status, .message))]
    #[diagnostic(code(camp_enroll::api))]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    #[diagnostic(code(camp_enroll::decode))]
    Decode(String),

    #[error("{0}")]
    #[diagnostic(code(camp_enroll::validation))]
    Validation(String),

    #[error("{0}")]
    #[diagnostic(code(camp_enroll::age_gate))]
    AgeGate(String),

    #[error("{0}")]
    #[diagnostic(
        code(camp_enroll::tokenizer),
        help("pay with PIX (pix-cash or pix-installment) instead")
    )]
    TokenizerUnavailable(String),

    #[error("Not logged in")]
    #[diagnostic(code(camp_enroll::auth), help("run `camp-enroll login` first"))]
    NotAuthenticated,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EnrollError>;

impl EnrollError {
    /// Builds an `Api` error from a rejected response body.
    ///
    /// JSON bodies yield their structured message, or none. Plain-text bodies
    /// are kept as is; HTML error pages are dropped.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<Value>(body) {
            Ok(value) => extract_message(&value).unwrap_or_default(),
            Err(_) if body.trim_start().starts_with('<') => String::new(),
            Err(_) => body.trim().to_string(),
        };
        Self::Api { status, message }
    }

    /// The text shown to the user for a failed action.
    ///
    /// Backend-provided messages are surfaced verbatim; anything else is
    /// replaced by the localized `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api { message, .. } if !message.is_empty() => message.clone(),
            Self::Validation(message)
            | Self::AgeGate(message)
            | Self::TokenizerUnavailable(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

fn api_text(status: &u16, message: &str) -> String {
    if message.is_empty() {
        format!("request rejected with HTTP {status}")
    } else {
        message.to_string()
    }
}

/// Picks the first structured message out of a backend error body.
///
/// Order: `error`, `detail`, `non_field_errors[0]`, then the first field error
/// found walking the object (nested objects included).
pub fn extract_message(body: &Value) -> Option<String> {
    let object = body.as_object()?;

    for key in ["error", "detail"] {
        if let Some(message) = object.get(key).and_then(first_text) {
            return Some(message);
        }
    }
    if let Some(message) = object.get("non_field_errors").and_then(first_text) {
        return Some(message);
    }

    object.values().find_map(|value| match value {
        Value::Object(_) => extract_message(value),
        other => first_text(other),
    })
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_key_wins() {
        let body = json!({"detail": "later", "error": "Cupom não encontrado"});
        assert_eq!(extract_message(&body).as_deref(), Some("Cupom não encontrado"));
    }

    #[test]
    fn test_field_error_array() {
        let body = json!({"form_data": ["Data de nascimento inválida"]});
        assert_eq!(
            extract_message(&body).as_deref(),
            Some("Data de nascimento inválida")
        );
    }

    #[test]
    fn test_nested_field_error() {
        let body = json!({"credit_card_data": {"number": ["Número inválido"]}});
        assert_eq!(extract_message(&body).as_deref(), Some("Número inválido"));
    }

    #[test]
    fn test_from_response_falls_back_to_text() {
        let err = EnrollError::from_response(502, "Bad Gateway\n");
        assert!(matches!(err, EnrollError::Api { status: 502, ref message } if message == "Bad Gateway"));
    }

    #[test]
    fn test_unstructured_json_has_no_message() {
        let err = EnrollError::from_response(500, r#"{"code": 17}"#);
        assert_eq!(err.to_string(), "request rejected with HTTP 500");
        assert_eq!(err.user_message("Erro ao criar pagamento"), "Erro ao criar pagamento");

        let err = EnrollError::from_response(502, "<html><body>Bad Gateway</body></html>");
        assert_eq!(err.user_message("Erro ao criar pagamento"), "Erro ao criar pagamento");
    }

    #[test]
    fn test_user_message_fallback() {
        let err = EnrollError::Decode("eof".into());
        assert_eq!(err.user_message("Erro ao criar pagamento"), "Erro ao criar pagamento");

        let err = EnrollError::Api {
            status: 400,
            message: "Cartão recusado".into(),
        };
        assert_eq!(err.user_message("Erro ao criar pagamento"), "Cartão recusado");
    }
}
