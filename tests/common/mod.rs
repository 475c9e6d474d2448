#![allow(dead_code)]

mod backend;

pub use backend::InMemoryBackend;

use camp_enroll::config::{AuthScheme, ClientConfig};
use camp_enroll::domain::money::Money;
use camp_enroll::domain::payment::CreditCardData;
use camp_enroll::domain::ports::{SessionStore, StoredSession};
use camp_enroll::domain::product::{Batch, Product};
use camp_enroll::domain::user::User;
use camp_enroll::infrastructure::http::HttpApi;
use camp_enroll::infrastructure::in_memory::InMemorySessionStore;
use camp_enroll::infrastructure::session::Session;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::path::Path;

/// A batch where every payment method costs the same.
pub fn flat_batch(id: u64, price: Decimal) -> Batch {
    Batch {
        id,
        name: format!("Lote {id}"),
        start_date: None,
        end_date: None,
        price: Money::new(price),
        pix_installment_price: Money::new(price),
        credit_card_price: Money::new(price),
        max_enrollments: None,
        current_enrollments: None,
        is_full: false,
        status: None,
    }
}

pub fn product(id: u64, name: &str, batch: Option<Batch>) -> Product {
    Product {
        id,
        name: name.to_string(),
        description: String::new(),
        image: None,
        base_price: batch.as_ref().map(|b| b.price),
        max_installments: Some(7),
        is_active: true,
        event_date: None,
        active_batch: batch,
    }
}

/// The sample catalog plus product 2 ("Retiro de Carnaval") at R$1000 for
/// every method.
pub async fn backend() -> InMemoryBackend {
    let backend = InMemoryBackend::with_sample_catalog().await;
    backend
        .add_product(product(
            2,
            "Retiro de Carnaval",
            Some(flat_batch(2, Decimal::from(1000))),
        ))
        .await;
    backend
}

pub fn card() -> CreditCardData {
    CreditCardData {
        number: "4111 1111 1111 1111".into(),
        holder_name: "MARIA SILVA".into(),
        expiry_month: "12".into(),
        expiry_year: "2030".into(),
        ccv: "123".into(),
    }
}

pub fn user(is_staff: bool) -> User {
    User {
        id: 1,
        email: "maria@example.com".into(),
        first_name: "Maria".into(),
        last_name: "Silva".into(),
        is_staff,
        is_superuser: false,
        profile: None,
    }
}

pub async fn session(token: Option<&str>) -> Session {
    let store = InMemorySessionStore::new();
    if let Some(token) = token {
        store
            .save(&StoredSession {
                token: token.to_string(),
                user: Some(user(true)),
            })
            .await
            .unwrap();
    }
    Session::restore(Box::new(store)).await.unwrap()
}

pub async fn http_api(base_url: &str, token: Option<&str>) -> HttpApi {
    http_api_with_scheme(base_url, token, AuthScheme::Bearer).await
}

pub async fn http_api_with_scheme(
    base_url: &str,
    token: Option<&str>,
    scheme: AuthScheme,
) -> HttpApi {
    let mut config = ClientConfig::default().with_api_url(base_url);
    config.auth_scheme = scheme;
    HttpApi::new(&config, session(token).await).unwrap()
}

/// Writes a session file the CLI picks up with `--session-file`.
pub fn write_session_file(path: &Path, token: &str, is_staff: bool) {
    let session = StoredSession {
        token: token.to_string(),
        user: Some(user(is_staff)),
    };
    std::fs::write(path, serde_json::to_vec(&session).unwrap()).unwrap();
}

pub fn product_json(id: u64) -> Value {
    json!({
        "id": id,
        "name": "Acampamento 2026",
        "description": "Retiro de jovens",
        "is_active": true,
        "active_batch": {
            "id": 1,
            "name": "Lote 1",
            "price": "1000.00",
            "pix_installment_price": "1050.00",
            "credit_card_price": "1100.00"
        }
    })
}

pub fn enrollment_json(id: u64, status: &str, payments: Value) -> Value {
    json!({
        "id": id,
        "user_email": "maria@example.com",
        "product_name": "Acampamento 2026",
        "batch_name": "Lote 1",
        "form_data": {"nome_completo": "Maria Silva", "email": "maria@example.com"},
        "status": status,
        "payment_method": "PIX_CASH",
        "installments": 1,
        "total_amount": "1000.00",
        "discount_amount": null,
        "final_amount": "1000.00",
        "created_at": "2026-10-01T10:00:00Z",
        "paid_at": null,
        "payments": payments
    })
}

pub fn payment_json(id: u64, status: &str) -> Value {
    json!({
        "id": id,
        "installment_number": 1,
        "amount": "1000.00",
        "status": status,
        "pix_copy_paste": "00020126580014BR.GOV.BCB.PIX"
    })
}
