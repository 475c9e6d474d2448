use crate::domain::payment::CreditCardData;
use crate::domain::ports::{CardPayload, CardTokenizer};
use crate::error::{EnrollError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

const UNAVAILABLE: &str = "Tokenização de cartão indisponível. \
    Para pagamento com cartão, use PIX como alternativa.";

/// Sends the card fields to the backend, which tokenizes them with the
/// gateway. This is the default strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServerSideTokenizer;

#[async_trait]
impl CardTokenizer for ServerSideTokenizer {
    async fn tokenize(&self, card: &CreditCardData) -> Result<CardPayload> {
        Ok(CardPayload::Raw(card.sanitized()))
    }
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    #[serde(rename = "creditCardToken")]
    credit_card_token: Option<String>,
    #[serde(default)]
    errors: Vec<GatewayError>,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    description: String,
}

/// Tokenizes the card directly with the payment gateway using its public
/// key, so raw card data never reaches the backend.
#[derive(Debug, Clone)]
pub struct GatewayTokenizer {
    client: reqwest::Client,
    url: String,
    public_key: String,
}

impl GatewayTokenizer {
    pub fn new(client: reqwest::Client, url: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            public_key: public_key.into(),
        }
    }
}

fn unavailable(context: &str, e: reqwest::Error) -> EnrollError {
    warn!(error = %e, "{}", context);
    EnrollError::TokenizerUnavailable(UNAVAILABLE.into())
}

#[async_trait]
impl CardTokenizer for GatewayTokenizer {
    async fn tokenize(&self, card: &CreditCardData) -> Result<CardPayload> {
        debug!(url = %self.url, card = ?card, "tokenizing card with gateway");

        let response = self
            .client
            .post(&self.url)
            .header("access_token", &self.public_key)
            .json(&card.sanitized())
            .send()
            .await
            .map_err(|e| unavailable("card gateway unreachable", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| unavailable("card gateway reply cut short", e))?;
        let parsed: Option<TokenizeResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|r| r.errors.into_iter().next())
                .map(|e| e.description)
                .unwrap_or_else(|| "Erro ao tokenizar cartão".to_string());
            return Err(EnrollError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parsed
            .and_then(|r| r.credit_card_token)
            .filter(|token| !token.is_empty())
            .map(CardPayload::Token)
            .ok_or_else(|| EnrollError::TokenizerUnavailable(UNAVAILABLE.into()))
    }
}
