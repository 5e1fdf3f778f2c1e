//! Push delivery gateway abstraction.
//!
//! The concrete provider sits behind the [`PushGateway`] trait: a token
//! format rule, a maximum batch size, and a batch-send operation returning
//! per-token receipts. [`HttpPushGateway`] talks to an Expo-style HTTP
//! provider; [`NoOpPushGateway`] is used when push delivery is disabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use schoolhub_common::{AppError, AppResult};

/// Outcome of one submitted token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Accepted by the provider.
    Ok,
    /// Rejected by the provider, with the provider's reason.
    Error(String),
}

/// Per-token delivery receipt for one dispatch call.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// The originating endpoint token.
    pub token: String,
    /// Delivery outcome.
    pub status: ReceiptStatus,
}

impl DeliveryReceipt {
    /// Whether the provider accepted this token.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, ReceiptStatus::Ok)
    }
}

/// Message payload submitted to the provider.
///
/// `data` is a flat key-value map used for client-side deep-linking.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

/// Trait for the push delivery provider.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Whether `token` matches the provider's token format rule.
    fn is_valid_token(&self, token: &str) -> bool;

    /// Maximum number of tokens the provider accepts in one batch.
    fn max_batch_size(&self) -> usize;

    /// Submit one batch. Returns one receipt per submitted token,
    /// in the order the tokens were submitted.
    async fn send_batch(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> AppResult<Vec<DeliveryReceipt>>;
}

/// Wrapper for boxed `PushGateway` trait object.
pub type PushGatewayService = Arc<dyn PushGateway>;

/// Expo-style token format rule.
fn is_expo_token(token: &str) -> bool {
    token.starts_with("ExponentPushToken[") && token.ends_with(']')
}

/// A no-op gateway for when push delivery is disabled.
///
/// Accepts any non-empty token and reports every submission as delivered.
#[derive(Debug, Clone)]
pub struct NoOpPushGateway {
    max_batch_size: usize,
}

impl NoOpPushGateway {
    /// Create a no-op gateway with the given batch cap.
    #[must_use]
    pub const fn new(max_batch_size: usize) -> Self {
        Self { max_batch_size }
    }
}

impl Default for NoOpPushGateway {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl PushGateway for NoOpPushGateway {
    fn is_valid_token(&self, token: &str) -> bool {
        !token.is_empty()
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn send_batch(
        &self,
        _message: &PushMessage,
        tokens: &[String],
    ) -> AppResult<Vec<DeliveryReceipt>> {
        Ok(tokens
            .iter()
            .map(|t| DeliveryReceipt {
                token: t.clone(),
                status: ReceiptStatus::Ok,
            })
            .collect())
    }
}

/// One ticket in the provider's batch response.
#[derive(Debug, Deserialize)]
struct ProviderTicket {
    status: String,
    message: Option<String>,
}

/// The provider's batch response envelope.
#[derive(Debug, Deserialize)]
struct ProviderResponse {
    data: Vec<ProviderTicket>,
}

/// HTTP push gateway for an Expo-style provider.
///
/// The provider echoes one ticket per submitted token, in submission order
/// within the batch; receipts are correlated positionally and carry the
/// originating token.
#[derive(Clone)]
pub struct HttpPushGateway {
    client: reqwest::Client,
    provider_url: url::Url,
    max_batch_size: usize,
}

impl HttpPushGateway {
    /// Create a gateway for the given provider endpoint.
    #[must_use]
    pub fn new(provider_url: url::Url, max_batch_size: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider_url,
            max_batch_size,
        }
    }
}

#[async_trait]
impl PushGateway for HttpPushGateway {
    fn is_valid_token(&self, token: &str) -> bool {
        is_expo_token(token)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn send_batch(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> AppResult<Vec<DeliveryReceipt>> {
        let request = serde_json::json!({
            "to": tokens,
            "title": message.title,
            "body": message.body,
            "data": message.data,
            "sound": "default",
        });

        let response = self
            .client
            .post(self.provider_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::PushGateway(format!("Batch request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::PushGateway(format!(
                "Provider returned status {}",
                response.status()
            )));
        }

        let parsed: ProviderResponse = response
            .json()
            .await
            .map_err(|e| AppError::PushGateway(format!("Malformed provider response: {e}")))?;

        let mut tickets = parsed.data.into_iter();
        let receipts = tokens
            .iter()
            .map(|token| {
                let status = match tickets.next() {
                    Some(t) if t.status == "ok" => ReceiptStatus::Ok,
                    Some(t) => ReceiptStatus::Error(
                        t.message.unwrap_or_else(|| "rejected by provider".to_string()),
                    ),
                    // Provider returned fewer tickets than tokens submitted.
                    None => ReceiptStatus::Error("no ticket returned".to_string()),
                };
                DeliveryReceipt {
                    token: token.clone(),
                    status,
                }
            })
            .collect();

        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expo_token_format() {
        assert!(is_expo_token("ExponentPushToken[abc123]"));
        assert!(!is_expo_token("ExponentPushToken[abc123"));
        assert!(!is_expo_token("fcm-token-123"));
        assert!(!is_expo_token(""));
    }

    #[tokio::test]
    async fn test_noop_gateway_receipts_match_tokens() {
        let gateway = NoOpPushGateway::default();
        let message = PushMessage {
            title: "Title".to_string(),
            body: "Body".to_string(),
            data: BTreeMap::new(),
        };
        let tokens = vec!["a".to_string(), "b".to_string()];

        let receipts = gateway.send_batch(&message, &tokens).await.unwrap();
        assert_eq!(receipts.len(), 2);
        assert!(receipts.iter().all(DeliveryReceipt::is_ok));
        assert_eq!(receipts[0].token, "a");
        assert_eq!(receipts[1].token, "b");
    }
}
