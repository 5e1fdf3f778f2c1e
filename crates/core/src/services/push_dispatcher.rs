//! Push dispatcher service.
//!
//! Fans one message out to a token list: validates tokens against the
//! provider's format rule, partitions into provider-sized batches, and
//! submits batches concurrently with per-batch timeouts. A failed or
//! timed-out batch is logged and contributes no receipts; it never aborts
//! its siblings.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::services::push_gateway::{DeliveryReceipt, PushGatewayService, PushMessage};

/// Push dispatcher service.
#[derive(Clone)]
pub struct PushDispatcher {
    gateway: PushGatewayService,
    batch_timeout: Duration,
}

impl PushDispatcher {
    /// Create a new push dispatcher.
    #[must_use]
    pub fn new(gateway: PushGatewayService, batch_timeout: Duration) -> Self {
        Self {
            gateway,
            batch_timeout,
        }
    }

    /// Send one message to every valid token in the list.
    ///
    /// Returns the receipts aggregated from all batches that the provider
    /// accepted, in submission order. Receipt-count shortfall (not an
    /// error) is how batch loss surfaces to the caller.
    pub async fn send_batch(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: BTreeMap<String, String>,
    ) -> Vec<DeliveryReceipt> {
        let valid: Vec<String> = tokens
            .iter()
            .filter(|t| {
                let ok = self.gateway.is_valid_token(t);
                if !ok {
                    tracing::warn!(token = %t, "Skipping malformed push token");
                }
                ok
            })
            .cloned()
            .collect();

        if valid.is_empty() {
            return Vec::new();
        }

        let message = PushMessage {
            title: title.to_string(),
            body: body.to_string(),
            data,
        };

        let batch_size = self.gateway.max_batch_size().max(1);
        let submissions = valid.chunks(batch_size).enumerate().map(|(index, chunk)| {
            let gateway = self.gateway.clone();
            let message = message.clone();
            async move {
                match tokio::time::timeout(self.batch_timeout, gateway.send_batch(&message, chunk))
                    .await
                {
                    Ok(Ok(receipts)) => receipts,
                    Ok(Err(e)) => {
                        tracing::warn!(batch = index, error = %e, "Push batch submission failed");
                        Vec::new()
                    }
                    Err(_) => {
                        tracing::warn!(batch = index, "Push batch submission timed out");
                        Vec::new()
                    }
                }
            }
        });

        // join_all runs the batches concurrently but yields results in
        // submission order regardless of completion order.
        let receipts: Vec<DeliveryReceipt> = futures::future::join_all(submissions)
            .await
            .into_iter()
            .flatten()
            .collect();

        let errors = receipts.iter().filter(|r| !r.is_ok()).count();
        tracing::info!(
            submitted = valid.len(),
            receipts = receipts.len(),
            errors = errors,
            "Push dispatch completed"
        );

        receipts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::push_gateway::{PushGateway, ReceiptStatus};
    use async_trait::async_trait;
    use schoolhub_common::{AppError, AppResult};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Gateway that records submitted batches and can fail or stall
    /// specific ones.
    struct RecordingGateway {
        max_batch_size: usize,
        fail_batches: Vec<usize>,
        slow_batches: Vec<usize>,
        calls: Mutex<Vec<Vec<String>>>,
        call_counter: AtomicUsize,
    }

    impl RecordingGateway {
        fn new(max_batch_size: usize, fail_batches: Vec<usize>) -> Self {
            Self {
                max_batch_size,
                fail_batches,
                slow_batches: Vec::new(),
                calls: Mutex::new(Vec::new()),
                call_counter: AtomicUsize::new(0),
            }
        }

        fn stalling(max_batch_size: usize, slow_batches: Vec<usize>) -> Self {
            Self {
                slow_batches,
                ..Self::new(max_batch_size, Vec::new())
            }
        }
    }

    #[async_trait]
    impl PushGateway for RecordingGateway {
        fn is_valid_token(&self, token: &str) -> bool {
            token.starts_with("ExponentPushToken[") && token.ends_with(']')
        }

        fn max_batch_size(&self) -> usize {
            self.max_batch_size
        }

        async fn send_batch(
            &self,
            _message: &PushMessage,
            tokens: &[String],
        ) -> AppResult<Vec<DeliveryReceipt>> {
            let index = self.call_counter.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().await.push(tokens.to_vec());
            if self.fail_batches.contains(&index) {
                return Err(AppError::PushGateway("simulated batch failure".into()));
            }
            if self.slow_batches.contains(&index) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(tokens
                .iter()
                .map(|t| DeliveryReceipt {
                    token: t.clone(),
                    status: ReceiptStatus::Ok,
                })
                .collect())
        }
    }

    fn tokens(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("ExponentPushToken[{i}]")).collect()
    }

    #[tokio::test]
    async fn test_partitions_into_provider_sized_batches() {
        let gateway = Arc::new(RecordingGateway::new(2, vec![]));
        let dispatcher = PushDispatcher::new(gateway.clone(), Duration::from_secs(5));

        let receipts = dispatcher
            .send_batch(&tokens(5), "t", "b", BTreeMap::new())
            .await;

        assert_eq!(receipts.len(), 5);
        let calls = gateway.calls.lock().await;
        assert_eq!(calls.len(), 3);
        assert_eq!(calls.iter().map(Vec::len).sum::<usize>(), 5);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_abort_siblings() {
        // 6 tokens, batch size 2 -> 3 batches; batch 1 (the middle) fails.
        let gateway = Arc::new(RecordingGateway::new(2, vec![1]));
        let dispatcher = PushDispatcher::new(gateway.clone(), Duration::from_secs(5));

        let receipts = dispatcher
            .send_batch(&tokens(6), "t", "b", BTreeMap::new())
            .await;

        // Loss is visible via receipt-count shortfall, not via an error.
        assert_eq!(receipts.len(), 4);
        assert_eq!(gateway.calls.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_timed_out_batch_is_treated_as_failed() {
        // 6 tokens, batch size 2 -> 3 batches; batch 1 stalls past the
        // dispatcher's timeout.
        let gateway = Arc::new(RecordingGateway::stalling(2, vec![1]));
        let dispatcher = PushDispatcher::new(gateway.clone(), Duration::from_millis(50));

        let receipts = dispatcher
            .send_batch(&tokens(6), "t", "b", BTreeMap::new())
            .await;

        // The stalled batch contributes no receipts; its siblings complete.
        assert_eq!(receipts.len(), 4);
        assert_eq!(gateway.calls.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_tokens_are_filtered_not_fatal() {
        let gateway = Arc::new(RecordingGateway::new(100, vec![]));
        let dispatcher = PushDispatcher::new(gateway.clone(), Duration::from_secs(5));

        let mut list = tokens(5);
        list.push("not-a-push-token".to_string());

        let receipts = dispatcher
            .send_batch(&list, "t", "b", BTreeMap::new())
            .await;

        assert_eq!(receipts.len(), 5);
        let calls = gateway.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 5);
        assert!(!calls[0].contains(&"not-a-push-token".to_string()));
    }

    #[tokio::test]
    async fn test_empty_input_submits_nothing() {
        let gateway = Arc::new(RecordingGateway::new(100, vec![]));
        let dispatcher = PushDispatcher::new(gateway.clone(), Duration::from_secs(5));

        let receipts = dispatcher
            .send_batch(&[], "t", "b", BTreeMap::new())
            .await;

        assert!(receipts.is_empty());
        assert!(gateway.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_all_invalid_submits_nothing() {
        let gateway = Arc::new(RecordingGateway::new(100, vec![]));
        let dispatcher = PushDispatcher::new(gateway.clone(), Duration::from_secs(5));

        let receipts = dispatcher
            .send_batch(
                &["junk".to_string(), "more junk".to_string()],
                "t",
                "b",
                BTreeMap::new(),
            )
            .await;

        assert!(receipts.is_empty());
        assert!(gateway.calls.lock().await.is_empty());
    }
}
