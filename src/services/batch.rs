// src/services/batch.rs
//! Batch Coordinator
//!
//! Fans one engine operation out over a list of items, collecting per-item
//! success or failure without aborting the batch on the first error. Results
//! are always index-aligned with the input: callers correlate by position,
//! not by completion order. Verification lookups run with bounded
//! parallelism; mints run sequentially because one signer's transactions
//! are nonce-ordered.

use crate::error::EngineError;
use crate::models::certificate::{MintRequest, TransactionOutcome, VerificationResult};
use crate::services::certificate_engine::CertificateEngine;
use crate::services::query::VerificationQuery;
use ethers::types::U256;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// Upper bound on items per batch request, chosen against observed
/// rate-limit and gas-cost behavior.
pub const MAX_BATCH_SIZE: usize = 50;

/// Per-item outcome, positioned at its input index.
#[derive(Debug, Serialize)]
pub struct BatchItem<T> {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

/// Whole-batch report. `total`, `succeeded` and `failed` are always
/// reported together.
#[derive(Debug, Serialize)]
pub struct BatchReport<T> {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItem<T>>,
}

impl<T> BatchReport<T> {
    fn collect(results: Vec<Result<T, EngineError>>) -> Self {
        let total = results.len();
        let mut succeeded = 0;
        let items = results
            .into_iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(value) => {
                    succeeded += 1;
                    BatchItem {
                        index,
                        success: true,
                        result: Some(value),
                        error: None,
                        error_kind: None,
                    }
                }
                Err(e) => BatchItem {
                    index,
                    success: false,
                    result: None,
                    error: Some(e.to_string()),
                    error_kind: Some(e.kind()),
                },
            })
            .collect();
        BatchReport {
            total,
            succeeded,
            failed: total - succeeded,
            results: items,
        }
    }
}

/// Rejects oversized batches before any chain call is made.
fn check_size(requested: usize) -> Result<(), EngineError> {
    if requested > MAX_BATCH_SIZE {
        return Err(EngineError::BatchTooLarge {
            requested,
            max: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

/// Runs `op` for indices `0..count` with bounded parallelism, returning
/// results in input order. `buffered` preserves ordering regardless of
/// completion order, which is the index-stability the coordinator promises.
async fn run_ordered<T, F, Fut>(
    count: usize,
    concurrency: usize,
    op: F,
) -> Vec<Result<T, EngineError>>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    stream::iter(0..count)
        .map(op)
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Coordinates batched mints and verifications.
pub struct BatchCoordinator {
    engine: Arc<CertificateEngine>,
    query: Arc<VerificationQuery>,
    concurrency: usize,
}

impl BatchCoordinator {
    pub fn new(
        engine: Arc<CertificateEngine>,
        query: Arc<VerificationQuery>,
        concurrency: usize,
    ) -> Self {
        BatchCoordinator {
            engine,
            query,
            concurrency,
        }
    }

    /// Verifies up to `MAX_BATCH_SIZE` token IDs. Returns exactly one
    /// result per input ID, index-aligned, no matter how many individual
    /// lookups fail.
    pub async fn verify_many(
        &self,
        token_ids: &[U256],
    ) -> Result<BatchReport<VerificationResult>, EngineError> {
        check_size(token_ids.len())?;
        let results = run_ordered(token_ids.len(), self.concurrency, |i| {
            let query = Arc::clone(&self.query);
            let token_id = token_ids[i];
            async move { Ok(query.verify_token(token_id).await) }
        })
        .await;
        Ok(BatchReport::collect(results))
    }

    /// Mints up to `MAX_BATCH_SIZE` certificates, sequentially, collecting
    /// each item's outcome or error without early exit.
    pub async fn mint_many(
        &self,
        requests: &[MintRequest],
    ) -> Result<BatchReport<TransactionOutcome>, EngineError> {
        check_size(requests.len())?;
        let results = run_ordered(requests.len(), 1, |i| {
            let engine = Arc::clone(&self.engine);
            let request = requests[i].clone();
            async move { engine.mint(&request).await }
        })
        .await;
        let report = BatchReport::collect(results);
        log::info!(
            "batch mint finished total={} succeeded={} failed={}",
            report.total,
            report.succeeded,
            report.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_size_limit_boundary() {
        assert!(check_size(0).is_ok());
        assert!(check_size(MAX_BATCH_SIZE).is_ok());
        match check_size(MAX_BATCH_SIZE + 1) {
            Err(EngineError::BatchTooLarge { requested, max }) => {
                assert_eq!(requested, 51);
                assert_eq!(max, 50);
            }
            other => panic!("expected BatchTooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_ordered_is_index_stable() {
        // Earlier items sleep longer, so completion order is reversed;
        // results must still come back in input order.
        let results = run_ordered(4, 4, |i| async move {
            tokio::time::sleep(Duration::from_millis(40 - 10 * i as u64)).await;
            Ok::<usize, EngineError>(i)
        })
        .await;
        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_run_ordered_does_not_abort_on_failure() {
        let results = run_ordered(3, 2, |i| async move {
            if i == 1 {
                Err(EngineError::NetworkError("node unreachable".to_string()))
            } else {
                Ok(i)
            }
        })
        .await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn test_report_counts_and_positions() {
        let results = run_ordered(5, 1, |i| async move {
            if i % 2 == 1 {
                Err(EngineError::CertificateNotFound(i.to_string()))
            } else {
                Ok(i * 10)
            }
        })
        .await;
        let report = BatchReport::collect(results);
        assert_eq!(report.total, 5);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 2);
        for (index, item) in report.results.iter().enumerate() {
            assert_eq!(item.index, index);
        }
        assert_eq!(report.results[1].error_kind, Some("certificate_not_found"));
        assert_eq!(report.results[2].result, Some(20));
    }
}
