//! Cache-aware prediction over single items and ordered batches.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::debug;

use crate::application::model::{PredictError, Predictor};
use crate::cache::{CacheKey, PredictionCache};
use crate::domain::error::ValidationError;
use crate::domain::features::{FeatureVector, validate_batch};

pub(crate) const METRIC_PREDICT_ITEMS: &str = "scorecast_predict_items_total";
pub(crate) const METRIC_PREDICT_MS: &str = "scorecast_predict_ms";
pub(crate) const METRIC_BATCH_SIZE: &str = "scorecast_batch_size";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("prediction failed")]
    Predict(#[from] PredictError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Largest accepted batch; larger batches are rejected, never truncated.
    pub max_size: usize,
    /// Cache misses are handed to the model this many at a time.
    pub chunk_size: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_size: 100,
            chunk_size: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction<T> {
    pub value: T,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem<T> {
    pub index: usize,
    pub value: T,
    pub cached: bool,
}

/// Batch result, index-aligned with the request.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    pub items: Vec<BatchItem<T>>,
    pub cache_hits: usize,
    pub fresh: usize,
}

impl<T> BatchOutcome<T> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            cache_hits: 0,
            fresh: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|item| &item.value)
    }
}

pub struct BatchOrchestrator<P> {
    predictor: Arc<P>,
    cache: Arc<PredictionCache>,
    limits: BatchLimits,
}

impl<P> Clone for BatchOrchestrator<P> {
    fn clone(&self) -> Self {
        Self {
            predictor: self.predictor.clone(),
            cache: self.cache.clone(),
            limits: self.limits,
        }
    }
}

impl<P: Predictor> BatchOrchestrator<P> {
    pub fn new(predictor: Arc<P>, cache: Arc<PredictionCache>, limits: BatchLimits) -> Self {
        Self {
            predictor,
            cache,
            limits: BatchLimits {
                chunk_size: limits.chunk_size.max(1),
                ..limits
            },
        }
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    pub async fn predict_one(
        &self,
        features: &FeatureVector,
    ) -> Result<Prediction<P::Output>, OrchestratorError> {
        features.validate()?;

        let key = CacheKey::for_features(P::NAMESPACE, features);
        if let Some(value) = self.cache.get::<P::Output>(&key).await {
            return Ok(Prediction {
                value,
                cached: true,
            });
        }

        let started = Instant::now();
        let value = self.predictor.predict(features)?;
        self.record_fresh(1, started);

        self.cache.set(&key, &value).await;
        Ok(Prediction {
            value,
            cached: false,
        })
    }

    pub async fn predict_batch(
        &self,
        items: &[FeatureVector],
    ) -> Result<BatchOutcome<P::Output>, OrchestratorError> {
        validate_batch(items, self.limits.max_size)?;
        if items.is_empty() {
            return Ok(BatchOutcome::empty());
        }

        histogram!(METRIC_BATCH_SIZE, "model" => P::NAME).record(items.len() as f64);

        let keys: Vec<CacheKey> = items
            .iter()
            .map(|features| CacheKey::for_features(P::NAMESPACE, features))
            .collect();
        let cached: Vec<Option<P::Output>> = self.cache.batch_get(&keys).await;

        let misses: Vec<usize> = cached
            .iter()
            .enumerate()
            .filter_map(|(index, hit)| hit.is_none().then_some(index))
            .collect();

        let mut fresh_values: Vec<P::Output> = Vec::with_capacity(misses.len());
        if !misses.is_empty() {
            let started = Instant::now();
            for chunk in misses.chunks(self.limits.chunk_size) {
                let inputs: Vec<FeatureVector> = chunk.iter().map(|&index| items[index]).collect();
                let outputs = self.predictor.predict_many(&inputs)?;
                if outputs.len() != inputs.len() {
                    return Err(PredictError::OutputCount {
                        expected: inputs.len(),
                        actual: outputs.len(),
                    }
                    .into());
                }
                fresh_values.extend(outputs);
            }
            self.record_fresh(misses.len(), started);

            let entries: Vec<(CacheKey, P::Output)> = misses
                .iter()
                .zip(&fresh_values)
                .map(|(&index, value)| (keys[index].clone(), value.clone()))
                .collect();
            self.cache.batch_set(&entries).await;
        }

        // misses are ascending, so fresh values line up with the gaps in order
        let fresh = fresh_values.len();
        let mut fresh_values = fresh_values.into_iter();
        let items = cached
            .into_iter()
            .enumerate()
            .map(|(index, hit)| match hit {
                Some(value) => Ok(BatchItem {
                    index,
                    value,
                    cached: true,
                }),
                None => fresh_values
                    .next()
                    .map(|value| BatchItem {
                        index,
                        value,
                        cached: false,
                    })
                    .ok_or(PredictError::OutputCount {
                        expected: misses.len(),
                        actual: fresh,
                    }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let cache_hits = items.len() - fresh;
        debug!(
            target = "scorecast::orchestrator",
            model = P::NAME,
            total = items.len(),
            cache_hits,
            fresh,
            "batch prediction complete"
        );

        Ok(BatchOutcome {
            items,
            cache_hits,
            fresh,
        })
    }

    fn record_fresh(&self, count: usize, started: Instant) {
        counter!(METRIC_PREDICT_ITEMS, "model" => P::NAME).increment(count as u64);
        histogram!(METRIC_PREDICT_MS, "model" => P::NAME)
            .record(started.elapsed().as_secs_f64() * 1000.0);
    }
}
