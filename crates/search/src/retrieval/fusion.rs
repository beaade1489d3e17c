//! Weighted Reciprocal Rank Fusion (RRF)
//!
//! `fused(r) = Σ_m w_m / (k + rank_m(r))` over the methods whose list
//! contains `r`. RRF works on ranks only, so the methods' raw score scales
//! never need normalising. Fused scores are returned as computed.

use super::{Method, RankedList};
use crate::weights::WeightSet;
use rankforge_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Default RRF constant
pub const DEFAULT_RRF_K: u32 = 60;

/// Upper bound on fused results per request
pub const MAX_FUSED_RESULTS: usize = 1000;

/// One value per method, absent when the method did not rank the record
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodValues<T> {
    pub dense: Option<T>,
    pub sparse: Option<T>,
    pub pattern: Option<T>,
    pub fuzzy: Option<T>,
}

impl<T: Copy> MethodValues<T> {
    pub fn get(&self, method: Method) -> Option<T> {
        match method {
            Method::Dense => self.dense,
            Method::Sparse => self.sparse,
            Method::Pattern => self.pattern,
            Method::Fuzzy => self.fuzzy,
        }
    }

    pub fn set(&mut self, method: Method, value: T) {
        let slot = match method {
            Method::Dense => &mut self.dense,
            Method::Sparse => &mut self.sparse,
            Method::Pattern => &mut self.pattern,
            Method::Fuzzy => &mut self.fuzzy,
        };
        *slot = Some(value);
    }
}

/// A record's fused position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedHit {
    pub record_id: Uuid,
    pub method_scores: MethodValues<f64>,
    pub method_ranks: MethodValues<usize>,
    pub fused_score: f64,
}

/// RRF parameters for one request
#[derive(Debug, Clone, Copy)]
pub struct RRFusion {
    k: u32,
    weights: WeightSet,
}

impl RRFusion {
    /// Fails with `InvalidRrfK` for `k < 1` and `NoEnabledMethod` when every
    /// weight is at or below the disable threshold.
    pub fn new(k: u32, weights: WeightSet) -> Result<Self> {
        if k < 1 {
            return Err(AppError::InvalidRrfK { value: k });
        }
        if weights.enabled().next().is_none() {
            return Err(AppError::NoEnabledMethod);
        }
        Ok(Self { k, weights })
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn weights(&self) -> &WeightSet {
        &self.weights
    }

    /// Fuse ranked lists into at most `match_count` hits.
    ///
    /// Lists of disabled methods are ignored. Ties in fused score are broken
    /// by record id ascending.
    pub fn fuse(&self, lists: &[RankedList], match_count: usize) -> Result<Vec<FusedHit>> {
        if match_count < 1 || match_count > MAX_FUSED_RESULTS {
            return Err(AppError::InvalidMatchCount {
                value: match_count,
                max: MAX_FUSED_RESULTS,
            });
        }

        let k = self.k as f64;
        let mut fused: HashMap<Uuid, FusedHit> = HashMap::new();

        for list in lists {
            if !self.weights.is_enabled(list.method) {
                continue;
            }
            let weight = self.weights.get(list.method);

            for hit in &list.hits {
                let entry = fused.entry(hit.record_id).or_insert_with(|| FusedHit {
                    record_id: hit.record_id,
                    method_scores: MethodValues::default(),
                    method_ranks: MethodValues::default(),
                    fused_score: 0.0,
                });
                // First occurrence wins if a list repeats an id
                if entry.method_ranks.get(list.method).is_some() {
                    continue;
                }
                entry.method_scores.set(list.method, hit.raw_score);
                entry.method_ranks.set(list.method, hit.rank);
                entry.fused_score += weight / (k + hit.rank as f64);
            }
        }

        let mut results: Vec<FusedHit> = fused.into_values().collect();
        results.sort_by(|a, b| {
            b.fused_score
                .total_cmp(&a.fused_score)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        results.truncate(match_count);

        Ok(results)
    }
}
