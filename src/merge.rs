//! Offline combination of two checkpoints that tiled disjoint iteration
//! ranges (e.g. lots 0-5 on one machine, lots 6-15 on another).
//!
//! For every position the first file's value wins unless it is exactly zero,
//! in which case the second file's fills in. That policy is only meaningful
//! when at most one input has written any given slot, so disjointness is
//! validated up front instead of assumed: a shape-compatible key where both
//! inputs are nonzero at the same slot fails the merge. A shape mismatch on
//! a key is logged and that key is dropped; the remaining keys still merge.

use ndarray::{Array, Dimension, Zip};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::checkpoint::Checkpoint;
use crate::error::{Error, Result};

/// Merge output: checkpoint schema minus the lot marker, with any
/// shape-mismatched key absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ust: Option<ndarray::Array4<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stw: Option<ndarray::Array4<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ta: Option<ndarray::Array2<f64>>,
}

pub fn merge_checkpoints(first: &Checkpoint, second: &Checkpoint) -> Result<MergedResults> {
    Ok(MergedResults {
        ust: merge_key("ust", &first.ust, &second.ust)?,
        stw: merge_key("stw", &first.stw, &second.stw)?,
        ta: merge_key("ta", &first.ta, &second.ta)?,
    })
}

fn merge_key<D: Dimension>(
    key: &'static str,
    first: &Array<f64, D>,
    second: &Array<f64, D>,
) -> Result<Option<Array<f64, D>>> {
    if first.shape() != second.shape() {
        warn!(
            key,
            first = ?first.shape(),
            second = ?second.shape(),
            "incompatible shapes, dropping key from merge output"
        );
        return Ok(None);
    }

    let mut overlap = 0usize;
    Zip::from(first).and(second).for_each(|&a, &b| {
        if a != 0.0 && b != 0.0 {
            overlap += 1;
        }
    });
    if overlap > 0 {
        return Err(Error::MergeOverlap { key, slots: overlap });
    }

    Ok(Some(Zip::from(first).and(second).map_collect(
        |&a, &b| if a != 0.0 { a } else { b },
    )))
}
