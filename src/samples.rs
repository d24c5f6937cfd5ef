//! Accumulation of thinned, normalized posterior snapshots.
//!
//! The buffer is preallocated with `floor(niter / nthin) - 1` slots and
//! zero-filled; a slot stays exactly zero until the scheduler records into
//! it. Checkpoint merging relies on that zero-padding to tile disjoint
//! iteration ranges.

use ndarray::{s, Array2, Array4};

use crate::corpus::Corpus;
use crate::counts::CountState;

pub struct SampleBuffer {
    /// `nU x nS x nT x nSaved`; each written `[u, s, :, i]` row sums to 1.
    pub ust: Array4<f64>,
    /// `nS x nT x nW x nSaved`; each written `[s, t, :, i]` row sums to 1.
    pub stw: Array4<f64>,
    /// `nD x nSaved` topic assignments, stored as f64 for the checkpoint
    /// schema.
    pub ta: Array2<f64>,
}

impl SampleBuffer {
    /// Number of thinned slots for a run of `n_iter` post-burn-in
    /// iterations.
    pub fn n_slots(n_iter: usize, n_thin: usize) -> usize {
        (n_iter / n_thin).saturating_sub(1)
    }

    pub fn new(corpus: &Corpus, n_topics: usize, n_saved: usize) -> SampleBuffer {
        SampleBuffer {
            ust: Array4::zeros((corpus.n_users(), corpus.n_sentiments(), n_topics, n_saved)),
            stw: Array4::zeros((corpus.n_sentiments(), n_topics, corpus.n_words(), n_saved)),
            ta: Array2::zeros((corpus.n_docs(), n_saved)),
        }
    }

    pub fn n_saved(&self) -> usize {
        self.ta.ncols()
    }

    /// Records a normalized snapshot of the current counts and assignment
    /// into slot `idx`. Rows that sum to zero are left as zeros.
    pub fn record(&mut self, idx: usize, counts: &CountState, ta: &[usize]) {
        let (n_users, n_sentiments, n_topics, _) = self.ust.dim();
        let n_words = self.stw.dim().2;

        for u in 0..n_users {
            for s in 0..n_sentiments {
                let row = counts.ust.slice(s![u, s, ..]);
                let total = row.sum();
                if total > 0.0 {
                    for t in 0..n_topics {
                        self.ust[[u, s, t, idx]] = row[t] / total;
                    }
                }
            }
        }
        for s in 0..n_sentiments {
            for t in 0..n_topics {
                let row = counts.stw.slice(s![s, t, ..]);
                let total = row.sum();
                if total > 0.0 {
                    for w in 0..n_words {
                        self.stw[[s, t, w, idx]] = row[w] / total;
                    }
                }
            }
        }
        for (d, &t) in ta.iter().enumerate() {
            self.ta[[d, idx]] = t as f64;
        }
    }
}
