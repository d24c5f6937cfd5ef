//! Sufficient statistics for the collapsed sampler.
//!
//! `ust[u,s,t]` counts documents with user `u` and sentiment `s` currently
//! assigned topic `t`; `stw[s,t,:]` accumulates the word counts of documents
//! with sentiment `s` assigned topic `t`. Both are rebuilt from scratch at
//! initialization and resume, and mutated in place by `remove`/`add` pairs
//! during sampling. They are never serialized directly.

use ndarray::{s, Array3, Zip};

use crate::corpus::Corpus;

pub struct CountState {
    /// `nU x nS x nT`
    pub ust: Array3<f64>,
    /// `nS x nT x nW`
    pub stw: Array3<f64>,
}

impl CountState {
    /// Rebuilds both tensors from a topic assignment in one O(nD) pass,
    /// scatter-accumulating each document into its `(u, s, t)` cell and
    /// `(s, t)` word row.
    pub fn build(corpus: &Corpus, n_topics: usize, ta: &[usize]) -> CountState {
        let mut ust = Array3::zeros((corpus.n_users(), corpus.n_sentiments(), n_topics));
        let mut stw = Array3::zeros((corpus.n_sentiments(), n_topics, corpus.n_words()));
        for d in 0..corpus.n_docs() {
            let (u, s, t) = (corpus.user[d], corpus.sentiment[d], ta[d]);
            ust[[u, s, t]] += 1.0;
            Zip::from(stw.slice_mut(s![s, t, ..]))
                .and(corpus.dw.row(d))
                .for_each(|cell, &count| *cell += count as f64);
        }
        CountState { ust, stw }
    }

    /// Removes document `d`, currently assigned topic `t`, from the counts.
    pub fn remove(&mut self, corpus: &Corpus, d: usize, t: usize) {
        let (u, s) = (corpus.user[d], corpus.sentiment[d]);
        self.ust[[u, s, t]] -= 1.0;
        Zip::from(self.stw.slice_mut(s![s, t, ..]))
            .and(corpus.dw.row(d))
            .for_each(|cell, &count| *cell -= count as f64);
    }

    /// Adds document `d` back under topic `t`.
    pub fn add(&mut self, corpus: &Corpus, d: usize, t: usize) {
        let (u, s) = (corpus.user[d], corpus.sentiment[d]);
        self.ust[[u, s, t]] += 1.0;
        Zip::from(self.stw.slice_mut(s![s, t, ..]))
            .and(corpus.dw.row(d))
            .for_each(|cell, &count| *cell += count as f64);
    }
}
