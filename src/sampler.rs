//! Collapsed Gibbs resampling of per-document topic assignments.
//!
//! Continuous model parameters are integrated out; each sweep resamples every
//! document's topic from the Dirichlet-multinomial posterior conditioned on
//! the current `ust`/`stw` counts with that document removed. Sweep order is
//! fixed ascending so a seeded generator reproduces runs exactly.

use ndarray::s;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use statrs::function::gamma::ln_gamma;

use crate::corpus::Corpus;
use crate::counts::CountState;
use crate::error::{Error, Result};

pub struct GibbsSampler<'a> {
    corpus: &'a Corpus,
    n_topics: usize,
    alpha: f64,
    eta: f64,
}

impl<'a> GibbsSampler<'a> {
    /// `alpha` smooths topic-given-(user, sentiment); `eta` smooths
    /// word-given-(sentiment, topic). Both must be strictly positive, which
    /// `RunConfig::validate` enforces before a sampler is ever constructed.
    pub fn new(corpus: &'a Corpus, n_topics: usize, alpha: f64, eta: f64) -> GibbsSampler<'a> {
        GibbsSampler {
            corpus,
            n_topics,
            alpha,
            eta,
        }
    }

    /// One full sweep: resamples documents `0..nD` in ascending order,
    /// mutating `counts` and `ta` in place.
    pub fn sweep<R: Rng>(
        &self,
        counts: &mut CountState,
        ta: &mut [usize],
        rng: &mut R,
    ) -> Result<()> {
        for d in 0..self.corpus.n_docs() {
            let t_new = self.resample_doc(d, ta[d], counts, rng)?;
            ta[d] = t_new;
        }
        Ok(())
    }

    fn resample_doc<R: Rng>(
        &self,
        d: usize,
        t_old: usize,
        counts: &mut CountState,
        rng: &mut R,
    ) -> Result<usize> {
        counts.remove(self.corpus, d, t_old);

        let (u, s) = (self.corpus.user[d], self.corpus.sentiment[d]);
        let doc = self.corpus.dw.row(d);
        let doc_total: f64 = doc.iter().map(|&c| c as f64).sum();

        let us_row = counts.ust.slice(s![u, s, ..]);
        let us_denom = self.n_topics as f64 * self.alpha + us_row.sum();
        let eta_total = self.eta * self.corpus.n_words() as f64;

        let mut log_weights = Vec::with_capacity(self.n_topics);
        for t in 0..self.n_topics {
            let mut lw = ((self.alpha + us_row[t]) / us_denom).ln();

            let stw_row = counts.stw.slice(s![s, t, ..]);
            let smoothed_total = stw_row.sum() + eta_total;
            lw += ln_gamma(smoothed_total) - ln_gamma(smoothed_total + doc_total);
            // lnG(c+eta+dw) - lnG(c+eta) vanishes where dw is zero, so only
            // the document's own words contribute.
            for (w, &count) in doc.iter().enumerate() {
                if count > 0 {
                    let smoothed = stw_row[w] + self.eta;
                    lw += ln_gamma(smoothed + count as f64) - ln_gamma(smoothed);
                }
            }
            log_weights.push(lw);
        }

        // Max-subtraction keeps the exponentials in range.
        let max_lw = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut probs: Vec<f64> = log_weights.iter().map(|lw| (lw - max_lw).exp()).collect();
        let total: f64 = probs.iter().sum();
        for p in &mut probs {
            *p /= total;
        }

        let dist = WeightedIndex::new(&probs).map_err(|_| Error::InvalidWeights { doc: d })?;
        let t_new = dist.sample(rng);

        counts.add(self.corpus, d, t_new);
        Ok(t_new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn corpus() -> Corpus {
        let dw = array![
            [2u64, 0, 1],
            [0, 3, 0],
            [1, 1, 1],
            [0, 0, 2],
            [3, 0, 0],
        ];
        let users: Vec<String> = ["a", "b", "a", "b", "a"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Corpus::from_parts(dw, &[1.0, 5.0, 1.0, 5.0, 1.0], &users).unwrap()
    }

    fn random_assignment(n_docs: usize, n_topics: usize, seed: u64) -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n_docs).map(|_| rng.gen_range(0..n_topics)).collect()
    }

    #[test]
    fn sweep_preserves_word_mass() {
        let corpus = corpus();
        let mut ta = random_assignment(corpus.n_docs(), 2, 7);
        let mut counts = CountState::build(&corpus, 2, &ta);
        let sampler = GibbsSampler::new(&corpus, 2, 0.1, 0.1);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            sampler.sweep(&mut counts, &mut ta, &mut rng).unwrap();
        }
        let total_words: f64 = corpus.dw.iter().map(|&c| c as f64).sum();
        approx::assert_abs_diff_eq!(counts.stw.sum(), total_words, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(counts.ust.sum(), corpus.n_docs() as f64, epsilon = 1e-9);
    }

    #[test]
    fn sweep_keeps_counts_consistent_with_assignment() {
        let corpus = corpus();
        let mut ta = random_assignment(corpus.n_docs(), 3, 11);
        let mut counts = CountState::build(&corpus, 3, &ta);
        let sampler = GibbsSampler::new(&corpus, 3, 0.5, 0.01);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..5 {
            sampler.sweep(&mut counts, &mut ta, &mut rng).unwrap();
        }
        let rebuilt = CountState::build(&corpus, 3, &ta);
        assert_eq!(counts.ust, rebuilt.ust);
        assert_eq!(counts.stw, rebuilt.stw);
    }

    #[test]
    fn identical_seeds_produce_identical_chains() {
        let corpus = corpus();
        let sampler = GibbsSampler::new(&corpus, 2, 0.01, 0.01);

        let run = |seed: u64| {
            let mut ta = random_assignment(corpus.n_docs(), 2, seed);
            let mut counts = CountState::build(&corpus, 2, &ta);
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..20 {
                sampler.sweep(&mut counts, &mut ta, &mut rng).unwrap();
            }
            (ta, counts.ust, counts.stw)
        };

        let (ta_a, ust_a, stw_a) = run(42);
        let (ta_b, ust_b, stw_b) = run(42);
        assert_eq!(ta_a, ta_b);
        assert_eq!(ust_a, ust_b);
        assert_eq!(stw_a, stw_b);
    }

    #[test]
    fn topic_assignments_stay_in_range() {
        let corpus = corpus();
        let n_topics = 4;
        let mut ta = random_assignment(corpus.n_docs(), n_topics, 3);
        let mut counts = CountState::build(&corpus, n_topics, &ta);
        let sampler = GibbsSampler::new(&corpus, n_topics, 1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10 {
            sampler.sweep(&mut counts, &mut ta, &mut rng).unwrap();
            assert!(ta.iter().all(|&t| t < n_topics));
        }
    }
}
