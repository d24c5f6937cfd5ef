//! Batch execution of the sampler: burn-in, lots, per-lot checkpoints,
//! resume, and retry.
//!
//! Iterations are numbered from 1. Lot 0 is the burn-in phase (`1..=nburn`,
//! never recorded); lot `k >= 1` covers `nburn+(k-1)*nlot+1 ..= nburn+k*nlot`.
//! The generator is reseeded as `base_seed + lot` at the start of every lot,
//! so a resumed continuation with the same seed and lot index reproduces the
//! original run bit for bit. The lot loop is cursor-driven: on a failure the
//! cursor is reset to the lot after the last fully completed one and that lot
//! reruns under its own seed.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::corpus::Corpus;
use crate::counts::CountState;
use crate::error::{Error, Result};
use crate::sampler::GibbsSampler;
use crate::samples::SampleBuffer;

fn default_max_retries() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub n_topics: usize,
    /// Dirichlet smoothing for topic given (user, sentiment).
    pub alpha: f64,
    /// Dirichlet smoothing for word given (sentiment, topic).
    pub eta: f64,
    /// Post-burn-in iterations.
    pub n_iter: usize,
    pub n_burn: usize,
    /// Thinning interval: every `n_thin`-th iteration is recorded.
    pub n_thin: usize,
    /// Iterations per lot, the checkpoint granularity.
    pub n_lot: usize,
    pub seed: u64,
    /// Progress is logged every `n_update` iterations.
    pub n_update: usize,
    /// Consecutive failures tolerated for one lot before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_topics == 0 {
            return Err(Error::InvalidConfig("n_topics must be at least 1".into()));
        }
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return Err(Error::InvalidConfig("alpha must be strictly positive".into()));
        }
        if !(self.eta > 0.0 && self.eta.is_finite()) {
            return Err(Error::InvalidConfig("eta must be strictly positive".into()));
        }
        if self.n_thin == 0 {
            return Err(Error::InvalidConfig("n_thin must be at least 1".into()));
        }
        if self.n_lot == 0 {
            return Err(Error::InvalidConfig("n_lot must be at least 1".into()));
        }
        if self.n_update == 0 {
            return Err(Error::InvalidConfig("n_update must be at least 1".into()));
        }
        if self.n_iter == 0 {
            return Err(Error::InvalidConfig("n_iter must be at least 1".into()));
        }
        Ok(())
    }

    /// Lots 1..=niter/nlot after the burn-in lot.
    pub fn total_lots(&self) -> usize {
        self.n_iter / self.n_lot + 1
    }
}

/// Continuation of a prior run: reconstruct the assignment from this
/// checkpoint and carry on after `target_lot`.
pub struct Resume {
    pub checkpoint: Checkpoint,
    pub target_lot: usize,
}

pub struct BatchScheduler<'a> {
    corpus: &'a Corpus,
    config: RunConfig,
    out_dir: PathBuf,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(corpus: &'a Corpus, config: RunConfig, out_dir: impl Into<PathBuf>) -> Self {
        BatchScheduler {
            corpus,
            config,
            out_dir: out_dir.into(),
        }
    }

    /// Runs the full schedule (or the remainder of one, when resuming) and
    /// returns the last checkpoint written.
    pub fn run(&self, resume: Option<Resume>) -> Result<Checkpoint> {
        self.config.validate()?;
        let cfg = &self.config;
        let total_lots = cfg.total_lots();

        let (mut ta, start_lot, mut last_complete) = match resume {
            Some(resume) => {
                let (ta, lot) = self.restore_assignment(resume)?;
                (ta, lot + 1, Some(lot))
            }
            None => {
                info!(seed = cfg.seed, "initializing topic assignment at random");
                let mut rng = StdRng::seed_from_u64(cfg.seed);
                let ta: Vec<usize> = (0..self.corpus.n_docs())
                    .map(|_| rng.gen_range(0..cfg.n_topics))
                    .collect();
                (ta, 0, None)
            }
        };
        if start_lot >= total_lots {
            return Err(Error::InvalidConfig(format!(
                "resume target lot leaves nothing to run ({start_lot} of {total_lots} lots)"
            )));
        }

        // Counts are always rebuilt from the assignment; persisted tensors
        // are never trusted directly.
        let mut counts = CountState::build(self.corpus, cfg.n_topics, &ta);
        let mut buffer = SampleBuffer::new(
            self.corpus,
            cfg.n_topics,
            SampleBuffer::n_slots(cfg.n_iter, cfg.n_thin),
        );

        let mut last_report = Instant::now();
        let mut latest = None;
        let mut lot = start_lot;
        let mut attempts = 0;
        while lot < total_lots {
            match self.execute_lot(lot, &mut counts, &mut ta, &mut buffer, &mut last_report) {
                Ok(checkpoint) => {
                    info!(lot, "lot complete");
                    latest = Some(checkpoint);
                    last_complete = Some(lot);
                    attempts = 0;
                    lot += 1;
                }
                Err(err) => {
                    error!(lot, %err, "error during lot");
                    attempts += 1;
                    if attempts > cfg.max_retries {
                        return Err(Error::LotFailed { lot, attempts });
                    }
                    lot = last_complete.map_or(0, |l| l + 1);
                    warn!(lot, "resuming at lot after last completed checkpoint");
                }
            }
        }

        latest.ok_or_else(|| Error::InvalidConfig("no lots were executed".into()))
    }

    /// One lot under its own deterministic seed, ending with a checkpoint
    /// write. Any error inside is handled by the caller's retry policy.
    fn execute_lot(
        &self,
        lot: usize,
        counts: &mut CountState,
        ta: &mut Vec<usize>,
        buffer: &mut SampleBuffer,
        last_report: &mut Instant,
    ) -> Result<Checkpoint> {
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(cfg.seed + lot as u64);
        let sampler = GibbsSampler::new(self.corpus, cfg.n_topics, cfg.alpha, cfg.eta);
        let (first, last) = self.lot_bounds(lot);

        for iter in first..=last {
            sampler.sweep(counts, ta, &mut rng)?;

            if lot > 0 && iter > cfg.n_burn && iter % cfg.n_thin == 0 {
                let k = (iter - cfg.n_burn) / cfg.n_thin;
                if k >= 1 && k - 1 < buffer.n_saved() {
                    buffer.record(k - 1, counts, ta);
                }
            }

            if iter % cfg.n_update == 0 {
                info!(iter, elapsed = ?last_report.elapsed(), "progress");
                *last_report = Instant::now();
            }
        }

        let checkpoint = Checkpoint::from_buffer(buffer, lot);
        let path = self.lot_path(lot);
        checkpoint.save(&path)?;
        info!(lot, path = %path.display(), "checkpoint written");
        Ok(checkpoint)
    }

    /// First and last iteration number of a lot, inclusive.
    fn lot_bounds(&self, lot: usize) -> (usize, usize) {
        let cfg = &self.config;
        if lot == 0 {
            (1, cfg.n_burn)
        } else {
            (
                cfg.n_burn + (lot - 1) * cfg.n_lot + 1,
                cfg.n_burn + lot * cfg.n_lot,
            )
        }
    }

    fn lot_path(&self, lot: usize) -> PathBuf {
        lot_file(&self.out_dir, lot)
    }

    /// Reconstructs the assignment from the thinned-sample column
    /// `nlot/nthin * target_lot - 1` of a prior checkpoint.
    fn restore_assignment(&self, resume: Resume) -> Result<(Vec<usize>, usize)> {
        let cfg = &self.config;
        let column = (cfg.n_lot / cfg.n_thin) * resume.target_lot;
        let column = column.checked_sub(1).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "resume at lot {} selects no sample column (nlot={}, nthin={})",
                resume.target_lot, cfg.n_lot, cfg.n_thin
            ))
        })?;
        info!(
            lot = resume.target_lot,
            column, "resuming from prior checkpoint"
        );
        let ta = resume.checkpoint.assignment_at(column)?;
        if ta.len() != self.corpus.n_docs() {
            return Err(Error::CorpusShape(format!(
                "checkpoint assignment covers {} documents, corpus has {}",
                ta.len(),
                self.corpus.n_docs()
            )));
        }
        if ta.iter().any(|&t| t >= cfg.n_topics) {
            return Err(Error::InvalidConfig(
                "checkpoint assignment references a topic outside [0, n_topics)".into(),
            ));
        }
        Ok((ta, resume.target_lot))
    }
}

/// Where a completed lot's checkpoint lives under `out_dir`.
pub fn lot_file(out_dir: &Path, lot: usize) -> PathBuf {
    out_dir.join(format!("lot_{lot}.json"))
}
