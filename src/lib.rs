//! Sentiment-aware LDA inferred by collapsed Gibbs sampling, run as a
//! resumable, checkpointed batch job.
//!
//! Documents carry a user and a discretized rating (sentiment); the sampler
//! maintains user-sentiment-topic and sentiment-topic-word count tensors and
//! resamples one topic label per document per sweep. Sweeps are grouped into
//! lots; each completed lot persists the thinned, normalized sample buffer
//! as a JSON checkpoint that a later run can resume from, and checkpoints
//! from runs covering disjoint lot ranges can be merged offline.

pub mod checkpoint;
pub mod corpus;
pub mod counts;
pub mod error;
pub mod merge;
pub mod sampler;
pub mod samples;
pub mod scheduler;

pub use checkpoint::Checkpoint;
pub use corpus::Corpus;
pub use counts::CountState;
pub use error::{Error, Result};
pub use merge::{merge_checkpoints, MergedResults};
pub use sampler::GibbsSampler;
pub use samples::SampleBuffer;
pub use scheduler::{lot_file, BatchScheduler, Resume, RunConfig};
