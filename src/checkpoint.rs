//! Durable state: the accumulated sample buffer plus the index of the last
//! fully completed lot, serialized as JSON after every lot. Checkpoints are
//! read back only at resume or merge time; the scheduler rebuilds count
//! tensors from the stored assignment rather than trusting persisted counts.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::samples::SampleBuffer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// `nU x nS x nT x nSaved`
    pub ust: Array4<f64>,
    /// `nS x nT x nW x nSaved`
    pub stw: Array4<f64>,
    /// `nD x nSaved`
    pub ta: Array2<f64>,
    /// Absent from the final merged output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_complete_lot: Option<usize>,
}

impl Checkpoint {
    pub fn from_buffer(buffer: &SampleBuffer, last_complete_lot: usize) -> Checkpoint {
        Checkpoint {
            ust: buffer.ust.clone(),
            stw: buffer.stw.clone(),
            ta: buffer.ta.clone(),
            last_complete_lot: Some(last_complete_lot),
        }
    }

    /// Full overwrite of `path`; a crash mid-write can corrupt at most the
    /// in-flight file, earlier lot files stay intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|source| Error::CheckpointWrite {
            path: PathBuf::from(path),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Checkpoint> {
        let file = File::open(path).map_err(|source| Error::CheckpointRead {
            path: PathBuf::from(path),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn n_saved(&self) -> usize {
        self.ta.ncols()
    }

    /// The topic assignment stored in sample column `column`.
    pub fn assignment_at(&self, column: usize) -> Result<Vec<usize>> {
        if column >= self.n_saved() {
            return Err(Error::ResumeColumn {
                column,
                available: self.n_saved(),
            });
        }
        Ok(self.ta.column(column).iter().map(|&t| t as usize).collect())
    }
}
