//! Corpus construction: the document-word table plus per-document rating and
//! user arrays handed over by the preprocessing pipeline.
//!
//! Ratings are mapped to contiguous sentiment indices by ascending raw value;
//! user labels are mapped to contiguous indices by ascending label. Both maps
//! are retained so downstream consumers can translate indices back.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::error::{Error, Result};

pub struct Corpus {
    /// Document-word count table, `nD x nW`.
    pub dw: Array2<u64>,
    /// Per-document user index in `[0, n_users)`.
    pub user: Vec<usize>,
    /// Per-document sentiment index in `[0, n_sentiments)`.
    pub sentiment: Vec<usize>,
    /// Distinct raw rating values, ascending; index = sentiment category.
    pub sentiment_levels: Vec<f64>,
    /// Distinct user labels, ascending; index = user category.
    pub user_labels: Vec<String>,
}

impl Corpus {
    /// Builds a corpus from already-loaded arrays. Fails fast on missing or
    /// mismatched inputs, before any sampling can start.
    pub fn from_parts(dw: Array2<u64>, ratings: &[f64], users: &[String]) -> Result<Corpus> {
        if dw.nrows() == 0 || dw.ncols() == 0 {
            return Err(Error::MissingInput("document-word count table"));
        }
        if ratings.is_empty() {
            return Err(Error::MissingInput("ratings"));
        }
        if users.is_empty() {
            return Err(Error::MissingInput("users"));
        }
        let n_docs = dw.nrows();
        if ratings.len() != n_docs {
            return Err(Error::CorpusShape(format!(
                "{} ratings for {} documents",
                ratings.len(),
                n_docs
            )));
        }
        if users.len() != n_docs {
            return Err(Error::CorpusShape(format!(
                "{} users for {} documents",
                users.len(),
                n_docs
            )));
        }
        if ratings.iter().any(|r| !r.is_finite()) {
            return Err(Error::CorpusShape("non-finite rating value".to_string()));
        }

        let mut sentiment_levels = ratings.to_vec();
        sentiment_levels.sort_by(f64::total_cmp);
        sentiment_levels.dedup();
        let sentiment = ratings
            .iter()
            .map(|r| {
                sentiment_levels
                    .binary_search_by(|l| l.total_cmp(r))
                    .unwrap_or(0)
            })
            .collect();

        let mut user_labels: Vec<String> = users.to_vec();
        user_labels.sort();
        user_labels.dedup();
        let user = users
            .iter()
            .map(|u| user_labels.binary_search(u).unwrap_or(0))
            .collect();

        Ok(Corpus {
            dw,
            user,
            sentiment,
            sentiment_levels,
            user_labels,
        })
    }

    /// Loads the three plain-text input files: the `nD x nW` count table
    /// (one document per line, whitespace- or comma-separated integers), one
    /// rating per line, and one user label per line.
    pub fn from_files<P: AsRef<Path>>(word_counts: P, ratings: P, users: P) -> Result<Corpus> {
        let dw = load_count_table(word_counts.as_ref())?;
        let ratings = load_ratings(ratings.as_ref())?;
        let users = load_users(users.as_ref())?;
        Corpus::from_parts(dw, &ratings, &users)
    }

    pub fn n_docs(&self) -> usize {
        self.dw.nrows()
    }

    pub fn n_words(&self) -> usize {
        self.dw.ncols()
    }

    pub fn n_users(&self) -> usize {
        self.user_labels.len()
    }

    pub fn n_sentiments(&self) -> usize {
        self.sentiment_levels.len()
    }
}

fn parse_err(path: &Path, line: usize, what: impl std::fmt::Display) -> Error {
    Error::Parse {
        path: PathBuf::from(path),
        reason: format!("line {}: {}", line + 1, what),
    }
}

fn load_count_table(path: &Path) -> Result<Array2<u64>> {
    let file = File::open(path).map_err(|e| Error::Parse {
        path: PathBuf::from(path),
        reason: e.to_string(),
    })?;
    let mut rows: Vec<Vec<u64>> = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| parse_err(path, i, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|tok| !tok.is_empty())
            .map(|tok| tok.parse::<u64>().map_err(|e| parse_err(path, i, e)))
            .collect::<Result<Vec<u64>>>()?;
        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                return Err(parse_err(
                    path,
                    i,
                    format!("expected {} columns, found {}", first.len(), row.len()),
                ));
            }
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(Error::MissingInput("document-word count table"));
    }
    let n_words = rows[0].len();
    let flat: Vec<u64> = rows.into_iter().flatten().collect();
    let n_docs = flat.len() / n_words;
    Array2::from_shape_vec((n_docs, n_words), flat)
        .map_err(|e| Error::CorpusShape(e.to_string()))
}

fn load_ratings(path: &Path) -> Result<Vec<f64>> {
    let file = File::open(path).map_err(|e| Error::Parse {
        path: PathBuf::from(path),
        reason: e.to_string(),
    })?;
    let mut ratings = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| parse_err(path, i, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        ratings.push(line.parse::<f64>().map_err(|e| parse_err(path, i, e))?);
    }
    Ok(ratings)
}

fn load_users(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| Error::Parse {
        path: PathBuf::from(path),
        reason: e.to_string(),
    })?;
    let mut users = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| Error::Parse {
            path: PathBuf::from(path),
            reason: e.to_string(),
        })?;
        let line = line.trim();
        if !line.is_empty() {
            users.push(line.to_string());
        }
    }
    Ok(users)
}
