//! Plain-text word vector files.
//!
//! One line per word: the word followed by its values, separated by single
//! spaces, in dictionary order.

use std::fmt;
use std::io::{BufRead, BufWriter, Write};
use std::str::FromStr;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::corpus::Dictionary;
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::real;

/// Which parameters make up a word's vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorType {
    /// The word (target) embedding only.
    #[default]
    Single,
    /// The sum of the word and context embeddings, when the model has both.
    Agg,
}

impl FromStr for VectorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(VectorType::Single),
            "agg" => Ok(VectorType::Agg),
            _ => Err(Error::InvalidVectorType(s.to_string())),
        }
    }
}

impl fmt::Display for VectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VectorType::Single => "single",
            VectorType::Agg => "agg",
        })
    }
}

/// Write one line per dictionary entry. The matrix must have exactly one row
/// per word.
pub fn save<W: Write>(writer: W, dictionary: &Dictionary, matrix: &Matrix) -> Result<()> {
    if dictionary.len() != matrix.rows() {
        return Err(Error::ShapeMismatch {
            dictionary: dictionary.len(),
            rows: matrix.rows(),
        });
    }
    let mut out = BufWriter::new(writer);
    for (id, word) in dictionary.words().enumerate() {
        out.write_all(word.as_bytes())?;
        for value in matrix.row(id) {
            write!(out, " {}", value.get())?;
        }
        out.write_all(b"\n")?;
    }
    out.flush()?;
    debug!("saved {} vectors", dictionary.len());
    Ok(())
}

/// Overwrite the rows of `matrix` for every word of `dictionary` found in
/// `reader`. Lines for unknown words, and lines with too few or unparsable
/// values, are skipped. Returns the number of rows loaded.
pub fn load<R: BufRead>(reader: R, dictionary: &Dictionary, matrix: &Matrix) -> Result<usize> {
    if matrix.rows() < dictionary.len() {
        return Err(Error::ShapeMismatch {
            dictionary: dictionary.len(),
            rows: matrix.rows(),
        });
    }
    let dim = matrix.cols();
    let mut loaded = 0;
    let mut values = Vec::with_capacity(dim);
    for line in reader.lines() {
        let line = line?;
        let mut fields = line.split_whitespace();
        let Some(id) = fields.next().and_then(|word| dictionary.id(word)) else {
            continue;
        };
        values.clear();
        for field in fields.take(dim) {
            match field.parse::<real>() {
                Ok(v) => values.push(v),
                Err(_) => break,
            }
        }
        if values.len() < dim {
            continue;
        }
        for (cell, &v) in matrix.row(id as usize).iter().zip(&values) {
            cell.set(v);
        }
        loaded += 1;
    }
    debug!("loaded {loaded} vectors");
    Ok(loaded)
}

/// Copy word vectors out of a parameter matrix whose first `vocab_size` rows
/// are the word embeddings. With `VectorType::Agg` and a context block at
/// rows `vocab_size..2*vocab_size`, the two are summed. Only the first `dim`
/// columns are kept.
pub(crate) fn extract(
    params: &Matrix,
    vocab_size: usize,
    dim: usize,
    typ: VectorType,
    has_context: bool,
) -> Result<Matrix> {
    let agg = typ == VectorType::Agg && has_context;
    Matrix::new(vocab_size, dim, |r, row| {
        for (v, x) in row.iter_mut().zip(params.row(r)) {
            *v = x.get();
        }
        if agg {
            for (v, x) in row.iter_mut().zip(params.row(r + vocab_size)) {
                *v += x.get();
            }
        }
    })
}

/// Parameters of a trained model.
pub(crate) struct Embeddings {
    pub dictionary: Arc<Dictionary>,
    pub params: Arc<Matrix>,
    pub dim: usize,
    /// Rows `len..2*len` hold context embeddings.
    pub has_context: bool,
}

impl Embeddings {
    pub fn word_vector(&self, typ: VectorType) -> Result<Matrix> {
        extract(
            &self.params,
            self.dictionary.len(),
            self.dim,
            typ,
            self.has_context,
        )
    }
}
