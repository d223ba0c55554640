use thiserror::Error;

/// Errors produced while loading a corpus, training a model or reading and
/// writing word vectors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid model: {0} not in cbow|skipgram")]
    InvalidModel(String),

    #[error("invalid optimizer: {0} not in ns|hs")]
    InvalidOptimizer(String),

    #[error("invalid solver: {0} not in sgd|adagrad")]
    InvalidSolver(String),

    #[error("invalid relation type: {0} not in ppmi|pmi|co|logco")]
    InvalidRelation(String),

    #[error("invalid vector type: {0} not in single|agg")]
    InvalidVectorType(String),

    #[error("invalid count type: {0} not in inc|prox")]
    InvalidCountType(String),

    #[error("different for length of dictionary and rows of matrix: {dictionary}, {rows}")]
    ShapeMismatch { dictionary: usize, rows: usize },

    #[error("vocabulary is empty after filtering the corpus")]
    EmptyVocabulary,

    #[error("word {0:?} is not in the vocabulary")]
    UnknownWord(String),

    #[error("model has not been trained")]
    NotTrained,

    #[error("failed to allocate parameter matrix: {0}")]
    Allocation(String),

    #[error("training worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fail with [`Error::InvalidOption`] unless `ok`.
pub(crate) fn ensure(ok: bool, what: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidOption(what.to_string()))
    }
}
