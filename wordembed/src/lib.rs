//! Word embeddings trained with word2vec, GloVe or lexvec.
//!
//! All three models share the same machinery: a [`corpus::Corpus`] turns a
//! text stream into word ids (and cooccurrence counts where needed), a
//! [`matrix::Matrix`] of lock-free cells holds the parameters, and the
//! [`engine::Engine`] runs epochs of asynchronous SGD over a bounded pool of
//! workers.

use std::io::Write;

pub mod bigram;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod glove;
pub mod lexvec;
pub mod matrix;
pub mod schedule;
pub mod search;
pub mod subsample;
pub mod vector;
pub mod word2vec;

mod unigram;
mod window;

pub use corpus::{Dictionary, Source};
pub use error::{Error, Result};
pub use matrix::Matrix;
pub use vector::VectorType;

#[allow(non_camel_case_types)]
pub type real = f32; // Precision of float numbers

/// A trainable embedding model.
pub trait Model {
    /// Read the whole corpus from `input` and train on it.
    fn train<R: Source + 'static>(&mut self, input: R) -> Result<()>;

    /// The vocabulary the model was trained on.
    fn dictionary(&self) -> Result<&Dictionary>;

    /// One row per dictionary entry.
    fn word_vector(&self, typ: VectorType) -> Result<Matrix>;

    /// Write the word vectors in the text format of [`vector::save`].
    fn save<W: Write>(&self, writer: W, typ: VectorType) -> Result<()> {
        vector::save(writer, self.dictionary()?, &self.word_vector(typ)?)
    }
}
