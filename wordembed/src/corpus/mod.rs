//! Corpus loading: tokenizing, building the dictionary, and optionally
//! counting cooccurrences.
//!
//! A corpus either keeps the indexed document in memory or keeps the
//! (seekable) input around and re-reads it for every epoch, handing out
//! fixed-size batches of ids through a bounded channel.

mod cooccurrence;
mod dictionary;
mod words;

pub use cooccurrence::{Cooccurrence, CooccurrenceOptions, CountType};
pub use dictionary::Dictionary;

use std::io::{Read, Seek, SeekFrom};
use std::mem;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use words::read_words;

/// A seekable byte stream that can be moved to a producer thread.
pub trait Source: Read + Seek + Send {}

impl<T: Read + Seek + Send> Source for T {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorpusOptions {
    /// Lower-case every token.
    pub to_lower: bool,
    /// Discard words that appear less than this many times.
    pub min_count: u64,
    /// Discard words that appear more than this many times.
    pub max_count: Option<u64>,
    /// Keep the indexed document in memory instead of re-reading the input
    /// for every epoch.
    pub doc_in_memory: bool,
}

impl Default for CorpusOptions {
    fn default() -> Self {
        CorpusOptions {
            to_lower: false,
            min_count: 5,
            max_count: None,
            doc_in_memory: false,
        }
    }
}

#[derive(Clone)]
enum Document {
    Memory(Arc<Vec<u32>>),
    Stream(Arc<Mutex<Box<dyn Source>>>),
}

pub struct Corpus {
    dictionary: Arc<Dictionary>,
    len: usize,
    document: Document,
    cooccurrence: Option<Cooccurrence>,
    to_lower: bool,
}

impl Corpus {
    /// Read `input` fully, build the dictionary and, when `cooccurrence` is
    /// given, the cooccurrence matrix.
    pub fn load<R>(
        input: R,
        options: &CorpusOptions,
        cooccurrence: Option<CooccurrenceOptions>,
    ) -> Result<Self>
    where
        R: Source + 'static,
    {
        let mut input: Box<dyn Source> = Box::new(input);
        input.seek(SeekFrom::Start(0))?;

        let mut raw = Dictionary::new();
        let mut raw_doc = Vec::new();
        for word in read_words(&mut input, options.to_lower) {
            let id = raw.add(&word?, 1);
            if options.doc_in_memory {
                raw_doc.push(id);
            }
        }

        let (dictionary, remap) = raw.retain(|freq| {
            freq >= options.min_count && options.max_count.map_or(true, |max| freq <= max)
        });
        if dictionary.is_empty() {
            return Err(Error::EmptyVocabulary);
        }
        info!(
            "vocabulary: {} words out of {}, {} tokens",
            dictionary.len(),
            raw.len(),
            dictionary.total_freq()
        );

        let (document, len, cooccurrence) = if options.doc_in_memory {
            let doc: Vec<u32> = raw_doc
                .into_iter()
                .filter_map(|id| remap[id as usize])
                .collect();
            let cooc = cooccurrence.map(|opts| Cooccurrence::count(doc.iter().copied(), opts));
            let len = doc.len();
            (Document::Memory(Arc::new(doc)), len, cooc)
        } else {
            let cooc = match cooccurrence {
                Some(opts) => {
                    input.seek(SeekFrom::Start(0))?;
                    let ids = read_words(&mut input, options.to_lower)
                        .filter_map(|word| match word {
                            Ok(word) => dictionary.id(&word).map(Ok),
                            Err(err) => Some(Err(err)),
                        })
                        .collect::<std::io::Result<Vec<u32>>>()?;
                    Some(Cooccurrence::count(ids, opts))
                }
                None => None,
            };
            let len = dictionary.total_freq() as usize;
            (Document::Stream(Arc::new(Mutex::new(input))), len, cooc)
        };
        if let Some(cooc) = &cooccurrence {
            debug!("cooccurrence: {} nonzero pairs", cooc.len());
        }

        Ok(Corpus {
            dictionary: Arc::new(dictionary),
            len,
            document,
            cooccurrence,
            to_lower: options.to_lower,
        })
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    /// Number of retained tokens in one pass over the corpus.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The whole document as ids, if it is kept in memory.
    pub fn indexed_doc(&self) -> Option<Arc<Vec<u32>>> {
        match &self.document {
            Document::Memory(doc) => Some(doc.clone()),
            Document::Stream(_) => None,
        }
    }

    pub fn cooccurrence(&self) -> Option<&Cooccurrence> {
        self.cooccurrence.as_ref()
    }

    /// A handle that can stream the document from another thread.
    pub fn batcher(&self) -> Batcher {
        Batcher {
            dictionary: self.dictionary.clone(),
            document: self.document.clone(),
            to_lower: self.to_lower,
        }
    }
}

/// Streams a corpus as fixed-size batches of ids.
#[derive(Clone)]
pub struct Batcher {
    dictionary: Arc<Dictionary>,
    document: Document,
    to_lower: bool,
}

impl Batcher {
    /// Send the document, from the start, as batches of `batch_size` ids (the
    /// last one may be shorter). Consumes `sender`, so the channel closes
    /// once this returns. Must be called from a blocking context.
    pub fn batch_words(&self, sender: mpsc::Sender<Vec<u32>>, batch_size: usize) -> Result<()> {
        let batch_size = batch_size.max(1);
        match &self.document {
            Document::Memory(doc) => {
                for chunk in doc.chunks(batch_size) {
                    if sender.blocking_send(chunk.to_vec()).is_err() {
                        break;
                    }
                }
            }
            Document::Stream(input) => {
                let mut input = input.lock();
                input.seek(SeekFrom::Start(0))?;
                let mut batch = Vec::with_capacity(batch_size);
                for word in read_words(&mut *input, self.to_lower) {
                    if let Some(id) = self.dictionary.id(&word?) {
                        batch.push(id);
                    }
                    if batch.len() == batch_size {
                        let full = mem::replace(&mut batch, Vec::with_capacity(batch_size));
                        if sender.blocking_send(full).is_err() {
                            return Ok(());
                        }
                    }
                }
                if !batch.is_empty() {
                    let _ = sender.blocking_send(batch);
                }
            }
        }
        Ok(())
    }
}
