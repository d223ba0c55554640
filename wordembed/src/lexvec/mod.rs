//! lexvec: a window-based model that regresses word-context dot products
//! on an association measure (PPMI by default), with negative sampling.

mod relation;

pub use relation::RelationType;

use std::io::BufRead;
use std::sync::Arc;

use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, CorpusOptions, CooccurrenceOptions, CountType, Dictionary, Source};
use crate::engine::{Engine, EngineOptions, Strategy};
use crate::error::{ensure, Error, Result};
use crate::matrix::{dot, Matrix};
use crate::schedule::LearningRate;
use crate::subsample::Subsampler;
use crate::unigram::UnigramTable;
use crate::vector::{self, Embeddings, VectorType};
use crate::window::context_positions;
use crate::{real, Model};
use relation::Relations;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub corpus: CorpusOptions,
    pub relation: RelationType,
    pub dim: usize,
    pub window: usize,
    pub iter: usize,
    pub goroutines: usize,
    pub initlr: real,
    pub min_lr: real,
    /// Number of negative samples per context word.
    pub negative: usize,
    /// Exponent applied to the context word's frequency in (P)PMI.
    pub smooth: f64,
    pub subsample_threshold: f64,
    pub batch_size: usize,
    pub update_lr_batch: usize,
    pub log_batch: usize,
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            corpus: CorpusOptions::default(),
            relation: RelationType::default(),
            dim: 10,
            window: 5,
            iter: 15,
            goroutines: num_cpus::get(),
            initlr: 0.025,
            min_lr: 0.025 * 1.0e-4,
            negative: 5,
            smooth: 0.75,
            subsample_threshold: 1.0e-3,
            batch_size: 10_000,
            update_lr_batch: 100_000,
            log_batch: 100_000,
            verbose: false,
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<()> {
        ensure(self.dim > 0, "dim must be positive")?;
        ensure(self.window > 0, "window must be positive")?;
        ensure(self.iter > 0, "iter must be positive")?;
        ensure(self.goroutines > 0, "goroutines must be positive")?;
        ensure(self.batch_size > 0, "batch_size must be positive")?;
        ensure(self.update_lr_batch > 0, "update_lr_batch must be positive")?;
        ensure(self.log_batch > 0, "log_batch must be positive")?;
        ensure(self.initlr > 0.0, "initlr must be positive")?;
        ensure(
            self.min_lr >= 0.0 && self.min_lr <= self.initlr,
            "min_lr must be between 0 and initlr",
        )?;
        ensure(self.smooth >= 0.0, "smooth must not be negative")?;
        ensure(
            self.subsample_threshold >= 0.0,
            "subsample_threshold must not be negative",
        )?;
        Ok(())
    }

    fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            iter: self.iter,
            goroutines: self.goroutines,
            update_lr_batch: self.update_lr_batch,
            log_batch: self.log_batch,
            verbose: self.verbose,
        }
    }
}

pub struct Lexvec {
    options: Options,
    trained: Option<Embeddings>,
    learning_rate: Option<real>,
}

impl Lexvec {
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Lexvec {
            options,
            trained: None,
            learning_rate: None,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The learning rate workers saw last, once trained.
    pub fn learning_rate(&self) -> Option<real> {
        self.learning_rate
    }

    /// Like [`Model::train`], but first overwrite the word embeddings of every
    /// word found in the vector file `vectors`.
    pub fn train_with<R, V>(&mut self, input: R, vectors: V) -> Result<()>
    where
        R: Source + 'static,
        V: BufRead,
    {
        let mut vectors = vectors;
        let mut warm_start = |dictionary: &Dictionary, params: &Matrix| -> Result<()> {
            let loaded = vector::load(&mut vectors, dictionary, params)?;
            info!("initialized {loaded} of {} words from vectors", dictionary.len());
            Ok(())
        };
        self.fit(input, Some(&mut warm_start))
    }

    fn fit<R: Source + 'static>(
        &mut self,
        input: R,
        warm_start: Option<&mut dyn FnMut(&Dictionary, &Matrix) -> Result<()>>,
    ) -> Result<()> {
        let opts = &self.options;
        let cooccurrence = CooccurrenceOptions {
            count_type: CountType::Increment,
            window: opts.window,
        };
        let corpus = Corpus::load(input, &opts.corpus, Some(cooccurrence))?;
        let dictionary = corpus.dictionary().clone();
        let vocab_size = dictionary.len();
        let dim = opts.dim;

        let mut rng = SmallRng::from_entropy();
        let params = Arc::new(Matrix::new(vocab_size * 2, dim, |_, row| {
            for v in row {
                *v = (rng.gen::<real>() - 0.5) / dim as real;
            }
        })?);
        if let Some(warm_start) = warm_start {
            warm_start(dictionary.as_ref(), params.as_ref())?;
        }

        let relations = match corpus.cooccurrence() {
            Some(cooc) => Relations::new(opts.relation, cooc, &dictionary, opts.smooth),
            None => Relations::new(opts.relation, &Default::default(), &dictionary, opts.smooth),
        };
        info!(
            "training lexvec ({}): {} words, {} relations, dim {}, {} iterations",
            opts.relation,
            vocab_size,
            relations.len(),
            dim,
            opts.iter
        );

        let trainer = Arc::new(Trainer {
            params: params.clone(),
            relations,
            table: UnigramTable::new(&dictionary),
            subsampler: Subsampler::new(&dictionary, opts.subsample_threshold),
            window: opts.window,
            negative: opts.negative,
            vocab_size: vocab_size as u32,
        });
        // decays over one pass; later passes stay at min_lr
        let schedule = Arc::new(LearningRate::new(opts.initlr, opts.min_lr, corpus.len() as u64));
        let mut engine = Engine::new(opts.engine_options(), schedule.clone(), corpus.len() as u64)?;
        match corpus.indexed_doc() {
            Some(doc) => engine.run_static(trainer, doc)?,
            None => {
                let batcher = corpus.batcher();
                let batch_size = opts.batch_size;
                engine.run_streaming(trainer, move |sender| batcher.batch_words(sender, batch_size))?;
            }
        }

        self.learning_rate = Some(schedule.current());
        self.trained = Some(Embeddings {
            dictionary,
            params,
            dim,
            has_context: true,
        });
        Ok(())
    }
}

impl Model for Lexvec {
    fn train<R: Source + 'static>(&mut self, input: R) -> Result<()> {
        self.fit(input, None)
    }

    fn dictionary(&self) -> Result<&Dictionary> {
        let trained = self.trained.as_ref().ok_or(Error::NotTrained)?;
        Ok(trained.dictionary.as_ref())
    }

    fn word_vector(&self, typ: VectorType) -> Result<Matrix> {
        self.trained
            .as_ref()
            .ok_or(Error::NotTrained)?
            .word_vector(typ)
    }
}

struct Trainer {
    params: Arc<Matrix>,
    relations: Relations,
    table: UnigramTable,
    subsampler: Subsampler,
    window: usize,
    negative: usize,
    vocab_size: u32,
}

struct Scratch {
    rng: SmallRng,
    context: Vec<u32>,
}

impl Trainer {
    /// One regression step of `w(l1) · c(l2)` toward `f`.
    fn update(&self, l1: u32, l2: u32, f: real, lr: real) {
        let w = self.params.row(l1 as usize);
        let c = self.params.row((l2 + self.vocab_size) as usize);
        let diff = (dot(w, c) - f) * lr;
        for (x1, x2) in w.iter().zip(c) {
            let t1 = diff * x2.get();
            let t2 = diff * x1.get();
            x1.add(-t1);
            x2.add(-t2);
        }
    }
}

impl Strategy for Trainer {
    type Item = u32;
    type Scratch = Scratch;

    fn scratch(&self, seed: u64) -> Scratch {
        Scratch {
            rng: SmallRng::seed_from_u64(seed),
            context: Vec::with_capacity(self.window * 2),
        }
    }

    fn train_one(&self, doc: &[u32], pos: usize, lr: real, s: &mut Scratch) {
        let word = doc[pos];
        if !self.subsampler.trial(word, &mut s.rng) {
            return;
        }
        s.context.clear();
        s.context
            .extend(context_positions(pos, doc.len(), self.window, &mut s.rng).map(|c| doc[c]));
        for &ctx in &s.context {
            self.update(word, ctx, self.relations.get(word, ctx), lr);
            for _ in 0..self.negative {
                let sample = self.table.sample(&mut s.rng);
                self.update(word, sample, self.relations.get(word, sample), lr);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_from_json() {
        let opts: Options = serde_json::from_str(r#"{"relation": "logco", "smooth": 0.5}"#).unwrap();
        assert_eq!(opts.relation, RelationType::LogCollocation);
        assert_eq!(opts.smooth, 0.5);
        assert_eq!(opts.negative, 5);
        assert!(serde_json::from_str::<Options>(r#"{"relation": "cosine"}"#).is_err());
    }

    #[test]
    fn regression_step_moves_toward_target() {
        let params = Arc::new(Matrix::new(4, 2, |r, row| row.fill(0.1 * (r + 1) as real)).unwrap());
        let mut dic = Dictionary::new();
        dic.add("a", 1);
        dic.add("b", 1);
        let trainer = Trainer {
            params: params.clone(),
            relations: Relations::new(RelationType::Collocation, &Default::default(), &dic, 0.75),
            table: UnigramTable::new(&dic),
            subsampler: Subsampler::new(&dic, 0.0),
            window: 1,
            negative: 0,
            vocab_size: 2,
        };
        let score = || dot(params.row(0), params.row(3));
        let target = 2.0;
        let before = (score() - target).abs();
        for _ in 0..10 {
            trainer.update(0, 1, target, 0.1);
        }
        assert!((score() - target).abs() < before);
        // the other word and context rows are untouched
        assert_eq!(params.row_values(1), vec![0.1 * 2 as real; 2]);
        assert_eq!(params.row_values(2), vec![0.1 * 3 as real; 2]);
    }
}
