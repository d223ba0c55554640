//! word2vec: skip-gram or continuous bag of words, trained with negative
//! sampling or hierarchical softmax.

mod huffman;
mod optimizer;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, CorpusOptions, Dictionary, Source};
use crate::engine::{Engine, EngineOptions, Strategy};
use crate::error::{ensure, Error, Result};
use crate::matrix::Matrix;
use crate::schedule::LearningRate;
use crate::subsample::Subsampler;
use crate::vector::{Embeddings, VectorType};
use crate::window::context_positions;
use crate::{real, Model};
use optimizer::{Optimizer, Sigmoid};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelType {
    /// Predict each context word from the center word.
    #[default]
    #[serde(rename = "skipgram")]
    SkipGram,
    /// Predict the center word from the average of its context.
    #[serde(rename = "cbow")]
    Cbow,
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skipgram" => Ok(ModelType::SkipGram),
            "cbow" => Ok(ModelType::Cbow),
            _ => Err(Error::InvalidModel(s.to_string())),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelType::SkipGram => "skipgram",
            ModelType::Cbow => "cbow",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerType {
    #[default]
    #[serde(rename = "ns")]
    NegativeSampling,
    #[serde(rename = "hs")]
    HierarchicalSoftmax,
}

impl FromStr for OptimizerType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ns" => Ok(OptimizerType::NegativeSampling),
            "hs" => Ok(OptimizerType::HierarchicalSoftmax),
            _ => Err(Error::InvalidOptimizer(s.to_string())),
        }
    }
}

impl fmt::Display for OptimizerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptimizerType::NegativeSampling => "ns",
            OptimizerType::HierarchicalSoftmax => "hs",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub corpus: CorpusOptions,
    pub model: ModelType,
    pub optimizer: OptimizerType,
    /// Size of word vectors.
    pub dim: usize,
    /// Max skip length between words.
    pub window: usize,
    /// Number of passes over the corpus.
    pub iter: usize,
    /// Number of concurrent training workers.
    pub goroutines: usize,
    /// Starting learning rate.
    pub initlr: real,
    /// The learning rate never decays below this.
    pub min_lr: real,
    /// Number of negative samples per true pair.
    pub negative: usize,
    /// Truncate hierarchical softmax paths to this many edges; 0 means no limit.
    pub max_depth: usize,
    /// Frequent words are randomly down-sampled; useful range is (0, 1e-5).
    pub subsample_threshold: f64,
    /// Words per batch when streaming the corpus.
    pub batch_size: usize,
    pub update_lr_batch: usize,
    pub log_batch: usize,
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            corpus: CorpusOptions::default(),
            model: ModelType::default(),
            optimizer: OptimizerType::default(),
            dim: 10,
            window: 5,
            iter: 15,
            goroutines: num_cpus::get(),
            initlr: 0.025,
            min_lr: 0.025 * 1.0e-4,
            negative: 5,
            max_depth: 0,
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

pub struct Word2vec {
    options: Options,
    trained: Option<Embeddings>,
    learning_rate: Option<real>,
}

impl Word2vec {
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Word2vec {
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
}

impl Model for Word2vec {
    fn train<R: Source + 'static>(&mut self, input: R) -> Result<()> {
        let opts = &self.options;
        let corpus = Corpus::load(input, &opts.corpus, None)?;
        let dictionary = corpus.dictionary().clone();
        let vocab_size = dictionary.len();
        let dim = opts.dim;

        let optimizer = match opts.optimizer {
            OptimizerType::NegativeSampling => Optimizer::negative_sampling(&dictionary, opts.negative),
            OptimizerType::HierarchicalSoftmax => {
                Optimizer::hierarchical_softmax(&dictionary, dim, opts.max_depth)?
            }
        };
        let rows = optimizer.param_rows(vocab_size);
        let has_context = rows > vocab_size;

        // Context vectors start at zero.
        let mut rng = SmallRng::from_entropy();
        let params = Arc::new(Matrix::new(rows, dim, |r, row| {
            if r < vocab_size {
                for v in row {
                    *v = (rng.gen::<real>() - 0.5) / dim as real;
                }
            }
        })?);

        info!(
            "training word2vec ({}, {}): {} words, dim {}, {} iterations",
            opts.model, opts.optimizer, vocab_size, dim, opts.iter
        );
        let trainer = Arc::new(Trainer {
            model: opts.model,
            window: opts.window,
            params: params.clone(),
            optimizer,
            sigmoid: Sigmoid::new(),
            subsampler: Subsampler::new(&dictionary, opts.subsample_threshold),
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
            has_context,
        });
        Ok(())
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
    model: ModelType,
    window: usize,
    params: Arc<Matrix>,
    optimizer: Optimizer,
    sigmoid: Sigmoid,
    subsampler: Subsampler,
}

struct Scratch {
    rng: SmallRng,
    hidden: Vec<real>,
    grad: Vec<real>,
    context: Vec<u32>,
}

impl Strategy for Trainer {
    type Item = u32;
    type Scratch = Scratch;

    fn scratch(&self, seed: u64) -> Scratch {
        let dim = self.params.cols();
        Scratch {
            rng: SmallRng::seed_from_u64(seed),
            hidden: vec![0.0; dim],
            grad: vec![0.0; dim],
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

        match self.model {
            ModelType::SkipGram => {
                for &ctx in &s.context {
                    let row = self.params.row(ctx as usize);
                    for (h, x) in s.hidden.iter_mut().zip(row) {
                        *h = x.get();
                    }
                    s.grad.fill(0.0);
                    self.optimizer.update(
                        &self.sigmoid,
                        &self.params,
                        word,
                        &s.hidden,
                        &mut s.grad,
                        lr,
                        &mut s.rng,
                    );
                    for (x, &g) in row.iter().zip(&s.grad) {
                        x.add(g);
                    }
                }
            }
            ModelType::Cbow => {
                if s.context.is_empty() {
                    return;
                }
                // in -> hidden
                s.hidden.fill(0.0);
                for &ctx in &s.context {
                    for (h, x) in s.hidden.iter_mut().zip(self.params.row(ctx as usize)) {
                        *h += x.get();
                    }
                }
                let n = s.context.len() as real;
                for h in &mut s.hidden {
                    *h /= n;
                }
                s.grad.fill(0.0);
                self.optimizer.update(
                    &self.sigmoid,
                    &self.params,
                    word,
                    &s.hidden,
                    &mut s.grad,
                    lr,
                    &mut s.rng,
                );
                // hidden -> in
                for &ctx in &s.context {
                    for (x, &g) in self.params.row(ctx as usize).iter().zip(&s.grad) {
                        x.add(g);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_strings() {
        for m in [ModelType::SkipGram, ModelType::Cbow] {
            assert_eq!(m.to_string().parse::<ModelType>().unwrap(), m);
        }
        for o in [OptimizerType::NegativeSampling, OptimizerType::HierarchicalSoftmax] {
            assert_eq!(o.to_string().parse::<OptimizerType>().unwrap(), o);
        }
        assert!(matches!("glove".parse::<ModelType>(), Err(Error::InvalidModel(_))));
        assert!(matches!("sgd".parse::<OptimizerType>(), Err(Error::InvalidOptimizer(_))));
    }

    #[test]
    fn options_from_json() {
        let opts: Options =
            serde_json::from_str(r#"{"model": "cbow", "optimizer": "hs", "dim": 50}"#).unwrap();
        assert_eq!(opts.model, ModelType::Cbow);
        assert_eq!(opts.optimizer, OptimizerType::HierarchicalSoftmax);
        assert_eq!(opts.dim, 50);
        assert_eq!(opts.window, 5);

        assert!(serde_json::from_str::<Options>(r#"{"model": "glove"}"#).is_err());
        assert!(serde_json::from_str::<Options>(r#"{"dimension": 3}"#).is_err());
    }

    #[test]
    fn invalid_options_are_rejected_up_front() {
        let zero_dim = Options {
            dim: 0,
            ..Options::default()
        };
        assert!(matches!(Word2vec::new(zero_dim), Err(Error::InvalidOption(_))));

        let inverted_lr = Options {
            min_lr: 1.0,
            ..Options::default()
        };
        assert!(matches!(Word2vec::new(inverted_lr), Err(Error::InvalidOption(_))));
    }

    #[test]
    fn untrained_model_has_nothing_to_save() {
        let model = Word2vec::new(Options::default()).unwrap();
        assert!(matches!(model.word_vector(VectorType::Single), Err(Error::NotTrained)));
        assert!(matches!(model.dictionary(), Err(Error::NotTrained)));
        let mut out = vec![];
        assert!(matches!(model.save(&mut out, VectorType::Single), Err(Error::NotTrained)));
    }
}
