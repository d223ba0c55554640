//! GloVe: weighted least squares on log cooccurrence counts.

mod item;
mod solver;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, CorpusOptions, CooccurrenceOptions, CountType, Dictionary, Source};
use crate::engine::{Engine, EngineOptions, Strategy};
use crate::error::{ensure, Error, Result};
use crate::matrix::Matrix;
use crate::schedule::LearningRate;
use crate::vector::{Embeddings, VectorType};
use crate::{real, Model};
use item::{make_items, Item};
use solver::Solver;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverType {
    #[default]
    #[serde(rename = "sgd")]
    Stochastic,
    #[serde(rename = "adagrad")]
    AdaGrad,
}

impl FromStr for SolverType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sgd" => Ok(SolverType::Stochastic),
            "adagrad" => Ok(SolverType::AdaGrad),
            _ => Err(Error::InvalidSolver(s.to_string())),
        }
    }
}

impl fmt::Display for SolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolverType::Stochastic => "sgd",
            SolverType::AdaGrad => "adagrad",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub corpus: CorpusOptions,
    pub solver: SolverType,
    pub count_type: CountType,
    pub dim: usize,
    /// Cooccurrence window on either side of a word.
    pub window: usize,
    pub iter: usize,
    pub goroutines: usize,
    /// Fixed learning rate of the solver.
    pub initlr: real,
    /// Counts at or above this get full weight.
    pub xmax: f64,
    /// Exponent of the weighting function below `xmax`.
    pub alpha: f64,
    pub log_batch: usize,
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            corpus: CorpusOptions::default(),
            solver: SolverType::default(),
            count_type: CountType::default(),
            dim: 10,
            window: 15,
            iter: 15,
            goroutines: num_cpus::get(),
            initlr: 0.025,
            xmax: 100.0,
            alpha: 0.75,
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
        ensure(self.log_batch > 0, "log_batch must be positive")?;
        ensure(self.initlr > 0.0, "initlr must be positive")?;
        ensure(self.xmax > 0.0, "xmax must be positive")?;
        ensure(self.alpha >= 0.0, "alpha must not be negative")?;
        Ok(())
    }

    fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            iter: self.iter,
            goroutines: self.goroutines,
            update_lr_batch: usize::MAX,
            log_batch: self.log_batch,
            verbose: self.verbose,
        }
    }
}

pub struct Glove {
    options: Options,
    trained: Option<Embeddings>,
}

impl Glove {
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Glove {
            options,
            trained: None,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl Model for Glove {
    fn train<R: Source + 'static>(&mut self, input: R) -> Result<()> {
        let opts = &self.options;
        let cooccurrence = CooccurrenceOptions {
            count_type: opts.count_type,
            window: opts.window,
        };
        let corpus = Corpus::load(input, &opts.corpus, Some(cooccurrence))?;
        let dictionary = corpus.dictionary().clone();
        let vocab_size = dictionary.len();
        let dim = opts.dim;

        let mut rng = SmallRng::from_entropy();
        let params = Arc::new(Matrix::new(vocab_size * 2, dim + 1, |_, row| {
            for v in row {
                *v = rng.gen::<real>() / dim as real;
            }
        })?);
        let solver = match opts.solver {
            SolverType::Stochastic => Solver::Stochastic,
            SolverType::AdaGrad => Solver::adagrad(vocab_size * 2, dim + 1)?,
        };
        let items = match corpus.cooccurrence() {
            Some(cooc) => make_items(cooc, opts.xmax, opts.alpha),
            None => vec![],
        };
        info!(
            "training glove ({}): {} words, {} items, dim {}, {} iterations",
            opts.solver,
            vocab_size,
            items.len(),
            dim,
            opts.iter
        );

        let trainer = Arc::new(Trainer {
            params: params.clone(),
            solver,
            vocab_size: vocab_size as u32,
        });
        let schedule = Arc::new(LearningRate::constant(opts.initlr));
        let mut engine = Engine::new(opts.engine_options(), schedule, items.len() as u64)?;
        engine.run_static(trainer, Arc::new(items))?;

        self.trained = Some(Embeddings {
            dictionary,
            params,
            dim,
            has_context: true,
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
    params: Arc<Matrix>,
    solver: Solver,
    vocab_size: u32,
}

impl Strategy for Trainer {
    type Item = Item;
    type Scratch = ();

    fn scratch(&self, _seed: u64) -> Self::Scratch {}

    fn train_one(&self, items: &[Item], pos: usize, lr: real, _: &mut ()) {
        let item = &items[pos];
        let v = self.vocab_size;
        // once as (word, context), once as (context, word)
        self.solver.train_one(
            &self.params,
            item.l1 as usize,
            (item.l2 + v) as usize,
            item.f,
            item.coef,
            lr,
        );
        self.solver.train_one(
            &self.params,
            (item.l1 + v) as usize,
            item.l2 as usize,
            item.f,
            item.coef,
            lr,
        );
    }
}
