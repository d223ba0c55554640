use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::de::DeserializeOwned;

use wordembed::corpus::{CorpusOptions, CountType};
use wordembed::glove::{self, Glove, SolverType};
use wordembed::lexvec::{self, Lexvec, RelationType};
use wordembed::search::Searcher;
use wordembed::word2vec::{self, ModelType, OptimizerType, Word2vec};
use wordembed::{real, Model, VectorType};

#[derive(Parser)]
#[command(about = "Word embedding toolkit: word2vec, GloVe and lexvec", long_about = None, version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train word2vec (skip-gram or CBOW)
    Word2vec(Word2vecArgs),
    /// Train GloVe on cooccurrence counts
    Glove(GloveArgs),
    /// Train lexvec
    Lexvec(LexvecArgs),
    /// Print the words closest to the given words in a vector file
    Search(SearchArgs),
}

#[derive(Args)]
struct IoArgs {
    /// Use text data from FILE to train the model
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Save the resulting word vectors to FILE
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Save the word vectors only (single) or word plus context vectors (agg)
    #[arg(long = "type", value_name = "TYPE", default_value_t = VectorType::Single)]
    typ: VectorType,

    /// Read the model options from a JSON FILE; other model flags are ignored
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show a progress bar
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args)]
struct CorpusArgs {
    /// Lower-case all words
    #[arg(long)]
    to_lower: bool,

    /// Discard words that appear less than N times
    #[arg(long, value_name = "N", default_value_t = 5)]
    min_count: u64,

    /// Discard words that appear more than N times
    #[arg(long, value_name = "N")]
    max_count: Option<u64>,

    /// Keep the corpus in memory instead of re-reading the input every iteration
    #[arg(long)]
    in_memory: bool,
}

impl CorpusArgs {
    fn options(&self) -> CorpusOptions {
        CorpusOptions {
            to_lower: self.to_lower,
            min_count: self.min_count,
            max_count: self.max_count,
            doc_in_memory: self.in_memory,
        }
    }
}

/// Flags shared by every model. Unset flags keep the model's defaults.
#[derive(Args)]
struct TrainArgs {
    /// Set size of word vectors
    #[arg(long, value_name = "N")]
    dim: Option<usize>,

    /// Set max skip length between words
    #[arg(long, value_name = "N")]
    window: Option<usize>,

    /// Number of training iterations
    #[arg(long, value_name = "N")]
    iter: Option<usize>,

    /// Use N concurrent workers; default is the number of CPUs
    #[arg(long, value_name = "N")]
    goroutines: Option<usize>,

    /// Set the starting learning rate
    #[arg(long)]
    initlr: Option<real>,

    /// Report progress every N words
    #[arg(long, value_name = "N")]
    log_batch: Option<usize>,
}

#[derive(Args)]
struct Word2vecArgs {
    #[command(flatten)]
    io: IoArgs,
    #[command(flatten)]
    corpus: CorpusArgs,
    #[command(flatten)]
    train: TrainArgs,

    /// Architecture: skipgram|cbow
    #[arg(long, default_value_t = ModelType::SkipGram)]
    model: ModelType,

    /// Output layer: ns (negative sampling) or hs (hierarchical softmax)
    #[arg(long, default_value_t = OptimizerType::NegativeSampling)]
    optimizer: OptimizerType,

    /// Lower bound of the learning rate
    #[arg(long)]
    min_lr: Option<real>,

    /// Number of negative examples
    #[arg(long, value_name = "N")]
    negative: Option<usize>,

    /// Truncate hierarchical softmax paths to N edges (0 = no limit)
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Threshold for down-sampling frequent words; useful range is (0, 1e-5)
    #[arg(long)]
    subsample: Option<f64>,

    /// Words per batch when streaming the corpus
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Update the learning rate every N words
    #[arg(long, value_name = "N")]
    update_lr_batch: Option<usize>,
}

#[derive(Args)]
struct GloveArgs {
    #[command(flatten)]
    io: IoArgs,
    #[command(flatten)]
    corpus: CorpusArgs,
    #[command(flatten)]
    train: TrainArgs,

    /// Solver: sgd|adagrad
    #[arg(long, default_value_t = SolverType::Stochastic)]
    solver: SolverType,

    /// Cooccurrence weighting: inc (1 per pair) or prox (1 / distance)
    #[arg(long, default_value_t = CountType::Increment)]
    count_type: CountType,

    /// Counts at or above this get full weight
    #[arg(long)]
    xmax: Option<f64>,

    /// Exponent of the weighting function
    #[arg(long)]
    alpha: Option<f64>,
}

#[derive(Args)]
struct LexvecArgs {
    #[command(flatten)]
    io: IoArgs,
    #[command(flatten)]
    corpus: CorpusArgs,
    #[command(flatten)]
    train: TrainArgs,

    /// Association measure: ppmi|pmi|co|logco
    #[arg(long, default_value_t = RelationType::Ppmi)]
    relation: RelationType,

    /// Exponent applied to context frequencies
    #[arg(long)]
    smooth: Option<f64>,

    /// Lower bound of the learning rate
    #[arg(long)]
    min_lr: Option<real>,

    /// Number of negative examples
    #[arg(long, value_name = "N")]
    negative: Option<usize>,

    /// Threshold for down-sampling frequent words
    #[arg(long)]
    subsample: Option<f64>,

    /// Words per batch when streaming the corpus
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Update the learning rate every N words
    #[arg(long, value_name = "N")]
    update_lr_batch: Option<usize>,

    /// Initialize word vectors from a vector FILE before training
    #[arg(long, value_name = "FILE")]
    init: Option<PathBuf>,
}

#[derive(Args)]
struct SearchArgs {
    /// Word vector FILE to search
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Number of closest words to show
    #[arg(short, long, value_name = "K", default_value_t = 10)]
    rank: usize,

    /// Query words; their vectors are added together
    #[arg(required = true)]
    words: Vec<String>,
}

fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("error opening config file {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid config file {}", path.display()))
}

impl Word2vecArgs {
    fn options(&self) -> Result<word2vec::Options> {
        if let Some(path) = &self.io.config {
            let mut opts: word2vec::Options = load_config(path)?;
            opts.verbose |= self.io.verbose;
            return Ok(opts);
        }
        let mut opts = word2vec::Options::default();
        let t = &self.train;
        opts.corpus = self.corpus.options();
        opts.model = self.model;
        opts.optimizer = self.optimizer;
        opts.dim = t.dim.unwrap_or(opts.dim);
        opts.window = t.window.unwrap_or(opts.window);
        opts.iter = t.iter.unwrap_or(opts.iter);
        opts.goroutines = t.goroutines.unwrap_or(opts.goroutines);
        opts.initlr = t.initlr.unwrap_or(opts.initlr);
        opts.min_lr = self.min_lr.unwrap_or(opts.initlr * 1.0e-4);
        opts.log_batch = t.log_batch.unwrap_or(opts.log_batch);
        opts.negative = self.negative.unwrap_or(opts.negative);
        opts.max_depth = self.max_depth.unwrap_or(opts.max_depth);
        opts.subsample_threshold = self.subsample.unwrap_or(opts.subsample_threshold);
        opts.batch_size = self.batch_size.unwrap_or(opts.batch_size);
        opts.update_lr_batch = self.update_lr_batch.unwrap_or(opts.update_lr_batch);
        opts.verbose = self.io.verbose;
        Ok(opts)
    }
}

impl GloveArgs {
    fn options(&self) -> Result<glove::Options> {
        if let Some(path) = &self.io.config {
            let mut opts: glove::Options = load_config(path)?;
            opts.verbose |= self.io.verbose;
            return Ok(opts);
        }
        let mut opts = glove::Options::default();
        let t = &self.train;
        opts.corpus = self.corpus.options();
        opts.solver = self.solver;
        opts.count_type = self.count_type;
        opts.dim = t.dim.unwrap_or(opts.dim);
        opts.window = t.window.unwrap_or(opts.window);
        opts.iter = t.iter.unwrap_or(opts.iter);
        opts.goroutines = t.goroutines.unwrap_or(opts.goroutines);
        opts.initlr = t.initlr.unwrap_or(opts.initlr);
        opts.log_batch = t.log_batch.unwrap_or(opts.log_batch);
        opts.xmax = self.xmax.unwrap_or(opts.xmax);
        opts.alpha = self.alpha.unwrap_or(opts.alpha);
        opts.verbose = self.io.verbose;
        Ok(opts)
    }
}

impl LexvecArgs {
    fn options(&self) -> Result<lexvec::Options> {
        if let Some(path) = &self.io.config {
            let mut opts: lexvec::Options = load_config(path)?;
            opts.verbose |= self.io.verbose;
            return Ok(opts);
        }
        let mut opts = lexvec::Options::default();
        let t = &self.train;
        opts.corpus = self.corpus.options();
        opts.relation = self.relation;
        opts.dim = t.dim.unwrap_or(opts.dim);
        opts.window = t.window.unwrap_or(opts.window);
        opts.iter = t.iter.unwrap_or(opts.iter);
        opts.goroutines = t.goroutines.unwrap_or(opts.goroutines);
        opts.initlr = t.initlr.unwrap_or(opts.initlr);
        opts.min_lr = self.min_lr.unwrap_or(opts.initlr * 1.0e-4);
        opts.log_batch = t.log_batch.unwrap_or(opts.log_batch);
        opts.smooth = self.smooth.unwrap_or(opts.smooth);
        opts.negative = self.negative.unwrap_or(opts.negative);
        opts.subsample_threshold = self.subsample.unwrap_or(opts.subsample_threshold);
        opts.batch_size = self.batch_size.unwrap_or(opts.batch_size);
        opts.update_lr_batch = self.update_lr_batch.unwrap_or(opts.update_lr_batch);
        opts.verbose = self.io.verbose;
        Ok(opts)
    }
}

/// Fail early if training could not be saved: the input must exist and the
/// output must not.
fn check_paths(io: &IoArgs) -> Result<()> {
    if !io.input.is_file() {
        bail!("input file {} does not exist", io.input.display());
    }
    if io.output.exists() {
        bail!("output file {} already exists", io.output.display());
    }
    if let Some(dir) = io.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("error creating output directory {}", dir.display()))?;
    }
    Ok(())
}

fn open_input(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("error opening input file {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn save<M: Model>(model: &M, io: &IoArgs) -> Result<()> {
    let file = File::create(&io.output)
        .with_context(|| format!("error creating output file {}", io.output.display()))?;
    model
        .save(BufWriter::new(file), io.typ)
        .context("error writing output file")?;
    info!("saved {} vectors to {}", io.typ, io.output.display());
    Ok(())
}

fn train<M: Model>(mut model: M, io: &IoArgs) -> Result<()> {
    check_paths(io)?;
    model.train(open_input(&io.input)?).context("training failed")?;
    save(&model, io)
}

fn search(args: SearchArgs) -> Result<()> {
    let searcher = Searcher::from_reader(open_input(&args.input)?)
        .with_context(|| format!("error reading vectors from {}", args.input.display()))?;
    let hits = searcher.search(args.words.as_slice(), args.rank)?;
    let mut out = io::stdout().lock();
    for (word, similarity) in hits {
        writeln!(out, "{word}\t{similarity}")?;
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Word2vec(args) => train(Word2vec::new(args.options()?)?, &args.io),
        Command::Glove(args) => train(Glove::new(args.options()?)?, &args.io),
        Command::Lexvec(args) => {
            let mut model = Lexvec::new(args.options()?)?;
            match &args.init {
                None => train(model, &args.io),
                Some(init) => {
                    check_paths(&args.io)?;
                    model
                        .train_with(open_input(&args.io.input)?, open_input(init)?)
                        .context("training failed")?;
                    save(&model, &args.io)
                }
            }
        }
        Command::Search(args) => search(args),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
