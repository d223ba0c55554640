//! The epoch loop shared by every model.
//!
//! Each epoch hands its work to at most `goroutines` concurrently running
//! workers, admitted through a semaphore. Workers run on tokio's blocking
//! pool and report how many items they processed to a single aggregator
//! task, which owns the learning-rate schedule and the progress bar. An
//! epoch ends only when every worker has been joined.
//!
//! Work comes either from a slice split into contiguous shards, or from a
//! producer streaming batches through a bounded channel.

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use tokio::runtime::{self, Runtime};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{self, JoinSet};

use crate::error::{Error, Result};
use crate::real;
use crate::schedule::LearningRate;

/// Per-item update logic of one model.
pub trait Strategy: Send + Sync + 'static {
    type Item: Send + Sync + 'static;

    /// Worker-local state: random number generator and scratch buffers.
    type Scratch;

    fn scratch(&self, seed: u64) -> Self::Scratch;

    /// Train on `items[pos]`. Neighbouring items of the same shard are
    /// visible for window-based models.
    fn train_one(&self, items: &[Self::Item], pos: usize, lr: real, scratch: &mut Self::Scratch);
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Number of epochs.
    pub iter: usize,
    /// Maximum number of workers running at once.
    pub goroutines: usize,
    /// The learning rate is recomputed every time this many more items
    /// have been processed.
    pub update_lr_batch: usize,
    /// Workers report progress every this many items.
    pub log_batch: usize,
    /// Show a progress bar.
    pub verbose: bool,
}

/// Split `0..len` into `n` contiguous ranges of nearly equal size.
/// Returns the `n + 1` boundaries.
pub fn index_per_thread(n: usize, len: usize) -> Vec<usize> {
    let n = n.max(1);
    (0..=n).map(|i| i * len / n).collect()
}

pub struct Engine {
    options: EngineOptions,
    runtime: Runtime,
    schedule: Arc<LearningRate>,
    progress: ProgressBar,
    processed: u64,
    last_update: u64,
    seed: u64,
}

impl Engine {
    /// `items_per_epoch` is only used to size the progress bar.
    pub fn new(
        options: EngineOptions,
        schedule: Arc<LearningRate>,
        items_per_epoch: u64,
    ) -> Result<Self> {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(options.goroutines.max(1))
            .thread_name("wordembed")
            .enable_all()
            .build()?;
        let progress = if options.verbose {
            ProgressBar::new(items_per_epoch)
        } else {
            ProgressBar::hidden()
        };
        progress.set_style(
            ProgressStyle::with_template("{prefix} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Ok(Engine {
            options,
            runtime,
            schedule,
            progress,
            processed: 0,
            last_update: 0,
            seed: rand::random(),
        })
    }

    pub fn schedule(&self) -> &Arc<LearningRate> {
        &self.schedule
    }

    /// Total number of items processed so far, over all epochs.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Train on `items`, split into one contiguous shard per worker.
    pub fn run_static<S: Strategy>(&mut self, strategy: Arc<S>, items: Arc<Vec<S::Item>>) -> Result<()> {
        let bounds = index_per_thread(self.options.goroutines, items.len());
        let start = Instant::now();
        for epoch in 1..=self.options.iter {
            let (mut pool, aggregator, received) = self.begin_epoch(epoch, strategy.clone());
            let items = items.clone();
            let bounds = bounds.clone();
            let aggregator = self.runtime.block_on(async move {
                let observer = tokio::spawn(aggregator.observe(received));
                for shard in bounds.windows(2) {
                    pool.dispatch(items.clone(), shard[0]..shard[1]).await;
                }
                let joined = pool.join().await;
                let aggregator = observer
                    .await
                    .map_err(|err| Error::Worker(err.to_string()))?;
                joined?;
                Ok::<_, Error>(aggregator)
            })?;
            self.end_epoch(epoch, aggregator);
        }
        self.finish(start);
        Ok(())
    }

    /// Train on batches produced by `producer`, which is called once per
    /// epoch on the blocking pool and must send every batch and return.
    /// An error from the producer fails the epoch after its workers finish.
    pub fn run_streaming<S, P>(&mut self, strategy: Arc<S>, producer: P) -> Result<()>
    where
        S: Strategy,
        P: Fn(mpsc::Sender<Vec<S::Item>>) -> Result<()> + Send + Sync + 'static,
    {
        let producer = Arc::new(producer);
        let capacity = self.options.goroutines.max(1);
        let start = Instant::now();
        for epoch in 1..=self.options.iter {
            let (mut pool, aggregator, received) = self.begin_epoch(epoch, strategy.clone());
            let producer = producer.clone();
            let aggregator = self.runtime.block_on(async move {
                let observer = tokio::spawn(aggregator.observe(received));
                let (sender, mut batches) = mpsc::channel(capacity);
                let produced = task::spawn_blocking(move || producer(sender));
                while let Some(batch) = batches.recv().await {
                    let len = batch.len();
                    pool.dispatch(Arc::new(batch), 0..len).await;
                }
                let joined = pool.join().await;
                let produced = produced
                    .await
                    .map_err(|err| Error::Worker(err.to_string()))
                    .and_then(|r| r);
                let aggregator = observer
                    .await
                    .map_err(|err| Error::Worker(err.to_string()))?;
                joined?;
                produced?;
                Ok::<_, Error>(aggregator)
            })?;
            self.end_epoch(epoch, aggregator);
        }
        self.finish(start);
        Ok(())
    }

    fn begin_epoch<S: Strategy>(
        &mut self,
        epoch: usize,
        strategy: Arc<S>,
    ) -> (Pool<S>, Aggregator, mpsc::Receiver<usize>) {
        info!("train iter {epoch}/{}", self.options.iter);
        self.progress.reset();
        self.progress
            .set_prefix(format!("iter {epoch}/{}", self.options.iter));

        let (trained, received) = mpsc::channel(self.options.goroutines.max(1));
        let pool = Pool {
            strategy,
            schedule: self.schedule.clone(),
            admission: Arc::new(Semaphore::new(self.options.goroutines.max(1))),
            trained,
            workers: JoinSet::new(),
            report_every: self.options.log_batch.max(1),
            seed: self.seed ^ ((epoch as u64) << 32),
        };
        let aggregator = Aggregator {
            schedule: self.schedule.clone(),
            progress: self.progress.clone(),
            update_every: self.options.update_lr_batch.max(1) as u64,
            processed: self.processed,
            last_update: self.last_update,
        };
        (pool, aggregator, received)
    }

    fn end_epoch(&mut self, epoch: usize, aggregator: Aggregator) {
        self.processed = aggregator.processed;
        self.last_update = aggregator.last_update;
        debug!(
            "finished iter {epoch}: {} items in total, lr {:.6}",
            self.processed,
            self.schedule.current()
        );
    }

    fn finish(&self, start: Instant) {
        self.progress.finish_and_clear();
        info!(
            "trained {} items in {:.1?}",
            self.processed,
            start.elapsed()
        );
    }
}

/// Workers of one epoch.
struct Pool<S: Strategy> {
    strategy: Arc<S>,
    schedule: Arc<LearningRate>,
    admission: Arc<Semaphore>,
    trained: mpsc::Sender<usize>,
    workers: JoinSet<()>,
    report_every: usize,
    seed: u64,
}

impl<S: Strategy> Pool<S> {
    /// Wait for a free slot, then start a worker on `items[range]`.
    async fn dispatch(&mut self, items: Arc<Vec<S::Item>>, range: Range<usize>) {
        let permit = match self.admission.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(err) => {
                warn!("dropping shard {range:?}: {err}");
                return;
            }
        };
        let strategy = self.strategy.clone();
        let schedule = self.schedule.clone();
        let trained = self.trained.clone();
        let report_every = self.report_every;
        let seed = self.seed;
        self.seed = self.seed.wrapping_add(1);
        self.workers.spawn_blocking(move || {
            let _permit = permit;
            train_shard(
                &*strategy,
                &items[range],
                seed,
                &schedule,
                &trained,
                report_every,
            );
        });
    }

    /// Join every worker. Returns the first failure, after all have finished.
    async fn join(self) -> Result<()> {
        let Pool {
            trained,
            mut workers,
            ..
        } = self;
        drop(trained);
        let mut result = Ok(());
        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                if result.is_ok() {
                    result = Err(Error::Worker(err.to_string()));
                }
            }
        }
        result
    }
}

fn train_shard<S: Strategy>(
    strategy: &S,
    shard: &[S::Item],
    seed: u64,
    schedule: &LearningRate,
    trained: &mpsc::Sender<usize>,
    report_every: usize,
) {
    let mut scratch = strategy.scratch(seed);
    let mut num_trained = 0;
    for pos in 0..shard.len() {
        strategy.train_one(shard, pos, schedule.current(), &mut scratch);
        num_trained += 1;
        if num_trained == report_every {
            // the aggregator outlives every worker of its epoch
            let _ = trained.blocking_send(num_trained);
            num_trained = 0;
        }
    }
    if num_trained > 0 {
        let _ = trained.blocking_send(num_trained);
    }
}

/// Sole writer of the learning rate.
struct Aggregator {
    schedule: Arc<LearningRate>,
    progress: ProgressBar,
    update_every: u64,
    processed: u64,
    last_update: u64,
}

impl Aggregator {
    async fn observe(mut self, mut trained: mpsc::Receiver<usize>) -> Self {
        while let Some(n) = trained.recv().await {
            self.processed += n as u64;
            if self.processed - self.last_update >= self.update_every {
                self.schedule.update(self.processed);
                self.last_update = self.processed;
            }
            self.progress.inc(n as u64);
            self.progress
                .set_message(format!("lr {:.6}", self.schedule.current()));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn shards_cover_range_contiguously() {
        for (n, len) in [(1, 0), (1, 10), (3, 10), (4, 4), (8, 3), (7, 1000)] {
            let b = index_per_thread(n, len);
            assert_eq!(b.len(), n + 1);
            assert_eq!(b[0], 0);
            assert_eq!(b[n], len);
            for w in b.windows(2) {
                assert!(w[0] <= w[1]);
                assert!(w[1] - w[0] <= len / n + 1);
            }
        }
    }

    /// Records which items were seen and the order within each shard.
    struct Recorder {
        seen: AtomicUsize,
        shards: Mutex<Vec<Vec<u32>>>,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl Recorder {
        fn new() -> Self {
            Recorder {
                seen: AtomicUsize::new(0),
                shards: Mutex::new(vec![]),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
            }
        }
    }

    impl Strategy for Recorder {
        type Item = u32;
        type Scratch = Vec<u32>;

        fn scratch(&self, _seed: u64) -> Vec<u32> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            vec![]
        }

        fn train_one(&self, items: &[u32], pos: usize, lr: real, scratch: &mut Vec<u32>) {
            assert!(lr > 0.0);
            self.seen.fetch_add(1, Ordering::SeqCst);
            scratch.push(items[pos]);
            if pos + 1 == items.len() {
                std::thread::sleep(std::time::Duration::from_millis(2));
                self.shards.lock().push(std::mem::take(scratch));
                self.running.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    fn options(goroutines: usize, iter: usize) -> EngineOptions {
        EngineOptions {
            iter,
            goroutines,
            update_lr_batch: 10,
            log_batch: 7,
            verbose: false,
        }
    }

    #[test]
    fn static_epochs_visit_every_item_in_shard_order() {
        let schedule = Arc::new(LearningRate::new(0.1, 0.001, 300));
        let mut engine = Engine::new(options(3, 2), schedule.clone(), 150).unwrap();
        let recorder = Arc::new(Recorder::new());
        let items: Arc<Vec<u32>> = Arc::new((0..150).collect());
        engine.run_static(recorder.clone(), items).unwrap();

        assert_eq!(recorder.seen.load(Ordering::SeqCst), 300);
        assert_eq!(engine.processed(), 300);
        let shards = recorder.shards.lock();
        assert_eq!(shards.len(), 6);
        for shard in shards.iter() {
            assert!(shard.windows(2).all(|w| w[0] + 1 == w[1]));
        }
        assert!(recorder.max_running.load(Ordering::SeqCst) <= 3);
        // nearly all the scheduled work was done
        assert!(schedule.current() < 0.005);
        assert!(schedule.current() >= 0.001);
    }

    #[test]
    fn rate_is_at_floor_after_one_pass() {
        let schedule = Arc::new(LearningRate::new(0.05, 0.05 * 1.0e-4, 1000));
        let mut engine = Engine::new(options(3, 3), schedule.clone(), 1000).unwrap();
        let items: Arc<Vec<u32>> = Arc::new((0..1000).collect());
        engine.run_static(Arc::new(Recorder::new()), items).unwrap();
        assert_eq!(engine.processed(), 3000);
        assert_eq!(schedule.current(), schedule.min());
    }

    #[test]
    fn streaming_admits_at_most_goroutines_workers() {
        let schedule = Arc::new(LearningRate::new(0.1, 0.0001, 1000));
        let mut engine = Engine::new(options(2, 1), schedule.clone(), 1000).unwrap();
        let recorder = Arc::new(Recorder::new());
        engine
            .run_streaming(recorder.clone(), |sender: mpsc::Sender<Vec<u32>>| {
                for start in (0..1000).step_by(50) {
                    sender
                        .blocking_send((start..start + 50).collect())
                        .expect("engine stopped receiving");
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(recorder.seen.load(Ordering::SeqCst), 1000);
        assert_eq!(recorder.shards.lock().len(), 20);
        assert!(recorder.max_running.load(Ordering::SeqCst) <= 2);
        assert!(schedule.current() < 0.1);
    }

    #[test]
    fn producer_errors_propagate() {
        let schedule = Arc::new(LearningRate::constant(0.1));
        let mut engine = Engine::new(options(2, 3), schedule, 10).unwrap();
        let result = engine.run_streaming(
            Arc::new(Recorder::new()),
            |_sender: mpsc::Sender<Vec<u32>>| {
                Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "truncated corpus",
                )))
            },
        );
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
