// THEORY:
// Every output pixel of every stage depends only on a bounded, read-only
// neighbourhood of that stage's input. The `ParallelPipeline` exploits this by
// cutting each stage into horizontal bands of rows and handing the bands to a
// pool of tokio workers. Inputs are shared through `Arc`, each band is written
// into a private buffer, and the buffers are stitched back together in row order.
// Stages stay strictly sequential: all bands of one stage are collected before
// the next stage is dispatched.

use crate::core_modules::difference::{difference_rows, ensure_same_dimensions};
use crate::core_modules::grid::row_bands;
use crate::core_modules::morphology::{dilate_rows, erode_rows};
use crate::core_modules::threshold::threshold_rows;
use crate::error::{MotionError, Result};
use crate::pipeline::{
    BinaryMask, BorderPolicy, DifferenceImage, Frame, MotionReport, PipelineConfig, StructuringElement, Threshold,
};
use futures::future::try_join_all;
use log::{debug, warn};
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// The stage a band of rows belongs to, with shared handles to its input.
#[derive(Clone)]
enum BandJob {
    Difference {
        start: Arc<Frame>,
        end: Arc<Frame>,
    },
    Threshold {
        difference: Arc<DifferenceImage>,
        threshold: Threshold,
    },
    Erode {
        mask: Arc<BinaryMask>,
        element: Arc<StructuringElement>,
        border: BorderPolicy,
    },
    Dilate {
        mask: Arc<BinaryMask>,
        element: Arc<StructuringElement>,
    },
}

impl BandJob {
    fn run(&self, rows: Range<usize>) -> Vec<u8> {
        match self {
            BandJob::Difference { start, end } => difference_rows(start, end, rows),
            BandJob::Threshold { difference, threshold } => threshold_rows(difference, *threshold, rows),
            BandJob::Erode { mask, element, border } => erode_rows(mask, element, *border, rows),
            BandJob::Dilate { mask, element } => dilate_rows(mask, element, rows),
        }
    }
}

struct BandTask {
    job: BandJob,
    rows: Range<usize>,
    result_sender: oneshot::Sender<Vec<u8>>,
}

/// A fixed set of tokio workers fed round-robin by a single dispatcher.
pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<BandTask>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers (at least one). Must be called inside a tokio runtime.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<BandTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| mpsc::unbounded_channel::<BandTask>()).unzip();

        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                // A closed worker drops the task, and with it the result sender,
                // which the caller observes as `WorkerUnavailable`.
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % size;
            }
        });

        let workers = worker_receivers
            .into_iter()
            .map(|mut worker_receiver| {
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        let BandTask { job, rows, result_sender } = task;
                        // Bands are CPU-bound; keep them off the async executor threads.
                        // The job (and its input handles) is dropped inside the closure,
                        // before the caller wakes up.
                        let band = tokio::task::spawn_blocking(move || job.run(rows)).await;
                        match band {
                            Ok(samples) => {
                                let _ = result_sender.send(samples);
                            }
                            // A panicking band drops its sender; the caller sees
                            // `WorkerUnavailable`.
                            Err(_) => drop(result_sender),
                        }
                    }
                })
            })
            .collect();

        Self {
            task_sender,
            dispatcher,
            workers,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Runs one stage over `0..height`, one band per worker, and returns the
    /// stitched samples in row order.
    async fn run_stage(&self, job: BandJob, height: usize) -> Result<Vec<u8>> {
        let receivers = row_bands(height, self.size())
            .into_iter()
            .map(|rows| -> Result<oneshot::Receiver<Vec<u8>>> {
                let (result_sender, result_receiver) = oneshot::channel();
                let task = BandTask {
                    job: job.clone(),
                    rows,
                    result_sender,
                };
                self.task_sender
                    .send(task)
                    .map_err(|_| MotionError::WorkerUnavailable)?;
                Ok(result_receiver)
            })
            .collect::<Result<Vec<_>>>()?;

        let bands = try_join_all(receivers)
            .await
            .map_err(|_| MotionError::WorkerUnavailable)?;

        Ok(bands.concat())
    }

    /// Stops accepting work and waits for every worker to drain.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        let _ = self.dispatcher.await;
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Row-parallel variant of [`crate::pipeline::MotionPipeline`]. Produces the
/// same report for the same input.
pub struct ParallelPipeline {
    config: PipelineConfig,
    element: Arc<StructuringElement>,
    worker_pool: WorkerPool,
}

impl ParallelPipeline {
    /// One worker per logical CPU. Must be called inside a tokio runtime; the
    /// worker tasks are spawned immediately.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_workers(config, num_cpus::get())
    }

    /// `workers` tasks (at least one). Must be called inside a tokio runtime;
    /// the worker tasks are spawned immediately.
    pub fn with_workers(config: PipelineConfig, workers: usize) -> Self {
        let worker_pool = WorkerPool::new(workers);
        debug!("parallel pipeline started with {} workers", worker_pool.size());
        Self {
            element: Arc::new(config.structuring_element.clone()),
            config,
            worker_pool,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.worker_pool.size()
    }

    pub async fn process(&self, start: impl Into<Arc<Frame>>, end: impl Into<Arc<Frame>>) -> Result<MotionReport> {
        let (start, end) = (start.into(), end.into());
        ensure_same_dimensions(&start, &end)?;

        let started = Instant::now();
        let dimensions = start.dimensions();
        let height = dimensions.height as usize;

        // Stage 1: Differencing
        let samples = self
            .worker_pool
            .run_stage(BandJob::Difference { start, end }, height)
            .await?;
        let difference = Arc::new(DifferenceImage::from_samples(dimensions, samples));
        if difference.is_zero() {
            warn!("start and end frames are identical; the motion mask will be empty");
        }

        // Stage 2: Thresholding
        let samples = self
            .worker_pool
            .run_stage(
                BandJob::Threshold {
                    difference: Arc::clone(&difference),
                    threshold: self.config.threshold,
                },
                height,
            )
            .await?;
        let mut mask = BinaryMask::from_samples(dimensions, samples);

        // Stage 3: Optional cleanup, erosion fully finished before dilation starts
        if self.config.denoise {
            let eroded = self
                .worker_pool
                .run_stage(
                    BandJob::Erode {
                        mask: Arc::new(mask),
                        element: Arc::clone(&self.element),
                        border: self.config.border,
                    },
                    height,
                )
                .await?;
            let eroded = Arc::new(BinaryMask::from_samples(dimensions, eroded));

            let dilated = self
                .worker_pool
                .run_stage(
                    BandJob::Dilate {
                        mask: eroded,
                        element: Arc::clone(&self.element),
                    },
                    height,
                )
                .await?;
            mask = BinaryMask::from_samples(dimensions, dilated);
        }

        debug!(
            "processed {} frame pair across {} workers in {:?}",
            dimensions,
            self.worker_count(),
            started.elapsed()
        );

        Ok(MotionReport {
            difference: Arc::unwrap_or_clone(difference),
            mask,
        })
    }

    pub async fn shutdown(self) {
        self.worker_pool.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::MotionPipeline;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noisy_pair(rng: &mut StdRng, width: u32, height: u32) -> (Frame, Frame) {
        let start: Vec<u8> = (0..width * height).map(|_| rng.gen_range(90..110)).collect();
        let end = start
            .iter()
            .map(|&v| if rng.gen_bool(0.3) { v.saturating_add(rng.gen_range(0..120)) } else { v })
            .collect();
        (
            Frame::new(width, height, start).expect("valid frame"),
            Frame::new(width, height, end).expect("valid frame"),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn matches_serial_pipeline() {
        let mut rng = StdRng::seed_from_u64(1234);
        let configs = [
            PipelineConfig::default(),
            PipelineConfig {
                denoise: true,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                threshold: Threshold::from(10),
                denoise: true,
                structuring_element: StructuringElement::cross(3).expect("odd size"),
                border: BorderPolicy::Ignore,
            },
        ];

        for config in configs {
            let parallel = ParallelPipeline::with_workers(config.clone(), 4);
            let serial = MotionPipeline::new(config);
            for (width, height) in [(32, 24), (7, 3), (1, 1), (5, 17)] {
                let (start, end) = noisy_pair(&mut rng, width, height);
                let expected = serial.process(&start, &end).expect("valid input");
                let actual = parallel.process(start, end).await.expect("valid input");
                assert_eq!(actual, expected);
            }
            parallel.shutdown().await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn more_workers_than_rows() {
        let pipeline = ParallelPipeline::with_workers(
            PipelineConfig {
                denoise: true,
                ..PipelineConfig::default()
            },
            16,
        );
        assert_eq!(pipeline.worker_count(), 16);

        let start = Frame::filled(6, 2, 0).expect("valid frame");
        let end = Frame::filled(6, 2, 200).expect("valid frame");
        let report = pipeline.process(start, end).await.expect("valid input");
        // Every pixel moved; the opening erodes the two-row strip to nothing.
        assert_eq!(report.difference.max_delta(), 200);
        assert!(report.mask.is_empty());
    }

    #[tokio::test]
    async fn runs_on_current_thread_runtime() {
        let pipeline = ParallelPipeline::with_workers(PipelineConfig::default(), 0);
        assert_eq!(pipeline.worker_count(), 1);

        let start = Arc::new(Frame::filled(5, 5, 100).expect("valid frame"));
        let report = pipeline
            .process(Arc::clone(&start), Arc::clone(&start))
            .await
            .expect("valid input");
        assert!(report.frame_delta_is_zero());
        assert!(report.mask.is_empty());
    }

    #[tokio::test]
    async fn large_frame_leaves_executor_responsive() {
        // On a single executor thread, a concurrently spawned task still gets to
        // run while the bands are being computed off-thread.
        let pipeline = ParallelPipeline::with_workers(
            PipelineConfig {
                denoise: true,
                ..PipelineConfig::default()
            },
            2,
        );
        let mut rng = StdRng::seed_from_u64(77);
        let (start, end) = noisy_pair(&mut rng, 640, 480);
        let expected = MotionPipeline::new(pipeline.config().clone())
            .process(&start, &end)
            .expect("valid input");

        let heartbeat = tokio::spawn(async { 42 });
        let report = pipeline.process(start, end).await.expect("valid input");
        assert_eq!(heartbeat.await.expect("heartbeat task"), 42);
        assert_eq!(report, expected);
        pipeline.shutdown().await;
    }

    #[test]
    #[should_panic]
    fn constructing_outside_a_runtime_panics() {
        let _ = ParallelPipeline::with_workers(PipelineConfig::default(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rejects_mismatched_frames() {
        let pipeline = ParallelPipeline::new(PipelineConfig::default());
        let start = Frame::filled(4, 4, 0).expect("valid frame");
        let end = Frame::filled(4, 3, 0).expect("valid frame");
        assert!(matches!(
            pipeline.process(start, end).await,
            Err(MotionError::DimensionMismatch { .. })
        ));
    }
}
