//! Background execution of pipeline jobs.
//!
//! A [`PipelineWorker`] owns a [`PointCloudPipeline`] on its own thread. Jobs
//! go in over one channel and [`WorkerEvent`]s come back over another, so a
//! host can poll for progress without blocking. One job runs at a time; a
//! submit while a job is in flight is rejected.

use crate::config::PipelineConfig;
use crate::processor::PointCloudPipeline;
use crate::stage::{Stage, StageOutcome, LOAD, PERSIST};
use cindir_io::PlyEncoding;
use crossbeam::channel::{self, Receiver, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    /// Sleep before every step. Zero in production, used to hold a job open
    /// in tests and demos.
    pub simulated_stage_delay: Duration,
    pub ply_encoding: PlyEncoding,
    /// Size of the worker's own rayon pool. `None` runs jobs on the global
    /// pool.
    pub threads: Option<usize>,
}

impl WorkerConfig {
    /// Output encoding and thread count taken from a pipeline config.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            ply_encoding: config.output.ply_encoding,
            threads: config.threads,
            ..Self::default()
        }
    }
}

/// Stages to run on the loaded cloud, optionally followed by persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRequest {
    pub stages: Vec<Stage>,
    pub continue_on_error: bool,
    pub output: Option<PathBuf>,
}

impl ProcessRequest {
    /// The enabled stages of `config`, persisted to its output directory.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            stages: config.stages(),
            continue_on_error: config.continue_on_error,
            output: Some(config.output.directory.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Import(PathBuf),
    Process(ProcessRequest),
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::Import(_) => JobKind::Import,
            Job::Process(_) => JobKind::Process,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Import,
    Process,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    JobStarted(JobKind),
    StageStarted(&'static str),
    StageCompleted {
        stage: &'static str,
        outcome: StageOutcome,
    },
    StageFailed {
        stage: &'static str,
        error: String,
    },
    JobFinished {
        kind: JobKind,
        success: bool,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("A job is already running")]
    Busy,
    #[error("The worker thread has stopped")]
    Disconnected,
}

enum Command {
    Run(Job),
    Stop,
}

pub struct PipelineWorker {
    tx_cmd: Sender<Command>,
    rx_events: Receiver<WorkerEvent>,
    busy: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<PointCloudPipeline>>,
}

impl PipelineWorker {
    pub fn new(config: WorkerConfig) -> Self {
        let (tx_cmd, rx_cmd) = channel::unbounded::<Command>();
        let (tx_events, rx_events) = channel::unbounded::<WorkerEvent>();
        let busy = Arc::new(AtomicBool::new(false));

        let busy_clone = Arc::clone(&busy);
        let thread_handle = thread::spawn(move || {
            let pipeline = PointCloudPipeline::new().with_ply_encoding(config.ply_encoding);
            let pool = stage_pool(config.threads);
            worker_thread(
                pipeline,
                pool,
                rx_cmd,
                tx_events,
                busy_clone,
                config.simulated_stage_delay,
            )
        });

        Self {
            tx_cmd,
            rx_events,
            busy,
            thread_handle: Some(thread_handle),
        }
    }

    /// Queues a job, or rejects it while another job is running.
    pub fn submit(&self, job: Job) -> Result<(), SubmitError> {
        if self
            .thread_handle
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
        {
            return Err(SubmitError::Disconnected);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SubmitError::Busy);
        }
        if self.tx_cmd.send(Command::Run(job)).is_err() {
            self.busy.store(false, Ordering::Release);
            return Err(SubmitError::Disconnected);
        }
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn try_recv_event(&self) -> Option<WorkerEvent> {
        self.rx_events.try_recv().ok()
    }

    /// Blocks until the next event, `None` once the worker has stopped.
    pub fn recv_event(&self) -> Option<WorkerEvent> {
        self.rx_events.recv().ok()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<WorkerEvent> {
        self.rx_events.recv_timeout(timeout).ok()
    }

    /// Waits for the current job, stops the thread and hands back the pipeline.
    pub fn shutdown(mut self) -> Option<PointCloudPipeline> {
        let _ = self.tx_cmd.send(Command::Stop);
        self.thread_handle.take().and_then(|handle| handle.join().ok())
    }
}

impl Default for PipelineWorker {
    fn default() -> Self {
        Self::new(WorkerConfig::default())
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(Command::Stop);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Dedicated pool for the per-point stages, or `None` for the global pool.
///
/// A pool that fails to build falls back to the global one.
fn stage_pool(threads: Option<usize>) -> Option<ThreadPool> {
    let threads = threads?;
    match ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("cindir-stage-{i}"))
        .build()
    {
        Ok(pool) => {
            tracing::debug!(threads = pool.current_num_threads(), "stage pool ready");
            Some(pool)
        }
        Err(e) => {
            tracing::warn!(error = %e, "stage pool unavailable, using the global pool");
            None
        }
    }
}

fn worker_thread(
    mut pipeline: PointCloudPipeline,
    pool: Option<ThreadPool>,
    rx_cmd: Receiver<Command>,
    tx_events: Sender<WorkerEvent>,
    busy: Arc<AtomicBool>,
    delay: Duration,
) -> PointCloudPipeline {
    let emit = |event: WorkerEvent| {
        let _ = tx_events.send(event);
    };

    while let Ok(cmd) = rx_cmd.recv() {
        let job = match cmd {
            Command::Run(job) => job,
            Command::Stop => break,
        };

        let kind = job.kind();
        emit(WorkerEvent::JobStarted(kind));
        let success = match &pool {
            Some(pool) => pool.install(|| run_job(&mut pipeline, job, &emit, delay)),
            None => run_job(&mut pipeline, job, &emit, delay),
        };

        busy.store(false, Ordering::Release);
        emit(WorkerEvent::JobFinished { kind, success });
    }

    pipeline
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs one step and reports it. Returns whether it succeeded.
///
/// A panic inside the step is reported as a failure so the job still
/// finishes and the worker stays usable.
fn step(
    name: &'static str,
    emit: &impl Fn(WorkerEvent),
    delay: Duration,
    run: impl FnOnce() -> cindir_core::Result<StageOutcome>,
) -> bool {
    emit(WorkerEvent::StageStarted(name));
    if !delay.is_zero() {
        thread::sleep(delay);
    }
    let result = panic::catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(stage = name, %message, "stage panicked");
        Err(cindir_core::Error::InvalidData(format!(
            "stage panicked: {message}"
        )))
    });
    match result {
        Ok(outcome) => {
            emit(WorkerEvent::StageCompleted {
                stage: name,
                outcome,
            });
            true
        }
        Err(e) => {
            emit(WorkerEvent::StageFailed {
                stage: name,
                error: e.to_string(),
            });
            false
        }
    }
}

fn run_job(
    pipeline: &mut PointCloudPipeline,
    job: Job,
    emit: &impl Fn(WorkerEvent),
    delay: Duration,
) -> bool {
    match job {
        Job::Import(path) => step(LOAD, emit, delay, || pipeline.run_load(&path)),
        Job::Process(request) => {
            let mut success = true;
            for stage in &request.stages {
                if !step(stage.name(), emit, delay, || pipeline.run_stage(stage)) {
                    success = false;
                    if !request.continue_on_error {
                        tracing::warn!(stage = stage.name(), "stopping after failed stage");
                        return false;
                    }
                }
            }

            if let Some(dir) = &request.output {
                let persisted = step(PERSIST, emit, delay, || {
                    pipeline.persist(dir).map(StageOutcome::Persisted)
                });
                success &= persisted;
            }
            success
        }
    }
}
