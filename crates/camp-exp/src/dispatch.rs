//! Bounded-concurrency job dispatch.
//!
//! Every experiment is placed on a bounded queue before any worker starts and
//! the sending side is closed, so each experiment is received at most once.
//! Workers run as long-lived tasks on a thread pool sized to the worker
//! count. Each worker owns one engine session for its whole life and pulls
//! jobs until the queue is empty or the session dies.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use camp_core::errors::{CampaignError, ErrorInfo};
use camp_spec::RunSpec;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::write_job_config;
use crate::engine::{Engine, EngineSession};
use crate::layout::create_exclusive_dir;
use crate::plan::Experiment;
use crate::report::{JobReport, JobStatus};

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerState {
    /// Spawned, no session yet.
    Idle,
    /// Opening the engine session.
    SessionInitializing,
    /// Session open, waiting for the next job.
    SessionReady,
    /// Executing a job.
    JobRunning,
    /// Session released; the worker is done.
    SessionTerminated,
}

/// Per-worker accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    /// Zero-based worker id.
    pub worker_id: usize,
    /// Jobs this worker completed.
    pub completed: usize,
    /// Jobs this worker attempted and failed.
    pub failed: usize,
    /// State the worker ended in.
    pub final_state: WorkerState,
    /// Error that ended the session early, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_error: Option<String>,
}

/// Result of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// One entry per experiment, in planning order.
    pub jobs: Vec<JobReport>,
    /// One entry per worker, by worker id.
    pub workers: Vec<WorkerSummary>,
}

type Queue<'a> = Receiver<(usize, &'a Experiment)>;

struct WorkerOutcome {
    summary: WorkerSummary,
    jobs: Vec<(usize, JobReport)>,
}

fn dispatch_error(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
}

/// Runs every experiment on at most `concurrency` workers.
///
/// A failed job is recorded and its worker continues with the next job. A
/// worker stops when its session cannot be opened, when the session stops
/// being alive, or when a job panics; the remaining queue is left to its
/// siblings and experiments nobody picks up are reported as not dispatched. The job directory must not exist yet, but
/// its parent `Sensitivity_<i>` directory must.
pub fn dispatch(
    experiments: &[Experiment],
    spec: &RunSpec,
    engine: &dyn Engine,
    concurrency: usize,
) -> Result<DispatchReport, CampaignError> {
    if concurrency == 0 {
        return Err(CampaignError::Dispatch(
            dispatch_error("dispatch-no-workers", "concurrency must be at least 1")
                .with_hint("set `cores` to 1 or more"),
        ));
    }
    if experiments.is_empty() {
        return Ok(DispatchReport {
            jobs: Vec::new(),
            workers: Vec::new(),
        });
    }

    let workers = concurrency.min(experiments.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|idx| format!("camp-worker-{idx}"))
        .build()
        .map_err(|err| {
            CampaignError::Dispatch(
                dispatch_error("dispatch-thread-pool", "failed to build worker pool")
                    .with_hint(err.to_string()),
            )
        })?;

    let (queue_tx, queue_rx) = bounded(experiments.len());
    for item in experiments.iter().enumerate() {
        queue_tx.send(item).map_err(|err| {
            CampaignError::Dispatch(
                dispatch_error("dispatch-queue", "failed to enqueue experiment")
                    .with_hint(err.to_string()),
            )
        })?;
    }
    drop(queue_tx);

    info!(jobs = experiments.len(), workers, "dispatching campaign");
    let (done_tx, done_rx) = unbounded();
    pool.scope(|scope| {
        for worker_id in 0..workers {
            let queue = queue_rx.clone();
            let done: Sender<WorkerOutcome> = done_tx.clone();
            scope.spawn(move |_| {
                let outcome = run_worker(worker_id, engine, spec, &queue);
                let _ = done.send(outcome);
            });
        }
    });
    drop(done_tx);

    let mut summaries = Vec::with_capacity(workers);
    let mut indexed = Vec::with_capacity(experiments.len());
    for outcome in done_rx.iter() {
        summaries.push(outcome.summary);
        indexed.extend(outcome.jobs);
    }
    let leftover = queue_rx.len();
    if leftover > 0 {
        warn!(jobs = leftover, "experiments left undispatched");
    }
    for (index, experiment) in queue_rx.try_iter() {
        indexed.push((index, JobReport::new(experiment, JobStatus::not_dispatched())));
    }
    indexed.sort_by_key(|(index, _)| *index);
    summaries.sort_by_key(|summary| summary.worker_id);

    Ok(DispatchReport {
        jobs: indexed.into_iter().map(|(_, report)| report).collect(),
        workers: summaries,
    })
}

fn transition(worker_id: usize, state: &mut WorkerState, next: WorkerState) {
    debug!(worker = worker_id, from = ?state, to = ?next, "worker state");
    *state = next;
}

fn run_worker(
    worker_id: usize,
    engine: &dyn Engine,
    spec: &RunSpec,
    queue: &Queue<'_>,
) -> WorkerOutcome {
    let mut state = WorkerState::Idle;
    let mut summary = WorkerSummary {
        worker_id,
        completed: 0,
        failed: 0,
        final_state: state,
        session_error: None,
    };
    let mut jobs = Vec::new();

    transition(worker_id, &mut state, WorkerState::SessionInitializing);
    let opened = panic::catch_unwind(AssertUnwindSafe(|| engine.open_session(worker_id)))
        .unwrap_or_else(|payload| {
            Err(CampaignError::Engine(
                ErrorInfo::new("engine-panic", panic_message("session", payload.as_ref()))
                    .with_context("worker", worker_id.to_string()),
            ))
        });
    let mut session = match opened {
        Ok(session) => session,
        Err(err) => {
            error!(worker = worker_id, error = %err, "engine session failed to start");
            summary.session_error = Some(err.to_string());
            transition(worker_id, &mut state, WorkerState::SessionTerminated);
            summary.final_state = state;
            return WorkerOutcome { summary, jobs };
        }
    };
    transition(worker_id, &mut state, WorkerState::SessionReady);

    loop {
        if !session.is_alive() {
            let message = jobs
                .last()
                .and_then(|(_, job): &(usize, JobReport)| job.status.error.clone())
                .unwrap_or_else(|| "engine session ended".to_string());
            error!(worker = worker_id, error = %message, "engine session lost");
            summary.session_error = Some(message);
            break;
        }
        let Ok((index, experiment)) = queue.recv() else {
            break;
        };
        transition(worker_id, &mut state, WorkerState::JobRunning);
        let mut panicked = false;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            run_job(session.as_mut(), experiment, spec)
        }))
        .unwrap_or_else(|payload| {
            panicked = true;
            Err(CampaignError::Engine(
                ErrorInfo::new("engine-panic", panic_message("job", payload.as_ref()))
                    .with_context("worker", worker_id.to_string()),
            ))
        });
        let status = match result {
            Ok(()) => {
                summary.completed += 1;
                debug!(
                    worker = worker_id,
                    sensitivity = experiment.sensitivity_index,
                    run = experiment.replicate_index,
                    "job complete"
                );
                JobStatus::success(worker_id)
            }
            Err(err) => {
                summary.failed += 1;
                warn!(
                    worker = worker_id,
                    sensitivity = experiment.sensitivity_index,
                    run = experiment.replicate_index,
                    error = %err,
                    "job failed"
                );
                JobStatus::failed(worker_id, err.to_string())
            }
        };
        let error = status.error.clone();
        jobs.push((index, JobReport::new(experiment, status)));
        if panicked {
            // Engine state after an unwind is unknown.
            summary.session_error = error;
            break;
        }
        transition(worker_id, &mut state, WorkerState::SessionReady);
    }

    drop(session);
    transition(worker_id, &mut state, WorkerState::SessionTerminated);
    summary.final_state = state;
    WorkerOutcome { summary, jobs }
}

fn run_job(
    session: &mut dyn EngineSession,
    experiment: &Experiment,
    spec: &RunSpec,
) -> Result<(), CampaignError> {
    create_exclusive_dir(&experiment.output_path)?;
    let config = write_job_config(experiment, spec)?;
    session.load(&config)?;
    session.reset()?;
    session.run(spec.steps)
}

fn panic_message(what: &str, payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("{what} panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("{what} panicked: {message}")
    } else {
        format!("{what} panicked")
    }
}
