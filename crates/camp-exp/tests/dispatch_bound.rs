use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use camp_core::errors::{CampaignError, ErrorInfo};
use camp_design::generate;
use camp_exp::layout::{create_exclusive_dir, sensitivity_dir};
use camp_exp::{
    dispatch, plan, read_job_config, Engine, EngineSession, Experiment, JobState, WorkerState,
};
use camp_spec::{parse_spec_str, RunSpec};

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    peak: AtomicUsize,
    sessions: AtomicUsize,
    runs: AtomicUsize,
}

#[derive(Default)]
struct InstrumentedEngine {
    counters: Arc<Counters>,
    fail_on: Option<(usize, u32)>,
    panic_on: Option<(usize, u32)>,
    alive_for: Option<usize>,
}

struct InstrumentedSession {
    counters: Arc<Counters>,
    fail_on: Option<(usize, u32)>,
    panic_on: Option<(usize, u32)>,
    alive_for: Option<usize>,
    current: Option<(usize, u32)>,
    finished: usize,
}

impl Engine for InstrumentedEngine {
    fn open_session(&self, _worker_id: usize) -> Result<Box<dyn EngineSession>, CampaignError> {
        self.counters.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InstrumentedSession {
            counters: Arc::clone(&self.counters),
            fail_on: self.fail_on,
            panic_on: self.panic_on,
            alive_for: self.alive_for,
            current: None,
            finished: 0,
        }))
    }
}

impl EngineSession for InstrumentedSession {
    fn load(&mut self, config: &Path) -> Result<(), CampaignError> {
        let job = read_job_config(config)?;
        let key = (job.general.sensitivity, job.general.run);
        if self.panic_on == Some(key) {
            panic!("engine crashed on {key:?}");
        }
        self.current = Some(key);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), CampaignError> {
        Ok(())
    }

    fn run(&mut self, _steps: u32) -> Result<(), CampaignError> {
        let now = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(15));
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        self.counters.runs.fetch_add(1, Ordering::SeqCst);
        self.finished += 1;
        if self.current == self.fail_on {
            return Err(CampaignError::Engine(ErrorInfo::new(
                "engine-command",
                "model diverged",
            )));
        }
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        self.alive_for.map_or(true, |limit| self.finished < limit)
    }
}

struct PanickyStart {
    inner: InstrumentedEngine,
}

impl Engine for PanickyStart {
    fn open_session(&self, worker_id: usize) -> Result<Box<dyn EngineSession>, CampaignError> {
        if worker_id == 0 {
            panic!("license server unreachable");
        }
        self.inner.open_session(worker_id)
    }
}

struct BrokenEngine;

impl Engine for BrokenEngine {
    fn open_session(&self, worker_id: usize) -> Result<Box<dyn EngineSession>, CampaignError> {
        Err(CampaignError::Engine(
            ErrorInfo::new("engine-spawn", "no license available")
                .with_context("worker", worker_id.to_string()),
        ))
    }
}

fn prepare(spec_text: &str, root: &Path) -> (RunSpec, Vec<Experiment>) {
    let spec = parse_spec_str(spec_text).expect("spec");
    let design = generate(&spec).expect("design");
    let experiments = plan(&spec, &design, root).expect("plan");
    for (index, _) in design.indexed_rows() {
        create_exclusive_dir(&sensitivity_dir(root, index)).expect("sensitivity dir");
    }
    (spec, experiments)
}

const SWEEP: &str = "runs: 3\n\
                     sensitivity: single\n\
                     sensitivity_variables: [gas_price]\n\
                     sensitivity_runs: 2\n\
                     gas_price_bounds: [10, 40]\n";

#[test]
fn no_more_than_concurrency_jobs_run_at_once() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let (spec, experiments) = prepare("runs: 12\n", temp.path());
    let engine = InstrumentedEngine::default();

    let report = dispatch(&experiments, &spec, &engine, 3).expect("dispatch");

    let peak = engine.counters.peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak concurrency {peak}");
    assert_eq!(engine.counters.runs.load(Ordering::SeqCst), 12);
    assert_eq!(engine.counters.sessions.load(Ordering::SeqCst), 3);
    assert_eq!(report.workers.len(), 3);
    assert!(report
        .workers
        .iter()
        .all(|worker| worker.final_state == WorkerState::SessionTerminated));
    assert_eq!(
        report.workers.iter().map(|worker| worker.completed).sum::<usize>(),
        12
    );

    let keys: Vec<(usize, u32)> = report
        .jobs
        .iter()
        .map(|job| (job.sensitivity_index, job.replicate_index))
        .collect();
    let planned: Vec<(usize, u32)> = experiments.iter().map(Experiment::key).collect();
    assert_eq!(keys, planned);
    for experiment in &experiments {
        assert!(experiment.output_path.join("settings.yaml").is_file());
    }
}

#[test]
fn worker_count_never_exceeds_job_count() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let (spec, experiments) = prepare("runs: 2\n", temp.path());
    let engine = InstrumentedEngine::default();
    let report = dispatch(&experiments, &spec, &engine, 8).expect("dispatch");
    assert_eq!(report.workers.len(), 2);
    assert_eq!(engine.counters.sessions.load(Ordering::SeqCst), 2);
}

#[test]
fn failed_job_is_attributed_and_siblings_complete() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let (spec, experiments) = prepare(SWEEP, temp.path());
    let engine = InstrumentedEngine {
        fail_on: Some((2, 1)),
        ..InstrumentedEngine::default()
    };

    let report = dispatch(&experiments, &spec, &engine, 2).expect("dispatch");

    assert_eq!(report.jobs.len(), 6);
    let failed: Vec<_> = report
        .jobs
        .iter()
        .filter(|job| job.status.state == JobState::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    let job = failed[0];
    assert_eq!((job.sensitivity_index, job.replicate_index), (2, 1));
    let expected: PathBuf = temp.path().join("Sensitivity_2").join("Run_1");
    assert_eq!(job.output_path, expected);
    let message = job.status.error.as_deref().expect("error message");
    assert!(message.contains("model diverged"), "{message}");
    assert!(job.status.worker.is_some());

    let complete = report
        .jobs
        .iter()
        .filter(|job| job.status.state == JobState::Complete)
        .count();
    assert_eq!(complete, 5);
    assert_eq!(engine.counters.sessions.load(Ordering::SeqCst), 2);
}

#[test]
fn panicking_job_fails_alone_and_retires_its_worker() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let (spec, experiments) = prepare(SWEEP, temp.path());
    let engine = InstrumentedEngine {
        panic_on: Some((1, 2)),
        ..InstrumentedEngine::default()
    };

    let report = dispatch(&experiments, &spec, &engine, 2).expect("dispatch");

    let job = &report.jobs[1];
    assert_eq!((job.sensitivity_index, job.replicate_index), (1, 2));
    assert_eq!(job.status.state, JobState::Failed);
    let message = job.status.error.as_deref().expect("panic message");
    assert!(message.contains("engine crashed"), "{message}");
    let complete = report
        .jobs
        .iter()
        .filter(|job| job.status.state == JobState::Complete)
        .count();
    assert_eq!(complete, 5);

    let retired: Vec<_> = report
        .workers
        .iter()
        .filter(|worker| worker.session_error.is_some())
        .collect();
    assert_eq!(retired.len(), 1);
    assert_eq!(retired[0].failed, 1);
    assert_eq!(Some(retired[0].worker_id), job.status.worker);
    assert!(report
        .workers
        .iter()
        .all(|worker| worker.final_state == WorkerState::SessionTerminated));
    assert_eq!(engine.counters.sessions.load(Ordering::SeqCst), 2);
}

#[test]
fn dead_session_stops_pulling_jobs() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let (spec, experiments) = prepare("runs: 5\n", temp.path());
    let engine = InstrumentedEngine {
        alive_for: Some(2),
        ..InstrumentedEngine::default()
    };

    let report = dispatch(&experiments, &spec, &engine, 1).expect("dispatch");

    let states: Vec<JobState> = report.jobs.iter().map(|job| job.status.state).collect();
    assert_eq!(
        states,
        vec![
            JobState::Complete,
            JobState::Complete,
            JobState::NotDispatched,
            JobState::NotDispatched,
            JobState::NotDispatched,
        ]
    );
    assert_eq!(engine.counters.runs.load(Ordering::SeqCst), 2);
    let worker = &report.workers[0];
    assert_eq!((worker.completed, worker.failed), (2, 0));
    assert_eq!(worker.final_state, WorkerState::SessionTerminated);
    let error = worker.session_error.as_deref().expect("session error");
    assert!(error.contains("session ended"), "{error}");
    assert!(!experiments[2].output_path.exists());
}

#[test]
fn panic_while_opening_a_session_leaves_work_to_siblings() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let (spec, experiments) = prepare("runs: 6\n", temp.path());
    let engine = PanickyStart {
        inner: InstrumentedEngine::default(),
    };

    let report = dispatch(&experiments, &spec, &engine, 2).expect("dispatch");

    assert!(report
        .jobs
        .iter()
        .all(|job| job.status.state == JobState::Complete && job.status.worker == Some(1)));
    let first = &report.workers[0];
    assert_eq!(first.worker_id, 0);
    assert_eq!(first.final_state, WorkerState::SessionTerminated);
    let error = first.session_error.as_deref().expect("session error");
    assert!(error.contains("license server unreachable"), "{error}");
    assert_eq!(report.workers[1].completed, 6);
}

#[test]
fn jobs_without_a_worker_are_not_dispatched() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let (spec, experiments) = prepare("runs: 4\n", temp.path());

    let report = dispatch(&experiments, &spec, &BrokenEngine, 2).expect("dispatch");

    assert_eq!(report.jobs.len(), 4);
    assert!(report
        .jobs
        .iter()
        .all(|job| job.status.state == JobState::NotDispatched && job.status.worker.is_none()));
    assert_eq!(report.workers.len(), 2);
    for worker in &report.workers {
        assert_eq!(worker.final_state, WorkerState::SessionTerminated);
        let error = worker.session_error.as_deref().expect("session error");
        assert!(error.contains("no license available"));
    }
    assert!(!experiments[0].output_path.exists());
}

#[test]
fn zero_concurrency_is_a_dispatch_error() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let (spec, experiments) = prepare("runs: 1\n", temp.path());
    let err = dispatch(&experiments, &spec, &InstrumentedEngine::default(), 0)
        .expect_err("no workers");
    assert!(matches!(err, CampaignError::Dispatch(_)));
    assert_eq!(err.exit_code(), 31);
}
