use cindir_pipeline::{
    Job, JobKind, PipelineConfig, PipelineWorker, ProcessRequest, SubmitError, WorkerConfig,
    WorkerEvent,
};
use std::path::Path;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(30);

fn grid_file(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("grid.xyz");
    let mut text = String::new();
    for x in 0..12 {
        for y in 0..12 {
            let (px, py) = (x as f64 * 0.05, y as f64 * 0.05);
            text.push_str(&format!("{px} {py} {}\n", (x * y) as f64 * 0.001));
        }
    }
    std::fs::write(&path, text).unwrap();
    path
}

/// Collects events up to and including the next `JobFinished`.
fn drain_job(worker: &PipelineWorker) -> Vec<WorkerEvent> {
    let mut events = Vec::new();
    loop {
        let event = worker.recv_event_timeout(WAIT).expect("worker stalled");
        let done = matches!(event, WorkerEvent::JobFinished { .. });
        events.push(event);
        if done {
            return events;
        }
    }
}

fn stage_names(events: &[WorkerEvent]) -> Vec<&'static str> {
    events
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::StageStarted(name) => Some(*name),
            _ => None,
        })
        .collect()
}

#[test]
fn test_import_event_order() {
    let dir = tempfile::tempdir().unwrap();
    let worker = PipelineWorker::default();
    worker.submit(Job::Import(grid_file(dir.path()))).unwrap();

    let events = drain_job(&worker);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], WorkerEvent::JobStarted(JobKind::Import));
    assert_eq!(events[1], WorkerEvent::StageStarted("load"));
    assert!(matches!(events[2], WorkerEvent::StageCompleted { stage: "load", .. }));
    assert_eq!(
        events[3],
        WorkerEvent::JobFinished {
            kind: JobKind::Import,
            success: true
        }
    );

    let pipeline = worker.shutdown().unwrap();
    assert_eq!(pipeline.original_point_count(), 144);
}

#[test]
fn test_submit_while_busy_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let worker = PipelineWorker::new(WorkerConfig {
        simulated_stage_delay: Duration::from_millis(300),
        ..WorkerConfig::default()
    });

    worker.submit(Job::Import(grid_file(dir.path()))).unwrap();
    assert!(worker.is_busy());
    assert_eq!(
        worker.submit(Job::Import(dir.path().join("other.xyz"))),
        Err(SubmitError::Busy)
    );

    drain_job(&worker);
    assert!(!worker.is_busy());
    assert!(worker.submit(Job::Import(grid_file(dir.path()))).is_ok());
    drain_job(&worker);
}

#[test]
fn test_process_runs_config_stages_then_persists() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results");
    let mut config = PipelineConfig::cleanup_only();
    config.downsample.enabled = true;
    config.downsample.params.voxel_size = 0.2;
    config.output.directory = out.clone();

    let worker = PipelineWorker::default();
    worker.submit(Job::Import(grid_file(dir.path()))).unwrap();
    drain_job(&worker);
    worker
        .submit(Job::Process(ProcessRequest::from_config(&config)))
        .unwrap();
    let events = drain_job(&worker);

    assert_eq!(
        stage_names(&events),
        ["remove_outliers", "estimate_normals", "downsample", "persist"]
    );
    assert_eq!(
        events.last(),
        Some(&WorkerEvent::JobFinished {
            kind: JobKind::Process,
            success: true
        })
    );
    let files: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
    assert_eq!(files.len(), 2);
}

#[test]
fn test_first_failure_stops_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default();
    config.output.directory = dir.path().join("never");

    let worker = PipelineWorker::default();
    worker
        .submit(Job::Process(ProcessRequest::from_config(&config)))
        .unwrap();
    let events = drain_job(&worker);

    assert_eq!(stage_names(&events), ["remove_outliers"]);
    assert!(events.iter().any(|e| matches!(
        e,
        WorkerEvent::StageFailed { stage: "remove_outliers", error } if error.contains("requires")
    )));
    assert!(!dir.path().join("never").exists());
}

#[test]
fn test_continue_on_error_attempts_everything() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default();
    config.continue_on_error = true;
    config.output.directory = dir.path().join("out");

    let worker = PipelineWorker::default();
    worker
        .submit(Job::Process(ProcessRequest::from_config(&config)))
        .unwrap();
    let events = drain_job(&worker);

    assert_eq!(
        stage_names(&events),
        ["remove_outliers", "estimate_normals", "reconstruct_mesh", "persist"]
    );
    assert_eq!(
        events.last(),
        Some(&WorkerEvent::JobFinished {
            kind: JobKind::Process,
            success: false
        })
    );
    // Nothing was loaded, so only the metadata is written.
    assert_eq!(std::fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
}

#[test]
fn test_configured_thread_count_runs_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        threads: Some(2),
        ..PipelineConfig::cleanup_only()
    };
    let worker = PipelineWorker::new(WorkerConfig::from_config(&config));

    worker.submit(Job::Import(grid_file(dir.path()))).unwrap();
    drain_job(&worker);
    worker
        .submit(Job::Process(ProcessRequest {
            output: None,
            ..ProcessRequest::from_config(&config)
        }))
        .unwrap();
    let events = drain_job(&worker);

    assert_eq!(stage_names(&events), ["remove_outliers", "estimate_normals"]);
    assert!(matches!(
        events.last(),
        Some(WorkerEvent::JobFinished { success: true, .. })
    ));
    let pipeline = worker.shutdown().unwrap();
    assert!(pipeline.cloud().unwrap().has_normals());
}
