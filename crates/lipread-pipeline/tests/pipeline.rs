//! End-to-end runs of the full pipeline on a synthetic source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use lipread_camera::{CameraError, SyntheticSource};
use lipread_pipeline::{
    Pipeline, PipelineConfig, PipelineError, PipelineState, StageExit, Window,
};
use serial_test::serial;

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        window_size: 4,
        processing_interval: Duration::from_millis(30),
        target_fps: Some(200.0),
        offer_timeout: Duration::from_millis(5),
        join_timeout: Duration::from_secs(2),
        read_backoff: Duration::from_millis(1),
        poll_interval: Duration::from_millis(5),
        idle_sleep: Duration::from_millis(2),
        drop_warn_after: 3,
        results_capacity: 64,
    }
}

fn wait_for(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let until = Instant::now() + deadline;
    while Instant::now() < until {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

#[test]
#[serial]
fn slow_stage_gets_fresh_windows_and_drops_the_rest() {
    let source = SyntheticSource::open(8, 8).unwrap();
    let released = source.release_flag();

    let processor = |w: &Window| -> anyhow::Result<(u64, u64)> {
        thread::sleep(Duration::from_millis(80));
        w.span().ok_or_else(|| anyhow::anyhow!("empty window"))
    };
    let pipeline = Pipeline::start(source, processor, fast_config()).unwrap();

    assert!(wait_for(Duration::from_secs(5), || pipeline.results().len() >= 3));
    let results: Vec<_> = pipeline.results().try_iter().collect();
    for r in &results {
        let (first, last) = r.output;
        assert_eq!(last - first, 3, "window must be 4 contiguous frames");
        assert!(r.latency >= Duration::from_millis(80));
    }
    for pair in results.windows(2) {
        assert!(pair[0].sequence < pair[1].sequence);
        assert!(pair[0].output.1 < pair[1].output.1);
    }

    let report = pipeline.shutdown();
    assert!(report.is_clean(), "{report:?}");
    assert!(released.load(Ordering::Acquire));
    assert!(report.stats.windows_dropped > 0);
    assert!(report.stats.frames_captured >= 4);
}

#[test]
#[serial]
fn never_more_than_one_window_in_flight() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let processor = {
        let (active, peak, seen) = (Arc::clone(&active), Arc::clone(&peak), Arc::clone(&seen));
        move |w: &Window| -> anyhow::Result<()> {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            seen.lock().unwrap().push(w.sequence());
            thread::sleep(Duration::from_millis(15));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    };
    let pipeline =
        Pipeline::start(SyntheticSource::open(2, 2).unwrap(), processor, fast_config()).unwrap();
    assert!(wait_for(Duration::from_secs(5), || seen.lock().unwrap().len() >= 5));
    let report = pipeline.shutdown();

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    let seen = seen.lock().unwrap();
    assert!(seen.windows(2).all(|p| p[0] < p[1]));
    assert_eq!(report.stats.windows_processed, report.stats.windows_sampled);
}

#[test]
#[serial]
fn accepted_windows_are_drained_on_shutdown() {
    let processed = Arc::new(AtomicUsize::new(0));
    let processor = {
        let processed = Arc::clone(&processed);
        move |_: &Window| -> anyhow::Result<()> {
            thread::sleep(Duration::from_millis(150));
            processed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    };
    let pipeline =
        Pipeline::start(SyntheticSource::open(2, 2).unwrap(), processor, fast_config()).unwrap();

    // shut down while the first window is still being processed
    assert!(wait_for(Duration::from_secs(5), || pipeline.stats().windows_sampled >= 1));
    let report = pipeline.shutdown();

    assert_eq!(report.worker, StageExit::Clean);
    assert!(report.stats.windows_sampled >= 1);
    assert_eq!(
        processed.load(Ordering::SeqCst) as u64,
        report.stats.windows_sampled
    );
}

#[test]
#[serial]
fn failing_stage_does_not_wedge_the_slot() {
    let calls = Arc::new(AtomicUsize::new(0));
    let processor = {
        let calls = Arc::clone(&calls);
        move |w: &Window| -> anyhow::Result<u64> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("refiner unreachable");
            }
            Ok(w.sequence())
        }
    };
    let pipeline =
        Pipeline::start(SyntheticSource::open(2, 2).unwrap(), processor, fast_config()).unwrap();

    let first_ok = pipeline.results().recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(first_ok.sequence >= 1);

    let report = pipeline.shutdown();
    assert_eq!(report.stats.processing_failures, 1);
    assert!(report.stats.windows_processed >= 1);
}

#[test]
#[serial]
fn stalled_stage_is_left_behind_after_join_timeout() {
    let config = PipelineConfig {
        join_timeout: Duration::from_millis(100),
        ..fast_config()
    };
    let source = SyntheticSource::open(2, 2).unwrap();
    let released = source.release_flag();
    let processor = |_: &Window| -> anyhow::Result<()> {
        thread::sleep(Duration::from_secs(3));
        Ok(())
    };
    let pipeline = Pipeline::start(source, processor, config).unwrap();
    assert!(wait_for(Duration::from_secs(5), || pipeline.stats().windows_sampled >= 1));

    let started = Instant::now();
    let report = pipeline.shutdown();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.worker, StageExit::TimedOut);
    assert_eq!(report.capture, StageExit::Clean);
    assert!(report.source_released);
    assert!(released.load(Ordering::Acquire));
}

#[test]
fn unavailable_device_fails_synchronously() {
    let result = Pipeline::open(
        || -> lipread_camera::Result<SyntheticSource> {
            Err(CameraError::DeviceUnavailable {
                index: 3,
                reason: "no such device".into(),
            })
        },
        |_: &Window| -> anyhow::Result<()> { Ok(()) },
        fast_config(),
    );
    match result {
        Err(PipelineError::Camera(CameraError::DeviceUnavailable { index, .. })) => {
            assert_eq!(index, 3)
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("pipeline must not start"),
    }
}

#[test]
fn invalid_config_is_rejected_before_start() {
    let config = PipelineConfig {
        window_size: 0,
        ..fast_config()
    };
    let result = Pipeline::start(
        SyntheticSource::open(2, 2).unwrap(),
        |_: &Window| -> anyhow::Result<()> { Ok(()) },
        config,
    );
    assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
}

#[test]
#[serial]
fn dropping_the_pipeline_stops_it() {
    let source = SyntheticSource::open(2, 2).unwrap();
    let released = source.release_flag();
    let pipeline = Pipeline::start(
        source,
        |_: &Window| -> anyhow::Result<()> { Ok(()) },
        fast_config(),
    )
    .unwrap();
    assert_eq!(pipeline.state(), PipelineState::Running);
    assert!(wait_for(Duration::from_secs(2), || pipeline.latest_frame().is_some()));
    drop(pipeline);
    assert!(released.load(Ordering::Acquire));
}
