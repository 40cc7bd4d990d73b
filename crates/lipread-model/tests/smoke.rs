//! Model stages driven by the real pipeline on a synthetic camera.

use std::time::Duration;

use lipread_camera::{Frame, SyntheticSource};
use lipread_model::{
    ConstantReader, FaceMesh, Landmark, LipReadingPipeline, MeshLipDetector, PassthroughRefiner,
    Reading,
};
use lipread_pipeline::{Pipeline, PipelineConfig};
use serial_test::serial;

/// A face in every frame whose red channel is even.
struct RedParity;

impl FaceMesh for RedParity {
    fn faces(&mut self, frame: &Frame) -> lipread_model::Result<Vec<Vec<Landmark>>> {
        let red = frame.pixels().get_pixel(0, 0)[0];
        Ok(if red % 2 == 0 {
            vec![vec![Landmark::new(0.5, 0.5); 468]]
        } else {
            Vec::new()
        })
    }
}

#[test]
#[serial]
fn windows_become_readings() {
    let config = PipelineConfig {
        window_size: 8,
        processing_interval: Duration::from_millis(40),
        target_fps: Some(200.0),
        offer_timeout: Duration::from_millis(5),
        read_backoff: Duration::from_millis(1),
        poll_interval: Duration::from_millis(5),
        idle_sleep: Duration::from_millis(2),
        ..Default::default()
    };
    let processor = LipReadingPipeline::new(
        MeshLipDetector::new(RedParity),
        ConstantReader::new("hello"),
        PassthroughRefiner,
    );
    let pipeline = Pipeline::start(SyntheticSource::open(4, 4).unwrap(), processor, config).unwrap();

    let first = pipeline
        .results()
        .recv_timeout(Duration::from_secs(5))
        .expect("no reading within 5s");
    assert_eq!(
        first.output,
        Reading::Text {
            raw: "hello".into(),
            refined: "hello".into()
        }
    );

    let report = pipeline.shutdown();
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.stats.processing_failures, 0);
}
