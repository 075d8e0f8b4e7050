//! Integration tests for the monitor pipeline over mock devices.
//!
//! No audio hardware is required: a scripted fake capture device feeds the
//! loop and a collecting fake playback device records exactly what would
//! have been played, so ordering, recovery and shutdown are all checkable.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use monitor_audio::{
    CancelToken, MockCapture, MockPlayback, MonitorConfig, MonitorError, PassBand, PipelineLoop,
    PipelineState, TransferError, Visualizer,
};

fn test_config(block_len: usize, filter: Option<Vec<PassBand>>) -> MonitorConfig {
    MonitorConfig {
        retention: Duration::from_secs(1),
        block_len,
        filter,
        wait_timeout: Duration::from_millis(1),
    }
}

/// A visualizer that records magnitude sums and stops when told to.
struct RecordingVisualizer {
    sums: Arc<Mutex<Vec<f64>>>,
    stop_after: usize,
}

impl Visualizer for RecordingVisualizer {
    fn render(&mut self, spectrum: &[f64]) -> bool {
        let mut sums = self.sums.lock().unwrap();
        sums.push(spectrum.iter().sum());
        sums.len() >= self.stop_after
    }
}

#[test]
fn test_pass_through_preserves_sequence() {
    let samples: Vec<i16> = (0..1000).map(|i| (i % 251) - 125).collect();
    let cancel = CancelToken::new();

    let capture = MockCapture::new(samples.clone(), 1, 128).cancel_when_drained(cancel.clone());
    let capture_stats = capture.stats();
    let playback = MockPlayback::new(1);
    let sink = playback.sink();

    let mut pipeline = PipelineLoop::new(
        Box::new(capture),
        Box::new(playback),
        &test_config(256, None),
        cancel,
    )
    .unwrap();

    assert_eq!(pipeline.state(), PipelineState::Idle);
    pipeline.run().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Stopped);

    // Every frame arrives, in order, with nothing lost or duplicated.
    assert_eq!(*sink.lock().unwrap(), samples);
    assert_eq!(capture_stats.lock().unwrap().frames_moved, 1000);
}

#[test]
fn test_stereo_pass_through_keeps_frames_paired() {
    let mut samples = Vec::new();
    for i in 0..500i16 {
        samples.push(i);
        samples.push(-i);
    }
    let cancel = CancelToken::new();

    let capture = MockCapture::new(samples.clone(), 2, 64).cancel_when_drained(cancel.clone());
    let playback = MockPlayback::new(2);
    let sink = playback.sink();

    PipelineLoop::new(
        Box::new(capture),
        Box::new(playback),
        &test_config(256, None),
        cancel,
    )
    .unwrap()
    .run()
    .unwrap();

    assert_eq!(*sink.lock().unwrap(), samples);
}

#[test]
fn test_underrun_on_capture_recovers_once() {
    let samples: Vec<i16> = (0..512).collect();
    let cancel = CancelToken::new();

    let mut capture = MockCapture::new(samples.clone(), 1, 64).cancel_when_drained(cancel.clone());
    capture.inject_error(TransferError::Underrun);
    let stats = capture.stats();
    let playback = MockPlayback::new(1);
    let sink = playback.sink();

    PipelineLoop::new(
        Box::new(capture),
        Box::new(playback),
        &test_config(256, None),
        cancel,
    )
    .unwrap()
    .run()
    .unwrap();

    // Exactly one prepare+restart cycle, then the stream continues with no
    // escalation and no sample loss.
    assert_eq!(stats.lock().unwrap().prepares, 1);
    assert_eq!(stats.lock().unwrap().resumes, 0);
    assert_eq!(*sink.lock().unwrap(), samples);
}

#[test]
fn test_underrun_on_playback_replays_pending_frames() {
    let samples: Vec<i16> = (0..512).collect();
    let cancel = CancelToken::new();

    let capture = MockCapture::new(samples.clone(), 1, 64).cancel_when_drained(cancel.clone());
    let mut playback = MockPlayback::new(1);
    playback.inject_error(TransferError::Underrun);
    let stats = playback.stats();
    let sink = playback.sink();

    PipelineLoop::new(
        Box::new(capture),
        Box::new(playback),
        &test_config(256, None),
        cancel,
    )
    .unwrap()
    .run()
    .unwrap();

    // The failed write advanced nothing, so after recovery the same frames
    // go out again - the sink still sees the exact sequence.
    assert_eq!(stats.lock().unwrap().prepares, 1);
    assert_eq!(*sink.lock().unwrap(), samples);
}

#[test]
fn test_suspend_recovery_resumes() {
    let samples: Vec<i16> = (0..512).collect();
    let cancel = CancelToken::new();

    let mut capture = MockCapture::new(samples.clone(), 1, 64).cancel_when_drained(cancel.clone());
    capture.inject_error(TransferError::Suspended);
    let stats = capture.stats();
    let playback = MockPlayback::new(1);
    let sink = playback.sink();

    PipelineLoop::new(
        Box::new(capture),
        Box::new(playback),
        &test_config(256, None),
        cancel,
    )
    .unwrap()
    .run()
    .unwrap();

    assert_eq!(stats.lock().unwrap().resumes, 1);
    assert_eq!(*sink.lock().unwrap(), samples);
}

#[test]
fn test_non_retryable_error_is_fatal() {
    let samples: Vec<i16> = (0..512).collect();
    let cancel = CancelToken::new();

    let mut capture = MockCapture::new(samples, 1, 64).cancel_when_drained(cancel.clone());
    capture.inject_error(TransferError::Other("device unplugged".to_string()));
    let playback = MockPlayback::new(1);

    let mut pipeline = PipelineLoop::new(
        Box::new(capture),
        Box::new(playback),
        &test_config(256, None),
        cancel,
    )
    .unwrap();

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, MonitorError::Fatal { .. }));
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[test]
fn test_filtered_pipeline_plays_whole_blocks() {
    // A full-range pass band leaves the signal intact up to transform
    // rounding, so the block machinery itself is what is under test.
    let samples: Vec<i16> = (0..1000).map(|i| (i % 201) - 100).collect();
    let cancel = CancelToken::new();
    let block_len = 256;

    let capture = MockCapture::new(samples.clone(), 1, 128).cancel_when_drained(cancel.clone());
    let playback = MockPlayback::new(1);
    let sink = playback.sink();

    let band = PassBand::new(0.0, 22_050.0, 44_100).unwrap();
    PipelineLoop::new(
        Box::new(capture),
        Box::new(playback),
        &test_config(block_len, Some(vec![band])),
        cancel,
    )
    .unwrap()
    .run()
    .unwrap();

    // Filtering only releases whole blocks; the partial tail stays
    // unplayed at shutdown.
    let played = sink.lock().unwrap();
    assert_eq!(played.len(), (samples.len() / block_len) * block_len);
    for (got, want) in played.iter().zip(samples.iter()) {
        assert!((got - want).abs() <= 1, "got {got}, want {want}");
    }
}

#[test]
fn test_filtered_partial_writes_transform_each_block_once() {
    // A playback device accepting less than a block per write must not
    // cause the unplayed remainder to be re-filtered at shifted block
    // boundaries; with a full-range band every played sample then stays
    // within single-transform rounding of the input.
    let samples: Vec<i16> = (0..800).map(|i| (i % 201) - 100).collect();
    let cancel = CancelToken::new();
    let block_len = 256;

    let capture = MockCapture::new(samples.clone(), 1, 128).cancel_when_drained(cancel.clone());
    let playback = MockPlayback::new(1).with_write_limit(100);
    let sink = playback.sink();

    let band = PassBand::new(0.0, 22_050.0, 44_100).unwrap();
    PipelineLoop::new(
        Box::new(capture),
        Box::new(playback),
        &test_config(block_len, Some(vec![band])),
        cancel,
    )
    .unwrap()
    .run()
    .unwrap();

    let played = sink.lock().unwrap();
    assert_eq!(played.len(), (samples.len() / block_len) * block_len);
    for (got, want) in played.iter().zip(samples.iter()) {
        assert!((got - want).abs() <= 1, "got {got}, want {want}");
    }
}

#[test]
fn test_visualizer_sees_normalized_magnitudes_and_can_stop() {
    // Endless-enough input: the stop must come from the visualizer.
    let samples: Vec<i16> = (0..8192).map(|i| ((i % 100) - 50) * 100).collect();
    let cancel = CancelToken::new();

    let capture = MockCapture::new(samples.clone(), 1, 512).cancel_when_drained(cancel.clone());
    let playback = MockPlayback::new(1);
    let playback_stats = playback.stats();
    let sink = playback.sink();

    let sums = Arc::new(Mutex::new(Vec::new()));
    let viz = RecordingVisualizer {
        sums: Arc::clone(&sums),
        stop_after: 2,
    };

    let mut pipeline = PipelineLoop::new(
        Box::new(capture),
        Box::new(playback),
        &test_config(256, None),
        cancel,
    )
    .unwrap()
    .with_visualizer(Box::new(viz));

    pipeline.run().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Stopped);

    let sums = sums.lock().unwrap();
    assert_eq!(sums.len(), 2);
    for sum in sums.iter() {
        assert!((sum - 1.0).abs() < 1e-9, "magnitude sum was {sum}");
    }

    // Visualization never rewrites the audio: the monitored stream is
    // bit-exact, two full blocks of it played before the stop landed.
    let played = sink.lock().unwrap();
    assert_eq!(played.len(), 512);
    assert_eq!(played.as_slice(), &samples[..512]);

    // Cancellation went through the draining path.
    assert_eq!(playback_stats.lock().unwrap().drains, 1);
}

#[test]
fn test_partial_playback_acceptance_preserves_order() {
    let samples: Vec<i16> = (0..600).collect();
    let cancel = CancelToken::new();

    let capture = MockCapture::new(samples.clone(), 1, 100).cancel_when_drained(cancel.clone());
    let playback = MockPlayback::new(1).with_write_limit(33);
    let sink = playback.sink();

    PipelineLoop::new(
        Box::new(capture),
        Box::new(playback),
        &test_config(256, None),
        cancel,
    )
    .unwrap()
    .run()
    .unwrap();

    assert_eq!(*sink.lock().unwrap(), samples);
}

#[test]
fn test_mismatched_device_formats_rejected() {
    let cancel = CancelToken::new();
    let capture = MockCapture::new(vec![0; 16], 1, 8);
    let playback = MockPlayback::new(2);

    let result = PipelineLoop::new(
        Box::new(capture),
        Box::new(playback),
        &test_config(256, None),
        cancel,
    );
    assert!(matches!(result, Err(MonitorError::InvalidConfig { .. })));
}

#[test]
fn test_block_larger_than_ring_rejected() {
    let cancel = CancelToken::new();
    let capture = MockCapture::new(vec![0; 16], 1, 8);
    let playback = MockPlayback::new(1);

    let config = MonitorConfig {
        retention: Duration::from_millis(1),
        block_len: 8192,
        filter: None,
        wait_timeout: Duration::from_millis(1),
    };
    let result = PipelineLoop::new(Box::new(capture), Box::new(playback), &config, cancel);
    assert!(matches!(result, Err(MonitorError::InvalidConfig { .. })));
}
