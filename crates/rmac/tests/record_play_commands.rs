//! End-to-end tests of the `record` and `play` commands with mock adapters.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rmac::application::{self, PlayCommand, RecordCommand};
use rmac::domain::AppConfig;
use rmac::infrastructure::TracingStatusSink;
use rmac_core::trace::{read_trace, Event, TraceError};
use rmac_core::CancelToken;
use rmac_player::infrastructure::injection::mock::RecordingInjector;
use rmac_player::PlayError;
use rmac_recorder::infrastructure::input_capture::mock::MockInputSource;
use rmac_recorder::RawInputEvent;
use uuid::Uuid;

fn temp_path() -> PathBuf {
    std::env::temp_dir().join(format!("rmac_cmd_{}.rmac", Uuid::new_v4()))
}

#[tokio::test]
async fn test_record_then_play_reproduces_key_presses() {
    // Arrange – record with F12 as the stop key
    let path = temp_path();
    let config = AppConfig::default();
    let record_cmd = RecordCommand {
        path: path.clone(),
        stop_key: Some(0x7B),
    };
    let source = MockInputSource::new();
    let feeder_source = source.clone();
    let feeder = std::thread::spawn(move || {
        let events = [
            RawInputEvent::Key { vk: 0x1B, down: true, injected: false, at_micros: 100 },
            RawInputEvent::Key { vk: 0x1B, down: false, injected: false, at_micros: 900 },
            RawInputEvent::Key { vk: 0x7B, down: true, injected: false, at_micros: 1_500 },
        ];
        for event in events {
            while !feeder_source.inject_event(event.clone()) {
                std::thread::sleep(Duration::from_millis(2));
            }
        }
    });

    // Act – record
    let recorded = application::record(
        &source,
        application::record_options(&config.record, &record_cmd),
        CancelToken::new(),
        Arc::new(TracingStatusSink),
    )
    .await
    .expect("record");
    feeder.join().unwrap();

    // Assert – Escape is an ordinary key when it is not the stop key
    assert_eq!(recorded.stats.events_written, 2);
    assert_eq!(
        read_trace(&path).unwrap().events,
        vec![Event::key(100, 0x1B, true), Event::key(900, 0x1B, false)]
    );

    // Act – play
    let injector = Arc::new(RecordingInjector::new());
    let play_cmd = PlayCommand {
        path: path.clone(),
        countdown_secs: Some(0),
    };
    let mut options = application::play_options(&config.playback, &play_cmd, None);
    options.raise_timer_resolution = false;
    let played = application::play(
        injector.clone(),
        None,
        options,
        CancelToken::new(),
        Arc::new(TracingStatusSink),
    )
    .await
    .expect("play");

    // Assert
    assert_eq!(played.report.dispatched, 2);
    assert_eq!(injector.keys(), vec![(0x1B, true), (0x1B, false)]);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_play_rejects_a_file_that_is_not_a_trace() {
    // Arrange
    let path = temp_path();
    std::fs::write(&path, b"definitely not a trace file").unwrap();
    let injector = Arc::new(RecordingInjector::new());
    let command = PlayCommand {
        path: path.clone(),
        countdown_secs: Some(0),
    };
    let options = application::play_options(&AppConfig::default().playback, &command, None);

    // Act
    let result = application::play(
        injector.clone(),
        None,
        options,
        CancelToken::new(),
        Arc::new(TracingStatusSink),
    )
    .await;

    // Assert
    assert!(matches!(result, Err(PlayError::Trace(TraceError::Format(_)))));
    assert!(injector.recorded().is_empty());
    let _ = std::fs::remove_file(&path);
}
