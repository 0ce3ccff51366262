//! Scanner task lifecycle: spawn on an interval, stop and join on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{Detection, FrameSource, ScanPolicy, ScannerConfig, TemplateMatcher};
use crate::session::SessionState;

/// Shortest accepted scan interval.  `tokio::time::interval` panics on zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Read side of one running scanner.
#[derive(Debug, Clone)]
pub struct ScannerHandle {
    pub name: String,
    /// Latest detection; `None` until the first scan completes.
    pub detections: watch::Receiver<Option<Detection>>,
}

/// Owns every scanner task of a session.
///
/// Dropping the set without calling [`ScannerSet::shutdown`] still stops the
/// tasks (their shutdown channel closes), but nothing waits for them.
pub struct ScannerSet {
    state: Arc<SessionState>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl ScannerSet {
    pub fn new(state: Arc<SessionState>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            state,
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    /// Starts one scanner task.  Must be called inside a tokio runtime.
    pub fn spawn<P: ScanPolicy>(
        &mut self,
        config: ScannerConfig,
        frames: Arc<dyn FrameSource>,
        matcher: Arc<dyn TemplateMatcher>,
        policy: P,
    ) -> ScannerHandle {
        let (tx, rx) = watch::channel(None);
        let name = config.name.clone();
        let task = tokio::spawn(run_scanner(
            config,
            Arc::clone(&self.state),
            frames,
            matcher,
            policy,
            tx,
            self.shutdown_tx.subscribe(),
        ));
        self.tasks.push((name.clone(), task));
        ScannerHandle {
            name,
            detections: rx,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Signals every scanner to stop and waits for all of them.
    ///
    /// Returns the number of tasks joined.  A panicked scanner is logged and
    /// still counted.
    pub async fn shutdown(self) -> usize {
        self.shutdown_tx.send_replace(true);
        let mut joined = 0;
        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                warn!(scanner = %name, "scanner task ended abnormally: {e}");
            }
            joined += 1;
        }
        debug!(joined, "scanners stopped");
        joined
    }
}

async fn run_scanner<P: ScanPolicy>(
    config: ScannerConfig,
    state: Arc<SessionState>,
    frames: Arc<dyn FrameSource>,
    matcher: Arc<dyn TemplateMatcher>,
    mut policy: P,
    tx: watch::Sender<Option<Detection>>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(scanner = %config.name, interval_ms = config.interval.as_millis() as u64, "scanner started");

    let mut ticker = interval(config.interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut scan = 0u64;
    let mut active = false;

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                // A closed channel means the owning set was dropped.
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        if !config.active_when.holds(&state) {
            if active {
                policy.on_inactive(&state);
                active = false;
            }
            continue;
        }
        active = true;

        let Some(frame) = frames.capture() else {
            debug!(scanner = %config.name, "no frame available; skipping scan");
            continue;
        };
        let result = matcher.detect_best_match(&frame, &config.template, config.threshold);
        scan += 1;

        let detection = Detection {
            scanner: config.name.clone(),
            scan,
            result,
            frame_size: (frame.width, frame.height),
        };
        debug!(
            scanner = %config.name,
            scan,
            found = result.found,
            confidence = result.confidence,
            "scan complete"
        );
        policy.on_detection(&state, &detection);
        tx.send_replace(Some(detection));
    }

    policy.on_stop(&state);
    info!(scanner = %config.name, scans = scan, "scanner stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{Activation, Frame, MatchResult, Template};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StaticFrames {
        captures: AtomicUsize,
    }

    impl FrameSource for StaticFrames {
        fn capture(&self) -> Option<Frame> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            Some(Frame {
                width: 100,
                height: 50,
                pixels: vec![0; 5_000],
            })
        }
    }

    struct AlwaysFound;

    impl TemplateMatcher for AlwaysFound {
        fn detect_best_match(&self, _f: &Frame, _t: &Template, _threshold: f32) -> MatchResult {
            MatchResult {
                found: true,
                center: (10, 20),
                confidence: 0.9,
            }
        }
    }

    #[derive(Default, Clone)]
    struct RecordingPolicy {
        seen: Arc<Mutex<Vec<u64>>>,
        stopped: Arc<AtomicBool>,
    }

    impl ScanPolicy for RecordingPolicy {
        fn on_detection(&mut self, _state: &SessionState, detection: &Detection) {
            self.seen.lock().unwrap().push(detection.scan);
        }

        fn on_stop(&mut self, _state: &SessionState) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    fn config(active_when: Activation) -> ScannerConfig {
        ScannerConfig {
            name: "test".to_string(),
            interval: Duration::from_millis(5),
            threshold: 0.8,
            template: Arc::new(Template {
                name: "marker".to_string(),
                width: 1,
                height: 1,
                pixels: vec![255],
            }),
            active_when,
        }
    }

    #[tokio::test]
    async fn test_scanner_publishes_numbered_detections() {
        // Arrange
        let (state, _ctl) = SessionState::new();
        let mut set = ScannerSet::new(Arc::clone(&state));
        let policy = RecordingPolicy::default();
        let frames = Arc::new(StaticFrames { captures: AtomicUsize::new(0) });

        // Act
        let mut handle = set.spawn(config(Activation::Always), frames, Arc::new(AlwaysFound), policy.clone());
        handle.detections.changed().await.unwrap();
        let first = handle.detections.borrow().clone().unwrap();
        set.shutdown().await;

        // Assert
        assert_eq!(first.scanner, "test");
        assert!(first.scan >= 1);
        assert_eq!(first.frame_size, (100, 50));
        assert!(first.result.found);
        let seen = policy.seen.lock().unwrap().clone();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[tokio::test]
    async fn test_shutdown_joins_every_task_and_notifies_policies() {
        // Arrange
        let (state, _ctl) = SessionState::new();
        let mut set = ScannerSet::new(Arc::clone(&state));
        let policies = [RecordingPolicy::default(), RecordingPolicy::default()];
        for p in &policies {
            let frames = Arc::new(StaticFrames { captures: AtomicUsize::new(0) });
            set.spawn(config(Activation::Always), frames, Arc::new(AlwaysFound), p.clone());
        }

        // Act
        let joined = set.shutdown().await;

        // Assert
        assert_eq!(joined, 2);
        for p in &policies {
            assert!(p.stopped.load(Ordering::SeqCst));
        }
    }

    #[tokio::test]
    async fn test_inactive_scanner_never_captures() {
        // Arrange – WhilePlaying, but nothing is playing
        let (state, _ctl) = SessionState::new();
        let mut set = ScannerSet::new(Arc::clone(&state));
        let frames = Arc::new(StaticFrames { captures: AtomicUsize::new(0) });

        // Act
        set.spawn(
            config(Activation::WhilePlaying),
            Arc::clone(&frames) as Arc<dyn FrameSource>,
            Arc::new(AlwaysFound),
            RecordingPolicy::default(),
        );
        tokio::time::sleep(Duration::from_millis(40)).await;
        set.shutdown().await;

        // Assert
        assert_eq!(frames.captures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_set_shuts_down_immediately() {
        let (state, _ctl) = SessionState::new();
        let set = ScannerSet::new(state);
        assert!(set.is_empty());
        assert_eq!(set.shutdown().await, 0);
    }
}
