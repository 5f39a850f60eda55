//! Task completion detection.
//!
//! A task is running while the page shows its stop indicator. The detector
//! fires once when that indicator appears and then disappears.

use crate::config::{ConfigStore, WatchConfig};
use crate::pipeline::{NotificationStatus, Pipeline, Trigger};
use crate::scraper::{PageExtractor, PageSource, ScraperError};
use scraper::Html;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Per-instance detection state with a re-entrancy guard.
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    task_in_progress: bool,
    stop_seen: bool,
    processing: bool,
    /// Observations before this instant are ignored
    armed_at: Option<Instant>,
    cooldown: Duration,
}

impl CompletionDetector {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            task_in_progress: false,
            stop_seen: false,
            processing: false,
            armed_at: None,
            cooldown,
        }
    }

    /// Whether observations are currently being considered
    pub fn is_armed(&self, now: Instant) -> bool {
        !self.processing && self.armed_at.map_or(true, |at| now >= at)
    }

    pub fn task_in_progress(&self) -> bool {
        self.task_in_progress
    }

    /// Feed one observation of the page. Returns true when a task has just completed.
    pub fn observe(&mut self, stop_present: bool, now: Instant) -> bool {
        if !self.is_armed(now) {
            return false;
        }

        if stop_present && !self.task_in_progress {
            info!("task started, stop indicator detected");
            self.task_in_progress = true;
            self.stop_seen = true;
        } else if !stop_present && self.task_in_progress {
            self.task_in_progress = false;
            if std::mem::take(&mut self.stop_seen) {
                info!("task completed, stop indicator removed");
                return true;
            }
        }
        false
    }

    /// Claim the run slot. Returns false if a run is already in flight.
    pub fn begin_run(&mut self) -> bool {
        if self.processing {
            return false;
        }
        self.processing = true;
        true
    }

    /// Release the run slot; the detector re-arms after the cooldown.
    pub fn finish_run(&mut self, now: Instant) {
        self.processing = false;
        self.armed_at = Some(now + self.cooldown);
    }
}

/// Polls a page source and runs the pipeline for every completed task.
pub struct Watcher {
    source: Box<dyn PageSource>,
    extractor: PageExtractor,
    pipeline: Pipeline,
    settings: ConfigStore,
    timing: WatchConfig,
    detector: CompletionDetector,
    status_tx: mpsc::UnboundedSender<NotificationStatus>,
}

impl Watcher {
    /// Create a watcher and the receiving end of its status channel
    pub fn new(
        source: Box<dyn PageSource>,
        extractor: PageExtractor,
        pipeline: Pipeline,
        settings: ConfigStore,
        timing: WatchConfig,
    ) -> (Self, mpsc::UnboundedReceiver<NotificationStatus>) {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let detector = CompletionDetector::new(timing.cooldown());
        let watcher = Self {
            source,
            extractor,
            pipeline,
            settings,
            timing,
            detector,
            status_tx,
        };
        (watcher, status_rx)
    }

    /// Poll forever. Fetch failures are logged and the next poll proceeds.
    pub async fn run(&mut self) {
        info!(source = %self.source.describe(), "starting observer");
        let mut interval = tokio::time::interval(self.timing.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(e) = self.poll_once().await {
                warn!(error = %e, "failed to poll page");
            }
        }
    }

    /// Fetch the page once and run the pipeline if a task just completed
    pub async fn poll_once(&mut self) -> Result<Option<NotificationStatus>, ScraperError> {
        let html = self.source.fetch().await?;
        let stop_present = {
            let document = Html::parse_document(&html);
            self.extractor.stop_indicator_present(&document)
        };

        if !self.detector.observe(stop_present, Instant::now()) || !self.detector.begin_run() {
            return Ok(None);
        }

        let status = self.process_completion(html).await;
        self.detector.finish_run(Instant::now());

        if self.status_tx.send(status.clone()).is_err() {
            debug!("status receiver dropped");
        }
        Ok(Some(status))
    }

    async fn process_completion(&self, detected_html: String) -> NotificationStatus {
        // Let the page settle before extracting
        tokio::time::sleep(self.timing.settle_delay()).await;

        let settings = self.settings.read();
        let html = match self.source.fetch().await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "refetch failed, extracting from detection snapshot");
                detected_html
            }
        };

        let (snapshot, discuss_mode_off) = {
            let document = Html::parse_document(&html);
            let discuss_mode_off = self.extractor.discuss_mode_active(&document) == Some(false);
            (self.extractor.extract(&document), discuss_mode_off)
        };

        if settings.auto_discuss_mode && discuss_mode_off {
            info!("enabling discuss mode");
            if let Err(e) = self.source.request_discuss_mode().await {
                warn!(error = %e, "failed to enable discuss mode");
            }
        }

        self.pipeline
            .handle(Trigger::TaskCompleted(snapshot), &settings)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(2);

    #[test]
    fn fires_once_per_appear_then_disappear() {
        let mut detector = CompletionDetector::new(COOLDOWN);
        let now = Instant::now();

        assert!(!detector.observe(false, now));
        assert!(!detector.observe(true, now));
        assert!(detector.task_in_progress());
        assert!(!detector.observe(true, now));
        assert!(detector.observe(false, now));
        assert!(!detector.observe(false, now));
    }

    #[test]
    fn indicator_present_at_start_counts_as_running_task() {
        let mut detector = CompletionDetector::new(COOLDOWN);
        let now = Instant::now();
        assert!(!detector.observe(true, now));
        assert!(detector.observe(false, now));
    }

    #[test]
    fn guard_blocks_concurrent_runs() {
        let mut detector = CompletionDetector::new(COOLDOWN);
        assert!(detector.begin_run());
        assert!(!detector.begin_run());

        let now = Instant::now();
        assert!(!detector.is_armed(now));
        assert!(!detector.observe(true, now));
        assert!(!detector.task_in_progress());
    }

    #[test]
    fn rearms_only_after_cooldown() {
        let mut detector = CompletionDetector::new(COOLDOWN);
        let start = Instant::now();

        assert!(detector.begin_run());
        detector.finish_run(start);

        assert!(!detector.observe(true, start + Duration::from_millis(500)));
        assert!(!detector.task_in_progress());

        let later = start + COOLDOWN;
        assert!(detector.is_armed(later));
        assert!(!detector.observe(true, later));
        assert!(detector.observe(false, later));
    }

    #[test]
    fn release_is_unconditional() {
        let mut detector = CompletionDetector::new(Duration::ZERO);
        assert!(detector.begin_run());
        detector.finish_run(Instant::now());
        assert!(detector.begin_run());
    }
}
