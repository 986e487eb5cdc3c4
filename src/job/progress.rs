use std::sync::Arc;

use serde::Serialize;

use crate::foundation::error::{ErrorCategory, WaveError};

/// Lifecycle of one job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Validating,
    RenderingVideo,
    EncodingAudio,
    Finalizing,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Snapshot pushed to observers after each meaningful step.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct JobStatus {
    pub state: JobState,
    /// Overall progress in `0..=100`, never decreasing within a job.
    pub percent: f64,
    pub message: String,
    /// Set on `Failed`.
    pub error: Option<ErrorCategory>,
}

/// Receives job status updates. Implementations must not block.
pub trait StatusObserver: Send + Sync {
    fn publish(&self, status: &JobStatus);
}

impl StatusObserver for tokio::sync::watch::Sender<JobStatus> {
    fn publish(&self, status: &JobStatus) {
        self.send_replace(status.clone());
    }
}

impl StatusObserver for tokio::sync::mpsc::UnboundedSender<JobStatus> {
    fn publish(&self, status: &JobStatus) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.send(status.clone());
    }
}

/// Progress bands per phase, as `(start, end)` percentages.
const SETUP: (f64, f64) = (0.0, 5.0);
const VIDEO: (f64, f64) = (5.0, 75.0);
const AUDIO: (f64, f64) = (75.0, 90.0);
const FINALIZE: (f64, f64) = (90.0, 95.0);

fn lerp(band: (f64, f64), done: u64, total: u64) -> f64 {
    if total == 0 {
        return band.1;
    }
    let t = (done as f64 / total as f64).clamp(0.0, 1.0);
    band.0 + (band.1 - band.0) * t
}

/// Folds per-phase progress into one monotonic percentage and forwards it.
pub struct ProgressReporter {
    status: JobStatus,
    observer: Option<Arc<dyn StatusObserver>>,
}

impl ProgressReporter {
    pub fn new(observer: Option<Arc<dyn StatusObserver>>) -> Self {
        Self {
            status: JobStatus::default(),
            observer,
        }
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    fn update(&mut self, state: JobState, percent: f64, message: String) {
        self.status.state = state;
        self.status.percent = self.status.percent.max(percent).min(100.0);
        self.status.message = message;
        if let Some(obs) = &self.observer {
            obs.publish(&self.status);
        }
    }

    pub fn validating(&mut self) {
        self.update(JobState::Validating, SETUP.0, "validating input".to_owned());
    }

    pub fn setup_done(&mut self) {
        self.update(JobState::Validating, SETUP.1, "encoders ready".to_owned());
    }

    /// `done` frames of `total` have been submitted.
    pub fn video_frame(&mut self, done: u64, total: u64) {
        self.update(
            JobState::RenderingVideo,
            lerp(VIDEO, done, total),
            format!("rendering frame {done}/{total}"),
        );
    }

    /// `done` chunks of `total` have been submitted.
    pub fn audio_chunk(&mut self, done: u64, total: u64) {
        self.update(
            JobState::EncodingAudio,
            lerp(AUDIO, done, total),
            format!("encoding audio chunk {done}/{total}"),
        );
    }

    pub fn finalizing(&mut self) {
        self.update(JobState::Finalizing, FINALIZE.0, "finalizing container".to_owned());
    }

    pub fn finalized(&mut self) {
        self.update(JobState::Finalizing, FINALIZE.1, "container finalized".to_owned());
    }

    pub fn done(&mut self, bytes: usize) {
        self.update(JobState::Done, 100.0, format!("done ({bytes} bytes)"));
    }

    /// Terminal failure; percent stays where it was.
    pub fn failed(&mut self, err: &WaveError) {
        self.status.error = Some(err.category());
        let percent = self.status.percent;
        self.update(JobState::Failed, percent, err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<JobStatus>>>);

    impl StatusObserver for Recorder {
        fn publish(&self, status: &JobStatus) {
            if let Ok(mut v) = self.0.lock() {
                v.push(status.clone());
            }
        }
    }

    #[test]
    fn phases_map_onto_bands() {
        let rec = Recorder::default();
        let mut p = ProgressReporter::new(Some(Arc::new(rec.clone())));
        p.validating();
        p.setup_done();
        p.video_frame(15, 30);
        assert_eq!(p.status().percent, 40.0);
        p.video_frame(30, 30);
        assert_eq!(p.status().percent, 75.0);
        p.audio_chunk(50, 50);
        assert_eq!(p.status().percent, 90.0);
        p.finalizing();
        p.finalized();
        p.done(10);
        assert_eq!(p.status().state, JobState::Done);
        assert_eq!(p.status().percent, 100.0);

        let seen = rec.0.lock().unwrap();
        assert_eq!(seen.len(), 8);
        assert!(seen.windows(2).all(|w| w[0].percent <= w[1].percent));
    }

    #[test]
    fn percent_never_goes_backwards() {
        let mut p = ProgressReporter::new(None);
        p.video_frame(20, 30);
        let high = p.status().percent;
        p.video_frame(3, 30);
        assert_eq!(p.status().percent, high);
    }

    #[test]
    fn failure_keeps_percent_and_records_category() {
        let mut p = ProgressReporter::new(None);
        p.video_frame(12, 30);
        let at = p.status().percent;
        p.failed(&WaveError::encode("boom"));
        assert_eq!(p.status().state, JobState::Failed);
        assert_eq!(p.status().percent, at);
        assert_eq!(p.status().error, Some(ErrorCategory::Encode));
        assert_eq!(p.status().message, "encode error: boom");
    }

    #[tokio::test]
    async fn watch_sender_is_an_observer() {
        let (tx, rx) = tokio::sync::watch::channel(JobStatus::default());
        let mut p = ProgressReporter::new(Some(Arc::new(tx)));
        p.validating();
        assert_eq!(rx.borrow().state, JobState::Validating);
    }
}
