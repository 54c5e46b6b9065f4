// Background execution for the processing pipeline
//
// The upload subsystem fires one dispatch per completed upload; the
// queue moves the meeting into PROCESSING, spawns the detached pipeline
// task, and returns immediately. The embedder is responsible for
// calling shutdown() before exiting so in-flight pipelines reach a
// terminal state.

use dashmap::DashMap;
use log::info;
use std::fmt;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

use crate::database::DatabaseManager;
use crate::insight::provider::InsightProvider;

use super::{runner, PipelineConfig};

/// Error types for pipeline dispatch
#[derive(Debug, Clone)]
pub enum DispatchError {
    /// A pipeline for this meeting is already in flight
    AlreadyRunning(String),
    /// The meeting could not be moved into PROCESSING
    Persistence(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::AlreadyRunning(id) => {
                write!(f, "Meeting {} is already being processed", id)
            }
            DispatchError::Persistence(msg) => write!(f, "Could not start processing: {}", msg),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Runs insight pipelines as detached background tasks.
///
/// One pipeline instance per meeting; the in-flight registry makes the
/// at-most-once trigger explicit instead of assumed. There is no
/// cancellation: once dispatched, a pipeline always reaches COMPLETED
/// or FAILED.
pub struct PipelineQueue {
    db: Arc<DatabaseManager>,
    provider: Arc<dyn InsightProvider>,
    http: reqwest::Client,
    config: PipelineConfig,
    in_flight: Arc<DashMap<String, ()>>,
    tracker: TaskTracker,
}

impl PipelineQueue {
    pub fn new(
        db: Arc<DatabaseManager>,
        provider: Arc<dyn InsightProvider>,
        config: PipelineConfig,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            db,
            provider,
            http,
            config,
            in_flight: Arc::new(DashMap::new()),
            tracker: TaskTracker::new(),
        }
    }

    /// Handle an upload-completion event: record the audio URL, move the
    /// meeting into PROCESSING, and start its pipeline in the background.
    ///
    /// Returns as soon as the task is spawned; callers must not assume
    /// processing has finished. A meeting whose pipeline is still in
    /// flight is rejected rather than processed twice.
    pub fn dispatch(&self, meeting_id: &str, audio_url: &str) -> Result<(), DispatchError> {
        use dashmap::mapref::entry::Entry;

        match self.in_flight.entry(meeting_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(DispatchError::AlreadyRunning(meeting_id.to_string()));
            }
            Entry::Vacant(entry) => {
                entry.insert(());
            }
        }

        if let Err(e) = self.db.mark_meeting_processing(meeting_id, audio_url) {
            self.in_flight.remove(meeting_id);
            return Err(DispatchError::Persistence(e.to_string()));
        }

        info!("Dispatching insight pipeline for meeting {}", meeting_id);

        let db = self.db.clone();
        let provider = self.provider.clone();
        let http = self.http.clone();
        let config = self.config.clone();
        let in_flight = self.in_flight.clone();
        let meeting_id = meeting_id.to_string();
        let audio_url = audio_url.to_string();

        self.tracker.spawn(async move {
            runner::process_meeting_audio(db, provider, http, config, meeting_id.clone(), audio_url)
                .await;
            in_flight.remove(&meeting_id);
        });

        Ok(())
    }

    /// Whether a meeting's pipeline is currently in flight
    pub fn is_processing(&self, meeting_id: &str) -> bool {
        self.in_flight.contains_key(meeting_id)
    }

    /// Close the queue and wait for every in-flight pipeline to settle.
    /// The embedder must call this before tearing down the runtime, or
    /// detached tasks may be dropped mid-stage.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Meeting, MeetingStatus};
    use crate::insight::provider::test_support::FakeProvider;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    const INSIGHTS_JSON: &str = r#"{
        "summary": "Budget review",
        "transcript": [{"speaker": "Alice", "timestamp": "00:05", "text": "Let's start"}],
        "actionItems": [{"task": "Send report", "assignee": "Bob", "dueDate": "2025-01-15"}]
    }"#;

    fn create_meeting(db: &DatabaseManager) -> Meeting {
        let meeting = Meeting::new(
            "Budget review".to_string(),
            None,
            chrono::Utc::now(),
            "org_1".to_string(),
            "user_1".to_string(),
        );
        db.create_meeting(&meeting).unwrap();
        meeting
    }

    async fn audio_server() -> (mockito::ServerGuard, String) {
        let mut server = mockito::Server::new_async().await;
        let _audio = server
            .mock("GET", "/audio.mp3")
            .with_status(200)
            .with_body("pretend audio")
            .expect_at_least(1)
            .create_async()
            .await;
        let url = format!("{}/audio.mp3", server.url());
        (server, url)
    }

    #[tokio::test]
    async fn test_duplicate_dispatch_is_rejected() {
        let dir = tempdir().unwrap();
        let db = Arc::new(DatabaseManager::new(dir.path().join("test.db")).unwrap());
        let meeting = create_meeting(&db);

        let (_server, audio_url) = audio_server().await;
        let provider = Arc::new(FakeProvider::returning(INSIGHTS_JSON));
        let queue = PipelineQueue::new(
            db.clone(),
            provider.clone(),
            PipelineConfig {
                fetch_timeout_secs: 5,
                scratch_dir: dir.path().join("scratch"),
            },
        );

        queue.dispatch(&meeting.id, &audio_url).unwrap();
        assert!(queue.is_processing(&meeting.id));

        // Second trigger for the same meeting while in flight
        let err = queue.dispatch(&meeting.id, &audio_url).unwrap_err();
        assert!(matches!(err, DispatchError::AlreadyRunning(_)));

        queue.shutdown().await;
        assert!(!queue.is_processing(&meeting.id));

        // Exactly one pipeline ran: no double-inserted action items
        let retrieved = db.get_meeting(&meeting.id).unwrap().unwrap();
        assert_eq!(retrieved.status, MeetingStatus::Completed);
        assert_eq!(db.list_action_items(&meeting.id).unwrap().len(), 1);
        assert_eq!(provider.generates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_meeting_fails_fast() {
        let dir = tempdir().unwrap();
        let db = Arc::new(DatabaseManager::new(dir.path().join("test.db")).unwrap());

        let provider = Arc::new(FakeProvider::returning(INSIGHTS_JSON));
        let queue = PipelineQueue::new(db, provider, PipelineConfig::default());

        let err = queue.dispatch("missing", "https://storage.test/audio.mp3").unwrap_err();
        assert!(matches!(err, DispatchError::Persistence(_)));
        assert!(!queue.is_processing("missing"));

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_redispatch_after_terminal_state_is_allowed() {
        let dir = tempdir().unwrap();
        let db = Arc::new(DatabaseManager::new(dir.path().join("test.db")).unwrap());
        let meeting = create_meeting(&db);

        // First run fails on a malformed response
        let (_server, audio_url) = audio_server().await;
        let failing = Arc::new(FakeProvider::returning("not json"));
        let queue = PipelineQueue::new(
            db.clone(),
            failing,
            PipelineConfig {
                fetch_timeout_secs: 5,
                scratch_dir: dir.path().join("scratch"),
            },
        );
        queue.dispatch(&meeting.id, &audio_url).unwrap();
        queue.shutdown().await;

        let retrieved = db.get_meeting(&meeting.id).unwrap().unwrap();
        assert_eq!(retrieved.status, MeetingStatus::Failed);

        // A fresh upload re-enters processing on a new queue
        let succeeding = Arc::new(FakeProvider::returning(INSIGHTS_JSON));
        let queue = PipelineQueue::new(
            db.clone(),
            succeeding,
            PipelineConfig {
                fetch_timeout_secs: 5,
                scratch_dir: dir.path().join("scratch"),
            },
        );
        queue.dispatch(&meeting.id, &audio_url).unwrap();
        queue.shutdown().await;

        let retrieved = db.get_meeting(&meeting.id).unwrap().unwrap();
        assert_eq!(retrieved.status, MeetingStatus::Completed);
    }

    #[tokio::test]
    async fn test_concurrent_meetings_process_independently() {
        let dir = tempdir().unwrap();
        let db = Arc::new(DatabaseManager::new(dir.path().join("test.db")).unwrap());
        let first = create_meeting(&db);
        let second = create_meeting(&db);

        let (_server, audio_url) = audio_server().await;
        let provider = Arc::new(FakeProvider::returning(INSIGHTS_JSON));
        let queue = PipelineQueue::new(
            db.clone(),
            provider,
            PipelineConfig {
                fetch_timeout_secs: 5,
                scratch_dir: dir.path().join("scratch"),
            },
        );

        queue.dispatch(&first.id, &audio_url).unwrap();
        queue.dispatch(&second.id, &audio_url).unwrap();
        queue.shutdown().await;

        for id in [&first.id, &second.id] {
            let retrieved = db.get_meeting(id).unwrap().unwrap();
            assert_eq!(retrieved.status, MeetingStatus::Completed);
            assert_eq!(db.list_action_items(id).unwrap().len(), 1);
        }
    }
}
