// Audio-to-insight pipeline runner
//
// One linear, single-attempt pass per uploaded recording:
// fetch -> probe -> scratch -> stage -> generate -> parse -> commit.
// Runs detached from any request path, so no error escapes; every
// failure resolves to a FAILED meeting plus a log line.

use log::{error, info, warn};
use std::sync::Arc;

use crate::database::models::ActionItem;
use crate::database::DatabaseManager;
use crate::insight::provider::{InsightProvider, StagedFile};
use crate::insight::response::{parse_insights, INSIGHT_PROMPT};

use super::fetch;
use super::scratch::ScratchFile;
use super::{PipelineConfig, PipelineError};

/// MIME type reported to the provider. The upload layer restricts
/// meeting audio before this pipeline ever runs.
const AUDIO_MIME_TYPE: &str = "audio/mp3";

/// Process one uploaded recording end to end
pub async fn process_meeting_audio(
    db: Arc<DatabaseManager>,
    provider: Arc<dyn InsightProvider>,
    http: reqwest::Client,
    config: PipelineConfig,
    meeting_id: String,
    audio_url: String,
) {
    info!("Starting insight processing for meeting {}", meeting_id);

    match run_stages(&db, provider.as_ref(), &http, &config, &meeting_id, &audio_url).await {
        Ok(()) => info!("Meeting {} processing complete", meeting_id),
        Err(e) => {
            error!("Meeting {} failed in {} stage: {}", meeting_id, e.stage(), e);

            // Best-effort fallback write; if even this fails there is
            // no recovery path left, so log and return.
            if let Err(db_err) = db.mark_meeting_failed(&meeting_id) {
                error!("Could not mark meeting {} as failed: {}", meeting_id, db_err);
            }
        }
    }
}

async fn run_stages(
    db: &DatabaseManager,
    provider: &dyn InsightProvider,
    http: &reqwest::Client,
    config: &PipelineConfig,
    meeting_id: &str,
    audio_url: &str,
) -> Result<(), PipelineError> {
    // 1. Download the recording
    let audio = fetch::fetch_audio(http, audio_url).await?;

    // 2. Duration from container metadata, best effort
    let duration_seconds = fetch::probe_duration_seconds(&audio);
    info!(
        "Meeting {} audio: {} bytes, {} seconds",
        meeting_id,
        audio.len(),
        duration_seconds
    );

    // 3. Scratch file keyed by meeting id, so concurrent pipelines never collide
    let scratch = ScratchFile::create(&config.scratch_dir, &format!("{}.mp3", meeting_id), &audio)
        .map_err(|e| PipelineError::Staging(format!("scratch write failed: {}", e)))?;

    // 4. Stage the file with the provider
    let staged = provider
        .upload_file(
            scratch.path(),
            AUDIO_MIME_TYPE,
            &format!("Meeting {}", meeting_id),
        )
        .await
        .map_err(|e| PipelineError::Staging(e.to_string()))?;

    info!("Meeting {} staged as {}", meeting_id, staged.uri);

    // 5-6. Extract and commit. The staged file is deleted on both
    // outcomes before the result is reported.
    let result = extract_and_commit(db, provider, &staged, meeting_id, duration_seconds).await;

    if let Err(e) = provider.delete_file(&staged).await {
        warn!(
            "Failed to delete staged file {} for meeting {}: {}",
            staged.name, meeting_id, e
        );
    }

    result
    // scratch dropped here; removal failure is a logged warning
}

async fn extract_and_commit(
    db: &DatabaseManager,
    provider: &dyn InsightProvider,
    staged: &StagedFile,
    meeting_id: &str,
    duration_seconds: u64,
) -> Result<(), PipelineError> {
    let raw = provider
        .generate(INSIGHT_PROMPT, staged)
        .await
        .map_err(|e| PipelineError::Generation(e.to_string()))?;

    // Single attempt: malformed output fails the meeting, no re-prompt
    let insights = parse_insights(&raw)
        .map_err(|e| PipelineError::Generation(format!("model returned malformed JSON: {}", e)))?;

    let action_items: Vec<ActionItem> = insights
        .action_items
        .iter()
        .map(|reported| reported.to_action_item(meeting_id))
        .collect();

    db.complete_meeting(
        meeting_id,
        &insights.summary,
        &insights.transcript,
        duration_seconds as i64,
        &action_items,
    )
    .map_err(|e| PipelineError::Persistence(e.to_string()))?;

    info!(
        "Meeting {} committed: {} transcript segments, {} action items",
        meeting_id,
        insights.transcript.len(),
        action_items.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Meeting, MeetingStatus};
    use crate::insight::provider::test_support::FakeProvider;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    const INSIGHTS_JSON: &str = r#"{
        "summary": "Budget review",
        "transcript": [{"speaker": "Alice", "timestamp": "00:05", "text": "Let's start"}],
        "actionItems": [{"task": "Send report", "assignee": "Bob", "dueDate": "2025-01-15"}]
    }"#;

    struct TestHarness {
        db: Arc<DatabaseManager>,
        scratch_dir: PathBuf,
        meeting_id: String,
        _dir: tempfile::TempDir,
    }

    fn setup() -> TestHarness {
        let dir = tempdir().unwrap();
        let db = Arc::new(DatabaseManager::new(dir.path().join("test.db")).unwrap());

        let meeting = Meeting::new(
            "Budget review".to_string(),
            None,
            chrono::Utc::now(),
            "org_1".to_string(),
            "user_1".to_string(),
        );
        db.create_meeting(&meeting).unwrap();

        TestHarness {
            db,
            scratch_dir: dir.path().join("scratch"),
            meeting_id: meeting.id,
            _dir: dir,
        }
    }

    fn scratch_path(harness: &TestHarness) -> PathBuf {
        harness.scratch_dir.join(format!("{}.mp3", harness.meeting_id))
    }

    async fn run(harness: &TestHarness, provider: Arc<FakeProvider>, audio_url: &str) {
        harness
            .db
            .mark_meeting_processing(&harness.meeting_id, audio_url)
            .unwrap();

        let config = PipelineConfig {
            fetch_timeout_secs: 5,
            scratch_dir: harness.scratch_dir.clone(),
        };

        process_meeting_audio(
            harness.db.clone(),
            provider,
            reqwest::Client::new(),
            config,
            harness.meeting_id.clone(),
            audio_url.to_string(),
        )
        .await;
    }

    async fn serve_audio(server: &mut mockito::ServerGuard) -> String {
        let _audio = server
            .mock("GET", "/audio.mp3")
            .with_status(200)
            .with_body("pretend audio")
            .create_async()
            .await;
        format!("{}/audio.mp3", server.url())
    }

    #[tokio::test]
    async fn test_successful_run_commits_everything() {
        let mut server = mockito::Server::new_async().await;
        let audio_url = serve_audio(&mut server).await;

        let harness = setup();
        // Fenced response exercises stripping on the real path
        let provider = Arc::new(FakeProvider::returning(&format!(
            "```json\n{}\n```",
            INSIGHTS_JSON
        )));

        run(&harness, provider.clone(), &audio_url).await;

        let meeting = harness.db.get_meeting(&harness.meeting_id).unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Completed);
        assert_eq!(meeting.summary.as_deref(), Some("Budget review"));
        let transcript = meeting.transcript.unwrap();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].speaker, "Alice");
        assert_eq!(transcript[0].timestamp, "00:05");

        let items = harness.db.list_action_items(&harness.meeting_id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].task, "Send report (Assigned to: Bob)");
        assert_eq!(
            items[0].due_date,
            Some(chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
        );
        assert!(!items[0].is_completed);
        assert!(items[0].assignee_id.is_none());

        // Both temporary resources are gone
        assert_eq!(provider.deletes.load(Ordering::SeqCst), 1);
        assert!(!scratch_path(&harness).exists());
    }

    #[tokio::test]
    async fn test_fetch_404_fails_meeting_before_staging() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/audio.mp3")
            .with_status(404)
            .create_async()
            .await;
        let audio_url = format!("{}/audio.mp3", server.url());

        let harness = setup();
        let provider = Arc::new(FakeProvider::returning(INSIGHTS_JSON));

        run(&harness, provider.clone(), &audio_url).await;

        let meeting = harness.db.get_meeting(&harness.meeting_id).unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Failed);
        assert!(meeting.summary.is_none());
        assert!(meeting.transcript.is_none());
        assert!(harness.db.list_action_items(&harness.meeting_id).unwrap().is_empty());

        // Nothing was ever staged and no scratch file survives
        assert_eq!(provider.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(provider.deletes.load(Ordering::SeqCst), 0);
        assert!(!scratch_path(&harness).exists());
    }

    #[tokio::test]
    async fn test_malformed_response_fails_closed() {
        let mut server = mockito::Server::new_async().await;
        let audio_url = serve_audio(&mut server).await;

        let harness = setup();
        let provider = Arc::new(FakeProvider::returning(
            "I'm sorry, I could not process this audio.",
        ));

        run(&harness, provider.clone(), &audio_url).await;

        let meeting = harness.db.get_meeting(&harness.meeting_id).unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Failed);
        assert!(meeting.summary.is_none());
        assert!(meeting.transcript.is_none());
        assert!(harness.db.list_action_items(&harness.meeting_id).unwrap().is_empty());

        // Staged file still cleaned up after the failed generation
        assert_eq!(provider.deletes.load(Ordering::SeqCst), 1);
        assert!(!scratch_path(&harness).exists());
    }

    #[tokio::test]
    async fn test_empty_action_items_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let audio_url = serve_audio(&mut server).await;

        let harness = setup();
        let provider = Arc::new(FakeProvider::returning(
            r#"{"summary": "Nothing to do", "transcript": [], "actionItems": []}"#,
        ));

        run(&harness, provider, &audio_url).await;

        let meeting = harness.db.get_meeting(&harness.meeting_id).unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Completed);
        assert_eq!(meeting.summary.as_deref(), Some("Nothing to do"));
        assert!(harness.db.list_action_items(&harness.meeting_id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_staging_failure_fails_meeting_and_cleans_scratch() {
        let mut server = mockito::Server::new_async().await;
        let audio_url = serve_audio(&mut server).await;

        let harness = setup();
        let provider = Arc::new(FakeProvider::failing_upload());

        run(&harness, provider.clone(), &audio_url).await;

        let meeting = harness.db.get_meeting(&harness.meeting_id).unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Failed);

        // Nothing staged, so nothing to delete provider-side; the
        // scratch file is still removed.
        assert_eq!(provider.deletes.load(Ordering::SeqCst), 0);
        assert!(!scratch_path(&harness).exists());
    }

    #[tokio::test]
    async fn test_duration_written_from_container_metadata() {
        let mut server = mockito::Server::new_async().await;
        let _audio = server
            .mock("GET", "/audio.wav")
            .with_status(200)
            .with_body(fetch::wav_bytes(90))
            .create_async()
            .await;
        let audio_url = format!("{}/audio.wav", server.url());

        let harness = setup();
        let provider = Arc::new(FakeProvider::returning(
            r#"{"summary": "Timed", "transcript": [], "actionItems": []}"#,
        ));

        run(&harness, provider, &audio_url).await;

        let meeting = harness.db.get_meeting(&harness.meeting_id).unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Completed);
        assert_eq!(meeting.duration_seconds, Some(90));
    }
}
