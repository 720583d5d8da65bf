// Integration tests for document export and artifact expiry
//
// These render completed recordings, store the documents with a TTL and
// check resolution before and after expiry.

mod common;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::time::Duration;
use tempfile::TempDir;
use common::{FakeLanguage, FakeTranscriber, TestService};
use whsp::export::{parse_front_matter, render};
use whsp::recording::{StageOutput, Summary};
use whsp::{
    AudioFormat, Error, ExportFormat, ExportLookup, ExportStore, NewRecording, Recording,
    RecordingMode, RecordingRegistry, RecordingStatus,
};

const TTL: Duration = Duration::from_secs(15 * 60);

async fn completed_recording(registry: &RecordingRegistry, mode: RecordingMode) -> Result<Recording> {
    let id = registry
        .create(NewRecording::new(AudioFormat::Wav, mode))
        .await?
        .id;
    registry.update_status(id, RecordingStatus::Processing).await?;
    registry
        .save_stage_output(
            id,
            StageOutput {
                raw_transcript: Some("um so uh what was your role".to_string()),
                clean_transcript: Some("What was your role?".to_string()),
                language: Some("en".to_string()),
                confidence_score: Some(0.87),
                summary: Some(Summary {
                    mode,
                    text: "Q: What was your role?\nA: Café lead, naïve résumé.".to_string(),
                    tokens: 12,
                    confidence: 0.8,
                }),
                ..Default::default()
            },
        )
        .await?;
    Ok(registry.update_status(id, RecordingStatus::Completed).await?)
}

#[tokio::test]
async fn test_markdown_front_matter_round_trip() -> Result<()> {
    let registry = RecordingRegistry::new();
    let recording = completed_recording(&registry, RecordingMode::Interview).await?;
    let generated_at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();

    let bytes = render(&recording, ExportFormat::Markdown, generated_at)?;
    let markdown = String::from_utf8(bytes)?;

    assert!(markdown.contains("## Summary"));
    assert!(markdown.contains("## Transcript"));
    assert!(markdown.contains("What was your role?"));

    let metadata = parse_front_matter(&markdown)?;
    assert_eq!(metadata.recording_id, recording.id);
    assert_eq!(metadata.mode, RecordingMode::Interview);
    assert_eq!(metadata.confidence_score, Some(0.87));
    assert_eq!(metadata.language.as_deref(), Some("en"));
    assert_eq!(metadata.generated_at, Some(generated_at));

    // Same input, same bytes
    let again = render(&recording, ExportFormat::Markdown, generated_at)?;
    assert_eq!(again, markdown.into_bytes());

    Ok(())
}

#[tokio::test]
async fn test_document_formats_have_expected_signatures() -> Result<()> {
    let registry = RecordingRegistry::new();
    let recording = completed_recording(&registry, RecordingMode::Meeting).await?;
    let now = Utc::now();

    let rtf = render(&recording, ExportFormat::Rtf, now)?;
    assert!(rtf.starts_with(b"{\\rtf1"));
    assert!(rtf.ends_with(b"}"));
    let rtf = String::from_utf8(rtf)?;
    assert!(rtf.is_ascii(), "non-ASCII text is escaped");
    assert!(rtf.contains("\\u233?"), "é escaped as a unicode control word");

    let pdf = render(&recording, ExportFormat::Pdf, now)?;
    assert!(pdf.starts_with(b"%PDF-"));
    let tail = String::from_utf8_lossy(&pdf[pdf.len().saturating_sub(32)..]).to_string();
    assert!(tail.contains("%%EOF"));

    Ok(())
}

#[tokio::test]
async fn test_render_requires_completed_recording() -> Result<()> {
    let registry = RecordingRegistry::new();
    let recording = registry
        .create(NewRecording::new(AudioFormat::Wav, RecordingMode::Meeting))
        .await?;

    let err = render(&recording, ExportFormat::Markdown, Utc::now()).unwrap_err();
    assert!(matches!(err, Error::Render(_)));

    Ok(())
}

#[tokio::test]
async fn test_artifact_valid_until_ttl_then_expired() -> Result<()> {
    let dir = TempDir::new()?;
    let registry = RecordingRegistry::new();
    let recording = completed_recording(&registry, RecordingMode::Meeting).await?;
    let store = ExportStore::new(dir.path(), TTL);
    assert_eq!(store.root(), dir.path());
    assert_eq!(store.ttl(), ChronoDuration::minutes(15));

    let t = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
    let bytes = render(&recording, ExportFormat::Markdown, t)?;
    let artifact = store
        .store_at(&recording, ExportFormat::Markdown, bytes.clone(), t)
        .await?;

    assert_eq!(artifact.expires_at, t + ChronoDuration::minutes(15));
    assert!(artifact.path.starts_with(dir.path().join(recording.id.to_string())));
    assert_eq!(artifact.view().download_url, format!("/exports/{}/download", artifact.id));

    match store
        .resolve_at(artifact.id, t + ChronoDuration::minutes(10))
        .await?
    {
        ExportLookup::Available { artifact: found, bytes: read } => {
            assert_eq!(read, bytes);
            assert_eq!(found.download_count, 1);
        }
        other => panic!("expected available artifact, got {:?}", other),
    }

    match store
        .resolve_at(artifact.id, t + ChronoDuration::minutes(16))
        .await?
    {
        ExportLookup::Expired { artifact_id, expired_at } => {
            assert_eq!(artifact_id, artifact.id);
            assert_eq!(expired_at, artifact.expires_at);
        }
        other => panic!("expected expired artifact, got {:?}", other),
    }

    // Expiry is distinct from never having existed
    assert_eq!(
        store.resolve_at(uuid::Uuid::new_v4(), t).await?,
        ExportLookup::NotFound
    );

    Ok(())
}

#[tokio::test]
async fn test_sweep_removes_only_expired_artifacts() -> Result<()> {
    let dir = TempDir::new()?;
    let registry = RecordingRegistry::new();
    let old_recording = completed_recording(&registry, RecordingMode::Meeting).await?;
    let new_recording = completed_recording(&registry, RecordingMode::Lecture).await?;
    let store = ExportStore::new(dir.path(), TTL);

    let t = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
    let old = store
        .store_at(&old_recording, ExportFormat::Pdf, b"%PDF-old".to_vec(), t)
        .await?;
    let fresh = store
        .store_at(
            &new_recording,
            ExportFormat::Pdf,
            b"%PDF-new".to_vec(),
            t + ChronoDuration::minutes(10),
        )
        .await?;

    // A file already removed by hand is not an error
    std::fs::remove_file(&old.path)?;

    let swept = store.sweep_at(t + ChronoDuration::minutes(20)).await?;
    assert_eq!(swept, 1);
    assert!(store.get(old.id).await.is_none());
    assert!(!dir.path().join(old_recording.id.to_string()).exists());

    assert!(store.get(fresh.id).await.is_some());
    assert!(fresh.path.exists());

    assert_eq!(store.sweep_at(t + ChronoDuration::minutes(20)).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_delete_reports_whether_anything_was_removed() -> Result<()> {
    let dir = TempDir::new()?;
    let registry = RecordingRegistry::new();
    let recording = completed_recording(&registry, RecordingMode::Meeting).await?;
    let store = ExportStore::new(dir.path(), TTL);

    let artifact = store
        .store(&recording, ExportFormat::Rtf, b"{\\rtf1 }".to_vec())
        .await?;

    assert!(store.delete(artifact.id).await?);
    assert!(!artifact.path.exists());
    assert!(!store.delete(artifact.id).await?);
    assert_eq!(store.resolve(artifact.id).await?, ExportLookup::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_artifacts_of_one_recording_coexist() -> Result<()> {
    let dir = TempDir::new()?;
    let registry = RecordingRegistry::new();
    let recording = completed_recording(&registry, RecordingMode::Meeting).await?;
    let store = ExportStore::new(dir.path(), TTL);

    let now = Utc::now();
    let mut ids = Vec::new();
    for format in [ExportFormat::Markdown, ExportFormat::Rtf, ExportFormat::Pdf] {
        let bytes = render(&recording, format, now)?;
        ids.push(store.store(&recording, format, bytes).await?.id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
    assert_eq!(store.list_for_recording(recording.id).await.len(), 3);

    assert_eq!(store.delete_for_recording(recording.id).await?, 3);
    assert!(store.list_for_recording(recording.id).await.is_empty());
    assert!(!dir.path().join(recording.id.to_string()).exists());

    Ok(())
}

#[tokio::test]
async fn test_store_rejects_unfinished_recording() -> Result<()> {
    let dir = TempDir::new()?;
    let registry = RecordingRegistry::new();
    let recording = registry
        .create(NewRecording::new(AudioFormat::Wav, RecordingMode::Meeting))
        .await?;
    let store = ExportStore::new(dir.path(), TTL);

    let err = store
        .store(&recording, ExportFormat::Markdown, b"# draft".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Render(_)));
    assert!(store.list_for_recording(recording.id).await.is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_export_racing_recording_delete_leaves_nothing_behind() -> Result<()> {
    let t = TestService::new(
        FakeTranscriber::replying("unused", 0.9),
        FakeLanguage::summarizing("unused"),
    );

    for _ in 0..25 {
        let recording = completed_recording(t.service.registry(), RecordingMode::Meeting).await?;
        let id = recording.id;

        let exporter = t.service.clone();
        let deleter = t.service.clone();
        let export = tokio::spawn(async move { exporter.create_export(id, ExportFormat::Pdf).await });
        let delete = tokio::spawn(async move { deleter.delete_recording(id).await });

        let exported = export.await?;
        delete.await??;

        if let Err(e) = &exported {
            assert!(e.is_not_found(), "unexpected error {}", e);
        }
        assert!(t.service.exports().list_for_recording(id).await.is_empty());
        assert!(!t.dir.path().join("exports").join(id.to_string()).exists());
    }

    Ok(())
}
