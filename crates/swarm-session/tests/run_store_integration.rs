#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use swarm_core::{default_roster, AgentState, LogEvent, ResearchLog, SavedRun};
use swarm_session::{FileRunStore, MemoryRunStore, RunStore};
use uuid::Uuid;

/// Helper: create a FileRunStore in a temp directory.
async fn temp_store() -> (FileRunStore, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileRunStore::new(tmp.path().join("runs")).await.unwrap();
    (store, tmp)
}

fn sample_run(topic: &str, age_minutes: i64) -> SavedRun {
    let mut log = ResearchLog::new();
    log.append(LogEvent::phase(
        "Phase 1: Initial Individual Research commencing...",
    ));
    log.append(LogEvent::Synthesis {
        persona_id: 9,
        text: format!("# {topic}"),
        sources: vec![],
    });
    let mut run = SavedRun::new(
        topic,
        log.into_entries(),
        format!("# {topic}"),
        AgentState::for_roster(&default_roster()),
    );
    run.timestamp = Utc::now() - Duration::minutes(age_minutes);
    run
}

#[tokio::test]
async fn test_save_and_get_run() {
    let (store, _tmp) = temp_store().await;
    let run = sample_run("renewable energy storage", 0);

    let id = store.save(&run).await.unwrap();
    assert_eq!(id, run.id);

    let loaded = store.get(id).await.unwrap().unwrap();
    assert_eq!(loaded, run);
}

#[tokio::test]
async fn test_get_nonexistent_returns_none() {
    let (store, _tmp) = temp_store().await;
    assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let (store, tmp) = temp_store().await;
    store.save(&sample_run("old", 30)).await.unwrap();
    store.save(&sample_run("newest", 1)).await.unwrap();
    store.save(&sample_run("middle", 10)).await.unwrap();
    // Stray files in the directory are ignored
    std::fs::write(tmp.path().join("runs").join("notes.txt"), "hi").unwrap();

    let topics: Vec<String> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.topic)
        .collect();
    assert_eq!(topics, vec!["newest", "middle", "old"]);
}

#[tokio::test]
async fn test_delete_run() {
    let (store, _tmp) = temp_store().await;
    let run = sample_run("to delete", 0);
    let id = store.save(&run).await.unwrap();

    store.delete(id).await.unwrap();
    assert!(store.get(id).await.unwrap().is_none());
    assert!(store.list().await.unwrap().is_empty());

    // Deleting again is a no-op
    store.delete(id).await.unwrap();
}

#[tokio::test]
async fn test_corrupt_file_is_session_error() {
    let (store, tmp) = temp_store().await;
    let id = Uuid::new_v4();
    std::fs::write(tmp.path().join("runs").join(format!("{id}.json")), "{not json").unwrap();

    let err = store.get(id).await.unwrap_err();
    assert!(matches!(err, swarm_core::SwarmError::Session(_)));
    // list skips it rather than failing
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_memory_store_matches_file_store_ordering() {
    let store = MemoryRunStore::new();
    store.save(&sample_run("a", 5)).await.unwrap();
    store.save(&sample_run("b", 0)).await.unwrap();
    let topics: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.topic).collect();
    assert_eq!(topics, vec!["b", "a"]);
}
