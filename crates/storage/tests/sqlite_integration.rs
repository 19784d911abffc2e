use chrono::Duration;
use practice_core::model::{ExerciseId, PackageId, SessionId};
use practice_core::session::{CompletionRecord, CompletionResult, EndReason, SessionState};
use practice_core::time::fixed_now;
use storage::repository::{ProgressRepository, Storage, StorageError};
use storage::sqlite::{LATEST_VERSION, SqliteInitError, SqliteRepository};

fn record(exercise: &str, score: u8, offset_secs: i64) -> CompletionRecord {
    CompletionRecord {
        session_id: SessionId::generate(),
        exercise_id: ExerciseId::new(exercise).unwrap(),
        package_id: PackageId::new("pkg-1").unwrap(),
        state: SessionState::Completed,
        end_reason: EndReason::Finished,
        result: CompletionResult {
            score_percentage: score,
            time_spent_seconds: 42,
            completed_at: fixed_now() + Duration::seconds(offset_secs),
        },
    }
}

#[tokio::test]
async fn sqlite_roundtrip_persists_completion() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let mut rec = record("ex-1", 75, 0);
    rec.state = SessionState::Aborted;
    rec.end_reason = EndReason::LivesExhausted;
    repo.append_completion(&rec).await.unwrap();

    let fetched = repo.get_completion(rec.session_id).await.expect("fetch");
    assert_eq!(fetched, rec);
}

#[tokio::test]
async fn sqlite_rejects_second_completion_for_session() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_conflict?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let rec = record("ex-1", 60, 0);
    repo.append_completion(&rec).await.unwrap();
    let err = repo.append_completion(&rec).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let listed = repo
        .list_completions(&rec.exercise_id, 10)
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn sqlite_lists_history_and_best_score() {
    let storage = Storage::sqlite("sqlite:file:memdb_history?mode=memory&cache=shared")
        .await
        .expect("storage");
    let repo = storage.progress;

    repo.append_completion(&record("ex-1", 50, 0)).await.unwrap();
    repo.append_completion(&record("ex-1", 95, 60)).await.unwrap();
    repo.append_completion(&record("ex-1", 80, 120)).await.unwrap();
    repo.append_completion(&record("ex-2", 100, 180)).await.unwrap();

    let ex = ExerciseId::new("ex-1").unwrap();
    let recent = repo.list_completions(&ex, 2).await.expect("list");
    let scores: Vec<u8> = recent.iter().map(|r| r.result.score_percentage).collect();
    assert_eq!(scores, vec![80, 95]);

    assert_eq!(repo.best_score(&ex).await.unwrap(), Some(95));
    let unseen = ExerciseId::new("ex-9").unwrap();
    assert_eq!(repo.best_score(&unseen).await.unwrap(), None);

    let pkg = PackageId::new("pkg-1").unwrap();
    let all = repo.list_package_completions(&pkg, 10).await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].exercise_id.as_str(), "ex-2");
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    let err = repo
        .get_completion(SessionId::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn connect_and_migrate_reports_schema_version() {
    let url = "sqlite:file:memdb_version?mode=memory&cache=shared";
    let bare = SqliteRepository::connect(url).await.expect("connect");
    assert_eq!(bare.schema_version().await.unwrap(), 0);

    let repo = SqliteRepository::connect_and_migrate(url)
        .await
        .expect("connect and migrate");
    assert_eq!(repo.schema_version().await.unwrap(), LATEST_VERSION);
    drop(bare);
}

#[tokio::test]
async fn newer_schema_is_refused() {
    let repo = SqliteRepository::connect_and_migrate(
        "sqlite:file:memdb_too_new?mode=memory&cache=shared",
    )
    .await
    .expect("connect and migrate");
    sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, '2030-01-01')")
        .bind(LATEST_VERSION + 1)
        .execute(repo.pool())
        .await
        .expect("insert future version");

    let err = repo.migrate().await.unwrap_err();
    assert!(matches!(
        err,
        SqliteInitError::SchemaTooNew { found, supported }
            if found == LATEST_VERSION + 1 && supported == LATEST_VERSION
    ));
}
