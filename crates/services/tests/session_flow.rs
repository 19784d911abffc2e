use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use practice_core::model::content::{ChoiceQuestion, MatchPair};
use practice_core::model::{
    Answer, Exercise, ExerciseContent, ExerciseId, PackageId, SessionSettings,
};
use practice_core::session::{CompletionRecord, EndReason, SessionError, SessionState, Transition};
use practice_core::time::fixed_now;
use services::{
    AppServices, Clock, ExerciseSessionService, HttpProgressReporter, HttpReporterConfig,
    ProgressReporter, ReportError, ReportStatus,
};
use storage::repository::ProgressRepository;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Recording {
    calls: Mutex<Vec<CompletionRecord>>,
}

impl Recording {
    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ProgressReporter for Recording {
    async fn mark_complete(&self, record: &CompletionRecord) -> Result<(), ReportError> {
        self.calls.lock().unwrap().push(record.clone());
        Ok(())
    }
}

struct Unreachable;

#[async_trait]
impl ProgressReporter for Unreachable {
    async fn mark_complete(&self, _record: &CompletionRecord) -> Result<(), ReportError> {
        Err(ReportError::Disabled)
    }
}

fn quiz(n: usize) -> Exercise {
    let questions = (0..n)
        .map(|i| ChoiceQuestion {
            prompt: format!("Q{i}"),
            options: vec!["yes".into(), "no".into()],
            correct: [0].into_iter().collect(),
        })
        .collect();
    Exercise::new(
        ExerciseId::new("quiz").unwrap(),
        PackageId::new("pkg-1").unwrap(),
        "Quiz",
        ExerciseContent::MultipleChoice { questions },
    )
}

fn choose(i: usize) -> Answer {
    Answer::Choices([i].into_iter().collect())
}

#[tokio::test]
async fn completion_is_reported_once_even_after_stray_exit() {
    let reporter = Arc::new(Recording::default());
    let service = ExerciseSessionService::new(Clock::fixed(fixed_now()), reporter.clone());
    let mut session = service.start(&quiz(5)).unwrap();

    for _ in 0..2 {
        let step = service
            .submit_answer(&mut session, choose(1), false)
            .await
            .unwrap();
        assert_eq!(step.report, None);
    }
    let step = service
        .submit_answer(&mut session, choose(1), false)
        .await
        .unwrap();
    assert_eq!(step.transition, Transition::Aborted);
    assert_eq!(step.report, Some(ReportStatus::Reported));
    assert_eq!(step.progress.answered, 3);

    let err = service
        .force_complete(&mut session, EndReason::StudentExit)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Terminal { .. }));
    assert_eq!(service.finalize(&mut session).await, ReportStatus::AlreadyReported);
    assert_eq!(reporter.count(), 1);

    let calls = reporter.calls.lock().unwrap();
    assert_eq!(calls[0].state, SessionState::Aborted);
    assert_eq!(calls[0].result.score_percentage, 0);
}

#[tokio::test]
async fn reporter_failure_leaves_results_available() {
    let service = ExerciseSessionService::new(Clock::fixed(fixed_now()), Arc::new(Unreachable));
    let mut session = service.start(&quiz(1)).unwrap();

    let step = service
        .submit_answer(&mut session, choose(0), true)
        .await
        .unwrap();
    assert_eq!(step.report, Some(ReportStatus::Failed));
    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.results().unwrap().score_percentage, 100);
    assert_eq!(service.finalize(&mut session).await, ReportStatus::AlreadyReported);
}

#[tokio::test]
async fn matching_skip_is_refused_and_nothing_reported() {
    let reporter = Arc::new(Recording::default());
    let service = ExerciseSessionService::new(Clock::fixed(fixed_now()), reporter.clone());
    let exercise = Exercise::new(
        ExerciseId::new("pairs").unwrap(),
        PackageId::new("pkg-1").unwrap(),
        "Pairs",
        ExerciseContent::Matching {
            pairs: vec![MatchPair {
                left: "hot".into(),
                right: "cold".into(),
            }],
        },
    );
    let mut session = service.start(&exercise).unwrap();

    assert!(matches!(
        service.skip(&mut session).await,
        Err(SessionError::SkipNotAllowed { .. })
    ));
    assert_eq!(service.finalize(&mut session).await, ReportStatus::Pending);
    assert_eq!(reporter.count(), 0);
}

#[tokio::test]
async fn restart_creates_an_unrelated_session() {
    let reporter = Arc::new(Recording::default());
    let settings = SessionSettings::default().without_lives();
    let service =
        ExerciseSessionService::new(Clock::fixed(fixed_now()), reporter.clone()).with_settings(settings);
    let mut first = service.start(&quiz(1)).unwrap();
    service
        .submit_answer(&mut first, choose(0), true)
        .await
        .unwrap();

    let mut second = service.restart(&first);
    assert_ne!(second.id(), first.id());
    assert!(second.is_active());
    assert_eq!(second.lives_remaining(), None);

    service
        .submit_answer(&mut second, choose(1), false)
        .await
        .unwrap();
    assert_eq!(reporter.count(), 2);
}

#[tokio::test]
async fn app_services_store_history_and_post_remotely() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/packages/pkg-1/exercises/quiz/complete"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let remote = HttpProgressReporter::new(Some(HttpReporterConfig::new(server.uri())));
    let app = AppServices::in_memory(
        Clock::fixed(fixed_now()),
        SessionSettings::default(),
        remote,
    );
    assert!(app.remote_reporting());

    let sessions = app.sessions();
    let mut session = sessions.start(&quiz(2)).unwrap();
    sessions
        .submit_answer(&mut session, choose(0), true)
        .await
        .unwrap();
    let step = sessions
        .submit_answer(&mut session, choose(0), true)
        .await
        .unwrap();
    assert_eq!(step.report, Some(ReportStatus::Reported));

    let history = app
        .history()
        .list_completions(&ExerciseId::new("quiz").unwrap(), 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result.score_percentage, 100);
}

#[tokio::test]
async fn stalled_remote_does_not_hold_back_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let remote = HttpProgressReporter::new(Some(
        HttpReporterConfig::new(server.uri()).with_timeout(Duration::from_millis(200)),
    ));
    let app = AppServices::in_memory(
        Clock::fixed(fixed_now()),
        SessionSettings::default(),
        remote,
    );
    let exercise = quiz(1);
    let live = app.sessions().start_live(&exercise).unwrap();

    let transition = tokio::time::timeout(Duration::from_secs(5), live.submit_answer(choose(0), true))
        .await
        .expect("ending the session waited on the remote reporter")
        .unwrap();
    assert_eq!(transition, Transition::Completed);

    let results = live.results().await.unwrap();
    assert_eq!(results.score_percentage, 100);
    assert_eq!(live.close().await, ReportStatus::AlreadyReported);

    let history = app
        .history()
        .list_completions(&exercise.id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}
