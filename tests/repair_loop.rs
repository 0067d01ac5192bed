use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use artifact_store::layout::{page_html_key, script_key};
use artifact_store::{ArtifactStore, MemoryArtifactStore, StoreError, StoreResult};
use async_trait::async_trait;
use plan_ir::{ExplorationResult, RawAction};
use script_codegen::GeneratedScript;
use script_executor::{
    ExecutionOutcome, ExecutionReport, ExecutionRequest, ExecutorError, ScriptExecutor,
};
use scry_cli::{
    submit_plan, AttemptOutcome, FailureReason, JobState, JobStatus, RepairOrchestrator,
    ScryConfig, ScryError, ScryService,
};
use scry_core_types::{
    ArtifactRef, FailureKind, FailureReport, JobId, Patch, PatchAction, PatchSignature,
};
use self_heal::{
    ClassifierError, ContentClassifier, ContentHint, Diagnoser, Diagnosis, DiagnosisInput,
};
use serde_json::json;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

/// Replays queued outcomes, then repeats `fallback` forever
struct ScriptedExecutor {
    store: Arc<dyn ArtifactStore>,
    queue: Mutex<VecDeque<Result<ExecutionOutcome, String>>>,
    fallback: ExecutionOutcome,
    /// Markup stored with every failure, when set
    failure_html: Option<String>,
    scripts: Mutex<Vec<GeneratedScript>>,
}

impl ScriptedExecutor {
    fn new(store: Arc<dyn ArtifactStore>, fallback: ExecutionOutcome) -> Self {
        Self {
            store,
            queue: Mutex::new(VecDeque::new()),
            fallback,
            failure_html: None,
            scripts: Mutex::new(Vec::new()),
        }
    }

    fn then(self, outcome: ExecutionOutcome) -> Self {
        self.queue.lock().unwrap().push_back(Ok(outcome));
        self
    }

    fn then_crash(self, message: &str) -> Self {
        self.queue.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    fn with_failure_html(mut self, html: &str) -> Self {
        self.failure_html = Some(html.to_string());
        self
    }

    fn scripts(&self) -> Vec<GeneratedScript> {
        self.scripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptExecutor for ScriptedExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionReport, ExecutorError> {
        let next = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        let mut outcome = next.map_err(ExecutorError::Spawn)?;

        self.scripts.lock().unwrap().push(request.script.clone());
        let script_ref = self
            .store
            .put(
                &script_key(&request.job_id, request.attempt),
                request.script.source.into_bytes(),
            )
            .await?;
        let mut artifacts = vec![script_ref.clone()];

        if let (ExecutionOutcome::Failure(report), Some(html)) =
            (&mut outcome, self.failure_html.as_ref())
        {
            let html_ref = self
                .store
                .put(
                    &page_html_key(&request.job_id, request.attempt),
                    html.clone().into_bytes(),
                )
                .await?;
            report.html = Some(html_ref.clone());
            artifacts.push(html_ref);
        }

        Ok(ExecutionReport {
            outcome,
            script_ref,
            artifacts,
            duration_ms: 5,
        })
    }
}

/// Proposes the same patch for every failure
struct StubbornDiagnoser(Patch);

impl Diagnoser for StubbornDiagnoser {
    fn diagnose(&self, _input: &DiagnosisInput<'_>) -> Diagnosis {
        Diagnosis::Patch {
            patch: self.0.clone(),
            summary: "same patch again".into(),
        }
    }
}

/// Proposes a fresh signature for every failure
#[derive(Default)]
struct InventiveDiagnoser {
    calls: Mutex<usize>,
}

impl Diagnoser for InventiveDiagnoser {
    fn diagnose(&self, _input: &DiagnosisInput<'_>) -> Diagnosis {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        Diagnosis::Patch {
            patch: Patch::new(
                PatchSignature::new(FailureKind::UnhandledException, Some(*calls)),
                PatchAction::WaitLoadState,
            ),
            summary: format!("guess #{calls}"),
        }
    }
}

struct SlowClassifier;

#[async_trait]
impl ContentClassifier for SlowClassifier {
    async fn classify(&self, _html: &str) -> Result<ContentHint, ClassifierError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(ContentHint {
            consent_dialog: true,
            confidence: 1.0,
            label: None,
        })
    }
}

/// Never answers its first request; answers every later one immediately
#[derive(Default)]
struct StallOnceClassifier {
    calls: AtomicUsize,
}

#[async_trait]
impl ContentClassifier for StallOnceClassifier {
    async fn classify(&self, _html: &str) -> Result<ContentHint, ClassifierError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            std::future::pending::<()>().await;
        }
        Ok(ContentHint {
            consent_dialog: false,
            confidence: 0.0,
            label: None,
        })
    }
}

/// Accepts writes but cannot read anything back
struct WriteOnlyStore(MemoryArtifactStore);

#[async_trait]
impl ArtifactStore for WriteOnlyStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<ArtifactRef> {
        self.0.put(key, bytes).await
    }

    async fn get(&self, _artifact: &ArtifactRef) -> StoreResult<Vec<u8>> {
        Err(StoreError::Io("disk detached".into()))
    }

    async fn list(&self, job: &JobId) -> StoreResult<Vec<ArtifactRef>> {
        self.0.list(job).await
    }
}

fn exploration() -> ExplorationResult {
    ExplorationResult::new(vec![
        RawAction::navigate("https://shop.test/"),
        RawAction::wait_for(".grid"),
        RawAction::click("#checkout"),
    ])
}

fn success() -> ExecutionOutcome {
    ExecutionOutcome::Success {
        data: json!({"title": "Shop"}),
    }
}

fn failure(kind: FailureKind, step: usize) -> ExecutionOutcome {
    ExecutionOutcome::Failure(FailureReport::new(kind, Some(step), "boom"))
}

fn config(max_repair_attempts: u32) -> ScryConfig {
    ScryConfig {
        max_repair_attempts,
        ..ScryConfig::default()
    }
}

fn orchestrator(
    config: &ScryConfig,
    executor: &Arc<ScriptedExecutor>,
    store: &Arc<MemoryArtifactStore>,
) -> RepairOrchestrator {
    RepairOrchestrator::new(
        config,
        Arc::clone(executor) as Arc<dyn ScriptExecutor>,
        Arc::clone(store) as Arc<dyn ArtifactStore>,
    )
}

fn setup(fallback: ExecutionOutcome) -> (Arc<MemoryArtifactStore>, ScriptedExecutor) {
    let store = Arc::new(MemoryArtifactStore::new());
    let executor = ScriptedExecutor::new(Arc::clone(&store) as Arc<dyn ArtifactStore>, fallback);
    (store, executor)
}

#[tokio::test]
async fn first_attempt_success_records_one_script() {
    let (store, executor) = setup(success());
    let executor = Arc::new(executor);
    let mut job = submit_plan(&exploration()).unwrap();

    let result = orchestrator(&config(20), &executor, &store)
        .run_repair_loop(&mut job)
        .await;

    assert!(result.succeeded());
    assert_eq!(result.reason, None);
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(result.data, Some(json!({"title": "Shop"})));
    assert_eq!(executor.scripts().len(), 1);
    assert_eq!(job.state(), &JobState::Succeeded);

    let artifacts = scry_cli::collect_job_artifacts(store.as_ref(), job.id())
        .await
        .unwrap();
    assert_eq!(artifacts.script, result.script_ref);
}

#[tokio::test]
async fn wait_timeout_is_repaired_with_longer_wait() {
    let (store, executor) = setup(success());
    let executor = Arc::new(executor.then(failure(FailureKind::Timeout, 1)));
    let mut job = submit_plan(&exploration()).unwrap();

    let result = orchestrator(&config(20), &executor, &store)
        .run_repair_loop(&mut job)
        .await;

    assert!(result.succeeded());
    assert_eq!(result.attempts.len(), 2);
    assert!(result.attempts[0].diagnosis.is_some());
    assert_eq!(
        job.patches().patches()[0].action,
        PatchAction::ExtraWaitMs { delta_ms: 2_000 }
    );

    let scripts = executor.scripts();
    assert_eq!(scripts.len(), 2);
    assert_ne!(scripts[0].digest, scripts[1].digest);
    let changed: Vec<(&str, &str)> = scripts[0]
        .source
        .lines()
        .zip(scripts[1].source.lines())
        .filter(|(a, b)| a != b)
        .collect();
    assert_eq!(changed.len(), 1);
    assert!(changed[0].0.contains("timeout=10000"));
    assert!(changed[0].1.contains("timeout=12000"));
}

#[tokio::test]
async fn missing_selector_without_fallbacks_fails_at_first_attempt() {
    let (store, executor) = setup(failure(FailureKind::SelectorNotFound, 2));
    let executor = Arc::new(executor);
    let mut job = submit_plan(&exploration()).unwrap();

    let result = orchestrator(&config(20), &executor, &store)
        .run_repair_loop(&mut job)
        .await;

    assert_eq!(result.reason, Some(FailureReason::NoPatchAvailable));
    assert_eq!(result.attempts.len(), 1);
    assert!(matches!(
        result.attempts[0].outcome,
        AttemptOutcome::Failure {
            kind: FailureKind::SelectorNotFound,
            step_index: Some(2),
            ..
        }
    ));
    assert!(job.patches().is_empty());
}

#[tokio::test]
async fn repeated_patch_is_rejected_before_budget() {
    let (store, executor) = setup(failure(FailureKind::Timeout, 2));
    let executor = Arc::new(executor);
    let stubborn = StubbornDiagnoser(Patch::new(
        PatchSignature::new(FailureKind::Timeout, Some(2)),
        PatchAction::WaitLoadState,
    ));
    let mut job = submit_plan(&exploration()).unwrap();

    let result = orchestrator(&config(20), &executor, &store)
        .with_diagnoser(Arc::new(stubborn))
        .run_repair_loop(&mut job)
        .await;

    assert_eq!(result.reason, Some(FailureReason::NoPatchAvailable));
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(job.patches().len(), 1);
}

#[tokio::test]
async fn empty_exploration_is_rejected_without_side_effects() {
    let store = Arc::new(MemoryArtifactStore::new());
    let executor = Arc::new(ScriptedExecutor::new(
        Arc::clone(&store) as Arc<dyn ArtifactStore>,
        success(),
    ));
    let service = ScryService::new(orchestrator(&config(20), &executor, &store));

    let err = service
        .submit_plan(&ExplorationResult::default())
        .unwrap_err();
    assert!(matches!(err, ScryError::Validation(_)));
    assert!(service.job_ids().is_empty());
    assert!(executor.scripts().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn attempts_never_exceed_budget() {
    for max in 1..=4 {
        let (store, executor) = setup(failure(FailureKind::UnhandledException, 0));
        let executor = Arc::new(executor);
        let mut job = submit_plan(&exploration()).unwrap();

        let result = orchestrator(&config(max), &executor, &store)
            .with_diagnoser(Arc::new(InventiveDiagnoser::default()))
            .run_repair_loop(&mut job)
            .await;

        assert_eq!(result.reason, Some(FailureReason::MaxAttemptsExceeded));
        assert_eq!(result.attempts.len() as u32, max);
        assert_eq!(executor.scripts().len() as u32, max);
        let numbers: Vec<u32> = result.attempts.iter().map(|a| a.number).collect();
        assert_eq!(numbers, (1..=max).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn success_stops_the_loop() {
    let (store, executor) = setup(failure(FailureKind::Timeout, 1));
    let executor = Arc::new(executor.then(success()));
    let mut job = submit_plan(&exploration()).unwrap();

    let orchestrator = orchestrator(&config(20), &executor, &store);
    let first = orchestrator.run_repair_loop(&mut job).await;
    assert!(first.succeeded());
    assert_eq!(first.attempts.len(), 1);

    // A terminal job returns its stored result without executing again.
    let second = orchestrator.run_repair_loop(&mut job).await;
    assert_eq!(first, second);
    assert_eq!(executor.scripts().len(), 1);
}

#[tokio::test]
async fn executor_errors_are_fatal() {
    let (store, executor) = setup(success());
    let executor = Arc::new(executor.then_crash("interpreter missing"));
    let mut job = submit_plan(&exploration()).unwrap();

    let result = orchestrator(&config(20), &executor, &store)
        .run_repair_loop(&mut job)
        .await;

    match &result.reason {
        Some(FailureReason::FatalError(message)) => {
            assert!(message.contains("interpreter missing"))
        }
        other => panic!("unexpected reason {other:?}"),
    }
    assert_eq!(result.attempts.len(), 1);
    assert!(matches!(
        result.attempts[0].outcome,
        AttemptOutcome::Aborted { .. }
    ));
}

#[tokio::test]
async fn cancelled_jobs_fail_without_attempts() {
    let (store, executor) = setup(success());
    let executor = Arc::new(executor);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut job = submit_plan(&exploration()).unwrap();

    let result = orchestrator(&config(20), &executor, &store)
        .with_cancellation(cancel)
        .run_repair_loop(&mut job)
        .await;

    assert_eq!(result.reason, Some(FailureReason::Cancelled));
    assert!(result.attempts.is_empty());
    assert!(executor.scripts().is_empty());
}

#[tokio::test]
async fn consent_markup_triggers_banner_handling() {
    let (store, executor) = setup(success());
    let executor = Arc::new(
        executor
            .with_failure_html(r#"<div id="onetrust-banner-sdk">cookies</div>"#)
            .then(failure(FailureKind::SelectorNotFound, 2)),
    );
    let mut job = submit_plan(&exploration()).unwrap();

    let result = orchestrator(&config(20), &executor, &store)
        .run_repair_loop(&mut job)
        .await;

    assert!(result.succeeded());
    assert_eq!(
        job.patches().patches()[0].action,
        PatchAction::HandleCookieBanner
    );
    let scripts = executor.scripts();
    let dismiss = "\n            dismiss_consent(page)\n";
    assert!(!scripts[0].source.contains(dismiss));
    assert!(scripts[1].source.contains(dismiss));

    let artifacts = scry_cli::collect_job_artifacts(store.as_ref(), job.id())
        .await
        .unwrap();
    assert_eq!(artifacts.html_snapshots.len(), 1);
}

#[tokio::test]
async fn slow_classifier_is_ignored() {
    let (store, executor) = setup(success());
    let executor = Arc::new(
        executor
            .with_failure_html("<main>nothing special</main>")
            .then(failure(FailureKind::NavigationError, 0)),
    );
    let mut cfg = config(20);
    cfg.diagnoser.classifier_timeout_ms = 20;
    let mut job = submit_plan(&exploration()).unwrap();

    let result = orchestrator(&cfg, &executor, &store)
        .with_classifier(Arc::new(SlowClassifier))
        .run_repair_loop(&mut job)
        .await;

    assert!(result.succeeded());
    assert_eq!(job.patches().patches()[0].action, PatchAction::WaitLoadState);
}

#[tokio::test]
async fn service_tracks_jobs_and_artifacts() {
    let (store, executor) = setup(success());
    let executor = Arc::new(executor.then(failure(FailureKind::Timeout, 1)));
    let service = ScryService::new(orchestrator(&config(20), &executor, &store));

    let id = assert_ok!(service.submit_plan(&exploration()));
    assert_eq!(service.job(&id).await.unwrap().status(), &JobStatus::Pending);

    let result = service.run_repair_loop(&id).await.unwrap();
    assert!(result.succeeded());

    let artifacts = service.get_job_artifacts(&id).await.unwrap();
    assert_eq!(artifacts.script, result.script_ref);
    assert!(artifacts
        .script
        .as_ref()
        .is_some_and(|script| script.as_str().contains("attempt-2")));

    let unknown = scry_core_types::JobId::from("missing");
    assert!(matches!(
        service.run_repair_loop(&unknown).await,
        Err(ScryError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn missing_selector_switches_to_markup_fallback() {
    let (store, executor) = setup(success());
    let executor = Arc::new(executor.then(failure(FailureKind::SelectorNotFound, 2)));
    let mut job = submit_plan(&ExplorationResult::new(vec![
        RawAction::navigate("https://shop.test/"),
        RawAction::wait_for(".grid"),
        RawAction::click("#checkout")
            .with_element_html(r#"<button id="candidate" class="buy">Checkout</button>"#),
    ]))
    .unwrap();

    let result = orchestrator(&config(20), &executor, &store)
        .run_repair_loop(&mut job)
        .await;

    assert!(result.succeeded());
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(
        job.patches().patches()[0].action,
        PatchAction::SelectorFallback {
            step_index: 2,
            candidate: "#candidate".into(),
        }
    );
    let scripts = executor.scripts();
    assert!(scripts[0]
        .source
        .contains(r##"page.locator("#checkout").first.click()"##));
    assert!(scripts[1]
        .source
        .contains(r##"page.locator("#candidate").first.click()"##));
    assert!(!scripts[1].source.contains(r##"page.locator("#checkout")"##));
}

#[tokio::test]
async fn unrepairable_failure_after_earlier_repairs_stops_there() {
    let (store, executor) = setup(failure(FailureKind::UnhandledException, 2));
    let executor = Arc::new(
        executor
            .then(failure(FailureKind::Timeout, 1))
            .then(failure(FailureKind::NavigationError, 0)),
    );
    let mut job = submit_plan(&exploration()).unwrap();

    let result = orchestrator(&config(20), &executor, &store)
        .run_repair_loop(&mut job)
        .await;

    assert_eq!(result.reason, Some(FailureReason::NoPatchAvailable));
    assert_eq!(result.attempts.len(), 3);
    assert_eq!(executor.scripts().len(), 3);
    assert_eq!(job.patches().len(), 2);
    assert!(result.attempts[2].diagnosis.is_some());
    assert!(matches!(
        result.attempts[2].outcome,
        AttemptOutcome::Failure {
            kind: FailureKind::UnhandledException,
            ..
        }
    ));
}

#[tokio::test]
async fn interrupted_diagnosis_resumes_within_budget() {
    for max in 1..=2 {
        let (store, executor) = setup(failure(FailureKind::Timeout, 1));
        let executor = Arc::new(executor.with_failure_html("<main>loading</main>"));
        let mut cfg = config(max);
        cfg.diagnoser.classifier_timeout_ms = 60_000;
        let orchestrator = orchestrator(&cfg, &executor, &store)
            .with_diagnoser(Arc::new(InventiveDiagnoser::default()))
            .with_classifier(Arc::new(StallOnceClassifier::default()));
        let mut job = submit_plan(&exploration()).unwrap();

        let interrupted = tokio::time::timeout(
            Duration::from_millis(200),
            orchestrator.run_repair_loop(&mut job),
        )
        .await;
        assert!(interrupted.is_err());
        assert_eq!(job.state(), &JobState::Diagnosing);

        let result = orchestrator.run_repair_loop(&mut job).await;

        assert_eq!(result.reason, Some(FailureReason::MaxAttemptsExceeded));
        let numbers: Vec<u32> = result.attempts.iter().map(|a| a.number).collect();
        assert_eq!(numbers, (1..=max).collect::<Vec<_>>());
        let scripts = executor.scripts();
        assert_eq!(scripts.len() as u32, max);
        if max == 2 {
            assert_ne!(scripts[0].digest, scripts[1].digest);
        }
    }
}

#[tokio::test]
async fn unreadable_failure_markup_is_fatal() {
    let store = Arc::new(WriteOnlyStore(MemoryArtifactStore::new()));
    let executor = Arc::new(
        ScriptedExecutor::new(
            Arc::clone(&store) as Arc<dyn ArtifactStore>,
            failure(FailureKind::SelectorNotFound, 2),
        )
        .with_failure_html("<main>gone</main>"),
    );
    let mut job = submit_plan(&exploration()).unwrap();

    let result = RepairOrchestrator::new(
        &config(20),
        Arc::clone(&executor) as Arc<dyn ScriptExecutor>,
        store as Arc<dyn ArtifactStore>,
    )
    .run_repair_loop(&mut job)
    .await;

    match &result.reason {
        Some(FailureReason::FatalError(message)) => assert!(message.contains("disk detached")),
        other => panic!("unexpected reason {other:?}"),
    }
    assert_eq!(result.attempts.len(), 1);
    assert!(job.patches().is_empty());
}
