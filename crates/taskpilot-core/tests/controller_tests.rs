use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use taskpilot_core::{
    AbortReason, ExecutionOutcome, LoopOutcome, Presenter, PresenterError, TaskLoopController,
};
use taskpilot_exec::ExecConfig;
use taskpilot_logging::{LogFormat, Logger};
use taskpilot_model::{GenerationError, PlanModel};
use taskpilot_plan::{Plan, PlatformProfile, Task};

/// Model that replays canned responses and records every prompt
#[derive(Default)]
struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlanModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

/// Presenter that answers from queues; an exhausted queue reads as a closed terminal
#[derive(Default)]
struct ScriptedPresenter {
    tasks: Mutex<VecDeque<String>>,
    approvals: Mutex<VecDeque<bool>>,
    judgments: Mutex<VecDeque<bool>>,
    feedback: Mutex<VecDeque<String>>,
    shown: Mutex<Vec<Plan>>,
    judgment_requests: Mutex<usize>,
    feedback_requests: Mutex<usize>,
}

impl ScriptedPresenter {
    fn new(approvals: &[bool], judgments: &[bool], feedback: &[&str]) -> Self {
        Self {
            approvals: Mutex::new(approvals.iter().copied().collect()),
            judgments: Mutex::new(judgments.iter().copied().collect()),
            feedback: Mutex::new(feedback.iter().map(|f| f.to_string()).collect()),
            ..Default::default()
        }
    }

    fn with_tasks(self, tasks: &[&str]) -> Self {
        *self.tasks.lock().unwrap() = tasks.iter().map(|t| t.to_string()).collect();
        self
    }

    fn shown(&self) -> Vec<Plan> {
        self.shown.lock().unwrap().clone()
    }

    fn judgment_requests(&self) -> usize {
        *self.judgment_requests.lock().unwrap()
    }

    fn feedback_requests(&self) -> usize {
        *self.feedback_requests.lock().unwrap()
    }
}

#[async_trait]
impl Presenter for ScriptedPresenter {
    async fn request_task(&self) -> Result<String, PresenterError> {
        self.tasks
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(PresenterError::Closed)
    }

    fn show_plan(&self, plan: &Plan) {
        self.shown.lock().unwrap().push(plan.clone());
    }

    async fn request_approval(&self, _plan: &Plan) -> Result<bool, PresenterError> {
        self.approvals
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(PresenterError::Closed)
    }

    async fn request_outcome_judgment(&self) -> Result<bool, PresenterError> {
        *self.judgment_requests.lock().unwrap() += 1;
        self.judgments
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(PresenterError::Closed)
    }

    async fn request_feedback(&self) -> Result<String, PresenterError> {
        *self.feedback_requests.lock().unwrap() += 1;
        self.feedback
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(PresenterError::Closed)
    }
}

fn exec_config(dir: &TempDir) -> ExecConfig {
    ExecConfig::new(dir.path().to_path_buf()).with_platform(PlatformProfile::from_os("linux"))
}

fn quiet_logger() -> Arc<Logger> {
    Arc::new(Logger::new(LogFormat::Compact))
}

async fn run(
    model: &ScriptedModel,
    presenter: &ScriptedPresenter,
    dir: &TempDir,
    task: &str,
) -> LoopOutcome {
    TaskLoopController::new(model, presenter, exec_config(dir), quiet_logger())
        .run(Task::new(task).unwrap())
        .await
        .unwrap()
}

const EMPTY_PLAN: &str = r#"{"plan": ["nothing to do"], "commands": [], "files": []}"#;

#[tokio::test]
async fn test_file_only_plan_reaches_judgment() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::replying(&[r#"```json
{"plan": ["Create hello.txt"], "commands": [], "files": [{"path": "hello.txt", "content": "hi"}]}
```"#]);
    let presenter = ScriptedPresenter::new(&[true], &[true], &[]);

    let outcome = run(&model, &presenter, &dir, "Create hello.txt containing hi").await;

    assert!(outcome.is_success());
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.iterations(), 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(),
        "hi"
    );
    assert_eq!(presenter.judgment_requests(), 1);

    let record = &outcome.history()[0];
    assert!(record.approved);
    assert_eq!(record.judged_success, Some(true));
    assert!(matches!(
        record.execution,
        Some(ExecutionOutcome::Succeeded { commands_run: 0, .. })
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_successful_command_reaches_judgment() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::replying(&[r#"{"plan": ["List files"], "commands": ["ls"]}"#]);
    let presenter = ScriptedPresenter::new(&[true], &[true], &[]);

    let outcome = run(&model, &presenter, &dir, "List files in the current directory").await;

    assert!(outcome.is_success());
    assert_eq!(presenter.judgment_requests(), 1);
    assert!(matches!(
        outcome.history()[0].execution,
        Some(ExecutionOutcome::Succeeded { commands_run: 1, .. })
    ));
}

#[tokio::test]
async fn test_unparseable_response_shows_placeholder_plan() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::replying(&["Sorry, I can't help"]);
    let presenter = ScriptedPresenter::new(&[false], &[], &[]);

    let outcome = run(&model, &presenter, &dir, "Do something").await;

    assert_eq!(presenter.shown(), vec![Plan::generation_failed()]);
    assert!(matches!(
        outcome,
        LoopOutcome::AbortedByUser {
            reason: AbortReason::Declined,
            ..
        }
    ));
    assert_eq!(outcome.exit_code(), 1);
    assert!(outcome.history()[0].generation_error.is_some());
    assert!(outcome.history()[0].execution.is_none());
}

#[tokio::test]
async fn test_model_error_shows_placeholder_plan() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::new(vec![Err(GenerationError::ApiError {
        status: 503,
        body: "overloaded".into(),
    })]);
    let presenter = ScriptedPresenter::new(&[false], &[], &[]);

    run(&model, &presenter, &dir, "Do something").await;

    assert_eq!(presenter.shown(), vec![Plan::generation_failed()]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_failure_collects_feedback_and_retries() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::replying(&[
        r#"{"plan": ["Install"], "commands": ["echo 'permission denied' >&2; exit 1", "touch later"]}"#,
        EMPTY_PLAN,
    ]);
    let presenter = ScriptedPresenter::new(&[true, false], &[], &["use a user-local prefix"]);

    let outcome = run(&model, &presenter, &dir, "Install the tool").await;

    assert_eq!(presenter.judgment_requests(), 0);
    assert_eq!(presenter.feedback_requests(), 1);
    assert!(!dir.path().join("later").exists());

    match &outcome.history()[0].execution {
        Some(ExecutionOutcome::CommandFailed(failure)) => {
            assert_eq!(failure.index, 0);
            assert_eq!(failure.exit_code, Some(1));
            assert_eq!(failure.stderr.as_deref(), Some("permission denied"));
        }
        other => panic!("expected command failure, got {:?}", other),
    }

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("Previous feedback"));
    assert!(prompts[1].starts_with("Previous feedback: use a user-local prefix\n"));
    assert_eq!(outcome.iterations(), 2);
}

#[tokio::test]
async fn test_missing_working_dir_fails_commands_instead_of_succeeding() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::replying(&[
        r#"{"plan": ["Check"], "commands": ["false"]}"#,
        EMPTY_PLAN,
    ]);
    let presenter = ScriptedPresenter::new(&[true, false], &[], &["wrong directory"]);
    let config = ExecConfig::new(dir.path().join("typo"))
        .with_platform(PlatformProfile::from_os("linux"));

    let outcome = TaskLoopController::new(&model, &presenter, config, quiet_logger())
        .run(Task::new("Run a check").unwrap())
        .await
        .unwrap();

    assert_eq!(presenter.judgment_requests(), 0);
    assert_eq!(presenter.feedback_requests(), 1);
    match &outcome.history()[0].execution {
        Some(ExecutionOutcome::CommandFailed(failure)) => {
            assert_eq!(failure.index, 0);
            assert!(failure.is_launch_error());
        }
        other => panic!("expected command failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_file_failure_sets_fixed_feedback_without_prompting() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("blocker"), "not a directory").unwrap();
    let model = ScriptedModel::replying(&[
        r#"{"plan": ["Write"], "commands": ["touch never"], "files": [{"path": "blocker/a.txt", "content": "x"}]}"#,
        EMPTY_PLAN,
    ]);
    let presenter = ScriptedPresenter::new(&[true, false], &[], &[]);

    let outcome = run(&model, &presenter, &dir, "Write a file").await;

    assert_eq!(presenter.feedback_requests(), 0);
    assert_eq!(presenter.judgment_requests(), 0);
    assert!(!dir.path().join("never").exists());
    assert!(matches!(
        outcome.history()[0].execution,
        Some(ExecutionOutcome::FileWriteFailed { index: 0, .. })
    ));

    let prompts = model.prompts();
    assert!(prompts[1].starts_with("Previous feedback: Failed to create required files\n"));
}

#[tokio::test]
async fn test_denied_judgment_loops_with_latest_feedback_only() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::replying(&[EMPTY_PLAN, EMPTY_PLAN, EMPTY_PLAN]);
    let presenter = ScriptedPresenter::new(
        &[true, true, true],
        &[false, false, true],
        &["first complaint", "second complaint"],
    );

    let outcome = run(&model, &presenter, &dir, "Do the thing").await;

    assert!(outcome.is_success());
    assert_eq!(outcome.iterations(), 3);

    let prompts = model.prompts();
    assert!(prompts[1].contains("first complaint"));
    assert!(prompts[2].contains("second complaint"));
    assert!(!prompts[2].contains("first complaint"));
}

#[tokio::test]
async fn test_closed_presenter_is_an_error() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::replying(&[EMPTY_PLAN]);
    let presenter = ScriptedPresenter::new(&[], &[], &[]);

    let result = TaskLoopController::new(&model, &presenter, exec_config(&dir), quiet_logger())
        .run(Task::new("anything").unwrap())
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_abort_before_generation_ends_as_interrupted() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::replying(&[EMPTY_PLAN]);
    let presenter = ScriptedPresenter::new(&[true], &[true], &[]);
    let controller =
        TaskLoopController::new(&model, &presenter, exec_config(&dir), quiet_logger());

    let handle = controller.abort_handle();
    assert!(!handle.request());
    assert!(handle.request());

    let outcome = controller.run(Task::new("anything").unwrap()).await.unwrap();

    assert_eq!(outcome.exit_code(), 130);
    assert!(model.prompts().is_empty());
    assert!(presenter.shown().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_abort_during_execution_waits_for_batch() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::replying(&[
        r#"{"plan": ["Wait"], "commands": ["sleep 0.5", "touch finished"]}"#,
    ]);
    let presenter = ScriptedPresenter::new(&[true], &[true], &[]);
    let controller =
        TaskLoopController::new(&model, &presenter, exec_config(&dir), quiet_logger());

    let handle = controller.abort_handle();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        handle.request();
    });

    let outcome = controller.run(Task::new("wait").unwrap()).await.unwrap();

    assert!(dir.path().join("finished").exists());
    assert_eq!(outcome.exit_code(), 130);
    assert_eq!(presenter.judgment_requests(), 0);
}

#[tokio::test]
async fn test_interactive_run_asks_again_for_blank_task() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::replying(&[EMPTY_PLAN]);
    let presenter =
        ScriptedPresenter::new(&[true], &[true], &[]).with_tasks(&["   ", "Say hello"]);

    let outcome = TaskLoopController::new(&model, &presenter, exec_config(&dir), quiet_logger())
        .run_interactive()
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert!(model.prompts()[0].contains("Say hello"));
}

#[tokio::test]
async fn test_events_are_written_to_log_file() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("logs").join("session.jsonl");
    let logger = Arc::new(Logger::with_file(LogFormat::Compact, &log_path).unwrap());
    let model = ScriptedModel::replying(&[
        r##"{"plan": ["Create"], "files": [{"path": "out/note.md", "content": "# note"}]}"##,
    ]);
    let presenter = ScriptedPresenter::new(&[true], &[true], &[]);

    TaskLoopController::new(&model, &presenter, exec_config(&dir), logger)
        .run(Task::new("Write a note").unwrap())
        .await
        .unwrap();

    let events: Vec<String> = std::fs::read_to_string(&log_path)
        .unwrap()
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.get("timestamp").is_some());
            value["event"].as_str().unwrap().to_string()
        })
        .collect();

    for expected in [
        "session_started",
        "generation_started",
        "generation_completed",
        "plan_approved",
        "file_written",
        "session_finished",
    ] {
        assert!(events.iter().any(|e| e == expected), "missing {}", expected);
    }
    assert_eq!(events.first().map(String::as_str), Some("session_started"));
    assert_eq!(events.last().map(String::as_str), Some("session_finished"));
}
