use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use taskpilot_exec::{CommandExecutor, ExecCallback, ExecConfig, ExecEvent, FileMaterializer};
use taskpilot_logging::{LogEvent, Logger};
use taskpilot_model::PlanModel;
use taskpilot_plan::{Feedback, Plan, PlanPrompts, Task};

use crate::{
    AbortReason, ExecutionOutcome, LoopError, LoopOutcome, LoopState, PlanningError, Presenter,
    PresenterError, SessionContext,
};

/// Shared abort flag, safe to trigger from a signal handler thread
#[derive(Clone)]
pub struct AbortHandle {
    requested: Arc<AtomicBool>,
    executing: Arc<AtomicBool>,
    wake: Arc<Notify>,
    logger: Arc<Logger>,
}

impl AbortHandle {
    fn new(logger: Arc<Logger>) -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            executing: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            logger,
        }
    }

    /// Ask the loop to stop. Returns `true` if an abort was already pending.
    ///
    /// While a batch is executing the request is only recorded; the loop
    /// stops once the batch finishes.
    pub fn request(&self) -> bool {
        if self.requested.swap(true, Ordering::SeqCst) {
            return true;
        }
        let during_execution = self.executing.load(Ordering::SeqCst);
        if during_execution {
            warn!("Abort requested while commands are running; stopping after the batch");
        }
        self.logger.log(&LogEvent::AbortRequested { during_execution });
        self.wake.notify_one();
        false
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

enum Step {
    Continue,
    Finish(AbortReason),
    Done,
}

/// Drives the generate / approve / execute / refine loop for one task
pub struct TaskLoopController<'a> {
    model: &'a dyn PlanModel,
    presenter: &'a dyn Presenter,
    exec_config: ExecConfig,
    logger: Arc<Logger>,
    abort: AbortHandle,
}

impl<'a> TaskLoopController<'a> {
    pub fn new(
        model: &'a dyn PlanModel,
        presenter: &'a dyn Presenter,
        exec_config: ExecConfig,
        logger: Arc<Logger>,
    ) -> Self {
        let abort = AbortHandle::new(logger.clone());
        Self {
            model,
            presenter,
            exec_config,
            logger,
            abort,
        }
    }

    /// Get a handle to request an abort (e.g., from a Ctrl+C handler)
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Ask the presenter for a task, then run the loop
    pub async fn run_interactive(&self) -> Result<LoopOutcome, LoopError> {
        let started = Instant::now();
        let task = loop {
            let text = match self.until_aborted(self.presenter.request_task()).await {
                None | Some(Err(PresenterError::Interrupted)) => {
                    return Ok(self.finish_without_session(started));
                }
                Some(result) => result?,
            };
            match Task::new(text) {
                Ok(task) => break task,
                Err(e) => warn!(error = %e, "Asking for the task again"),
            }
        };
        self.run(task).await
    }

    /// Run the loop for `task` until the user confirms success or aborts
    pub async fn run(&self, task: Task) -> Result<LoopOutcome, LoopError> {
        let mut ctx = SessionContext::new(task, self.exec_config.working_dir.clone());

        self.logger.log(&LogEvent::SessionStarted {
            task: ctx.task.to_string(),
            working_dir: ctx.working_dir.clone(),
            platform: self.exec_config.platform.os_name.clone(),
            model: self.model.name().to_string(),
        });

        let reason = loop {
            match self.run_iteration(&mut ctx).await? {
                Step::Continue => ctx.finish_iteration(),
                Step::Finish(reason) => break Some(reason),
                Step::Done => break None,
            }
        };

        let target = match reason {
            Some(_) => LoopState::AbortedByUser,
            None => LoopState::Succeeded,
        };
        self.enter(&mut ctx, target)?;

        let iterations = ctx.iterations_started();
        let duration = ctx.total_duration();
        let history = ctx.into_history();
        let outcome = match reason {
            Some(reason) => LoopOutcome::aborted(iterations, reason, history, duration),
            None => LoopOutcome::succeeded(iterations, history, duration),
        };

        self.logger.log(&LogEvent::SessionFinished {
            outcome: outcome.label().to_string(),
            iterations,
            duration_secs: duration.as_secs_f64(),
        });
        Ok(outcome)
    }

    async fn run_iteration(&self, ctx: &mut SessionContext) -> Result<Step, LoopError> {
        let iteration = ctx.iteration;

        self.enter(ctx, LoopState::Generating)?;
        let Some(plan) = self.generate_plan(ctx).await else {
            return Ok(Step::Finish(AbortReason::Interrupted));
        };

        self.enter(ctx, LoopState::AwaitingApproval)?;
        self.presenter.show_plan(&plan);
        let approved = match self.decide(self.presenter.request_approval(&plan)).await? {
            Some(approved) => approved,
            None => return Ok(Step::Finish(AbortReason::Interrupted)),
        };
        if !approved {
            self.logger.log(&LogEvent::PlanDeclined { iteration });
            return Ok(Step::Finish(AbortReason::Declined));
        }
        self.logger.log(&LogEvent::PlanApproved { iteration });
        if let Some(record) = ctx.record_mut() {
            record.approved = true;
        }

        let outcome = self.apply_plan(ctx, &plan).await?;
        let succeeded = outcome.success();
        let file_failed = matches!(outcome, ExecutionOutcome::FileWriteFailed { .. });
        if let Some(record) = ctx.record_mut() {
            record.execution = Some(outcome);
        }

        if self.abort.is_requested() {
            info!(iteration, "Stopping after the batch at user request");
            return Ok(Step::Finish(AbortReason::Interrupted));
        }

        if succeeded {
            self.enter(ctx, LoopState::AwaitingOutcomeJudgment)?;
            let judged = match self.decide(self.presenter.request_outcome_judgment()).await? {
                Some(judged) => judged,
                None => return Ok(Step::Finish(AbortReason::Interrupted)),
            };
            if let Some(record) = ctx.record_mut() {
                record.judged_success = Some(judged);
            }
            if judged {
                return Ok(Step::Done);
            }
        }

        self.enter(ctx, LoopState::AwaitingFeedback)?;
        let feedback = if file_failed {
            Feedback::file_creation_failed()
        } else {
            match self.decide(self.presenter.request_feedback()).await? {
                Some(text) => Feedback::new(text),
                None => return Ok(Step::Finish(AbortReason::Interrupted)),
            }
        };
        self.logger.log(&LogEvent::FeedbackRecorded {
            iteration,
            feedback: feedback.to_string(),
        });
        ctx.set_feedback(feedback);

        Ok(Step::Continue)
    }

    /// Request and parse a plan, substituting the placeholder plan on failure.
    /// Returns `None` if an abort arrived while waiting for the model.
    async fn generate_plan(&self, ctx: &mut SessionContext) -> Option<Plan> {
        let iteration = ctx.iteration;
        let prompt = PlanPrompts::build(&ctx.task, ctx.feedback(), &self.exec_config.platform);

        self.logger.log(&LogEvent::GenerationStarted {
            iteration,
            prompt_len: prompt.len(),
        });
        debug!(iteration, model = self.model.name(), "Requesting plan");

        let started = Instant::now();
        let response = self.until_aborted(self.model.generate(&prompt)).await?;
        let parsed = response
            .map_err(PlanningError::from)
            .and_then(|text| Plan::parse(&text).map_err(PlanningError::from));

        let (plan, error) = match parsed {
            Ok(plan) => (plan, None),
            Err(e) => {
                self.logger.log(&LogEvent::GenerationFailed {
                    iteration,
                    error: e.to_string(),
                });
                (Plan::generation_failed(), Some(e.to_string()))
            }
        };

        self.logger.log(&LogEvent::GenerationCompleted {
            iteration,
            plan: plan.short_description(),
            duration_secs: started.elapsed().as_secs_f64(),
        });
        ctx.begin_record(plan.clone(), error);
        Some(plan)
    }

    /// Write the plan's files, then run its commands
    async fn apply_plan(
        &self,
        ctx: &mut SessionContext,
        plan: &Plan,
    ) -> Result<ExecutionOutcome, LoopError> {
        let callback = self.exec_callback(ctx.iteration);

        self.abort.executing.store(true, Ordering::SeqCst);
        let result = self.apply_plan_inner(ctx, plan, callback).await;
        self.abort.executing.store(false, Ordering::SeqCst);
        result
    }

    async fn apply_plan_inner(
        &self,
        ctx: &mut SessionContext,
        plan: &Plan,
        callback: ExecCallback,
    ) -> Result<ExecutionOutcome, LoopError> {
        let iteration = ctx.iteration;

        self.enter(ctx, LoopState::Materializing)?;
        let materializer = FileMaterializer::new(&self.exec_config);
        if let Err(e) = materializer
            .materialize_with_callback(&plan.files, Some(callback.clone()))
            .await
        {
            self.logger.log(&LogEvent::FileWriteFailed {
                iteration,
                path: e.path.clone(),
                error: e.source.to_string(),
            });
            return Ok(ExecutionOutcome::FileWriteFailed {
                index: e.index,
                path: e.path,
                cause: e.source.to_string(),
            });
        }

        self.enter(ctx, LoopState::Executing)?;
        let executor = CommandExecutor::new(&self.exec_config);
        match executor
            .execute_with_callback(&plan.commands, Some(callback))
            .await
        {
            Ok(report) => {
                if let Some(ref tolerated) = report.tolerated_missing {
                    self.logger.log(&LogEvent::MissingExecutableTolerated {
                        iteration,
                        index: tolerated.index,
                        command: tolerated.command.clone(),
                        error: tolerated.error.clone(),
                    });
                }
                Ok(ExecutionOutcome::Succeeded {
                    commands_run: report.completed(),
                    tolerated_missing: report.tolerated_missing,
                })
            }
            Err(failure) => {
                self.logger.log(&LogEvent::CommandFailed {
                    iteration,
                    index: failure.index,
                    command: failure.command.clone(),
                    exit_code: failure.exit_code,
                    diagnostic: failure.diagnostic().map(str::to_string),
                });
                Ok(ExecutionOutcome::CommandFailed(failure))
            }
        }
    }

    /// Map execution progress onto log events
    fn exec_callback(&self, iteration: usize) -> ExecCallback {
        let logger = self.logger.clone();
        Arc::new(move |event: ExecEvent<'_>| match event {
            ExecEvent::FileWritten { path, bytes, .. } => logger.log(&LogEvent::FileWritten {
                iteration,
                path: path.to_path_buf(),
                bytes,
            }),
            ExecEvent::CommandStarted { index, command } => {
                logger.log(&LogEvent::CommandStarted {
                    iteration,
                    index,
                    command: command.to_string(),
                })
            }
            ExecEvent::OutputLine {
                index,
                stream,
                line,
            } => logger.log(&LogEvent::CommandOutputLine {
                iteration,
                index,
                stream,
                line: line.to_string(),
            }),
            // Failures are reported with their diagnostic once the batch returns
            ExecEvent::CommandFinished {
                index,
                exit_code: Some(0),
                duration,
            } => logger.log(&LogEvent::CommandSucceeded {
                iteration,
                index,
                duration_secs: duration.as_secs_f64(),
            }),
            ExecEvent::CommandFinished { .. } => {}
        })
    }

    /// Await a user decision. `None` means the loop should stop.
    async fn decide<T, F>(&self, prompt: F) -> Result<Option<T>, LoopError>
    where
        F: Future<Output = Result<T, PresenterError>>,
    {
        match self.until_aborted(prompt).await {
            None | Some(Err(PresenterError::Interrupted)) => Ok(None),
            Some(Err(e)) => Err(e.into()),
            Some(Ok(_)) if self.abort.is_requested() => Ok(None),
            Some(Ok(value)) => Ok(Some(value)),
        }
    }

    /// Race `fut` against an abort request
    async fn until_aborted<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.abort.is_requested() {
            return None;
        }
        tokio::select! {
            output = fut => Some(output),
            _ = self.abort.wake.notified() => None,
        }
    }

    /// Move to `next`, rejecting transitions the loop does not allow
    fn enter(&self, ctx: &mut SessionContext, next: LoopState) -> Result<(), LoopError> {
        let from = ctx.state();
        if !from.can_transition_to(next) {
            return Err(LoopError::InvalidTransition { from, to: next });
        }
        ctx.set_state(next);
        self.logger.log(&LogEvent::StateChanged {
            iteration: ctx.iteration,
            from: from.to_string(),
            to: next.to_string(),
        });
        Ok(())
    }

    fn finish_without_session(&self, started: Instant) -> LoopOutcome {
        let duration = started.elapsed();
        self.logger.log(&LogEvent::SessionFinished {
            outcome: "interrupted".to_string(),
            iterations: 0,
            duration_secs: duration.as_secs_f64(),
        });
        LoopOutcome::aborted(0, AbortReason::Interrupted, Vec::new(), duration)
    }
}
