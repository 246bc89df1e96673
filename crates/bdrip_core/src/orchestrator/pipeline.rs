//! Sequential step runner for one clip.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::errors::{PipelineError, PipelineResult, StepError};
use super::step::PipelineStep;
use super::types::{Context, JobState, StepOutcome};

/// Ordered steps run against one `Context`.
///
/// The first failing step ends the run. Cancellation is honoured between
/// steps, never inside one.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
    cancel: CancelHandle,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            cancel: CancelHandle::new(),
        }
    }

    /// Append a step.
    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Append a step (builder form).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Use `handle` instead of a private flag, so a batch can stop its clips.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run every step in order.
    ///
    /// For each step: cancellation check, `validate_input`, `execute`, and
    /// `validate_output` when the step did not skip itself.
    pub fn run(&self, ctx: &Context, state: &mut JobState) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult::default();

        for step in &self.steps {
            let name = step.name();
            if self.is_cancelled() {
                ctx.logger.warn(&format!("Cancelled before '{}' started", name));
                return Err(PipelineError::cancelled(&ctx.job_name));
            }

            ctx.logger.phase(name);
            ctx.logger.debug(step.description());

            match run_step(step.as_ref(), ctx, state) {
                Ok(StepOutcome::Success) => {
                    ctx.logger.success(&format!("{} completed", name));
                    result.steps_completed.push(name.to_string());
                }
                Ok(StepOutcome::Skipped(reason)) => {
                    let message = format!("{} skipped: {}", name, reason);
                    if step.is_optional() {
                        ctx.logger.info(&message);
                    } else {
                        ctx.logger.warn(&message);
                    }
                    result.steps_skipped.push(name.to_string());
                }
                Err((stage, e)) => {
                    ctx.logger.error(&format!("{} failed: {}", stage, e));
                    return Err(PipelineError::step_failed(&ctx.job_name, name, e));
                }
            }
        }

        ctx.logger.success(&format!(
            "All steps done ({} completed, {} skipped)",
            result.steps_completed.len(),
            result.steps_skipped.len()
        ));
        Ok(result)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Step names in run order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate, execute and check one step, tagging a failure with its stage.
fn run_step(
    step: &dyn PipelineStep,
    ctx: &Context,
    state: &mut JobState,
) -> Result<StepOutcome, (&'static str, StepError)> {
    step.validate_input(ctx).map_err(|e| ("Input validation", e))?;
    let outcome = step.execute(ctx, state).map_err(|e| ("Execution", e))?;
    if outcome == StepOutcome::Success {
        step.validate_output(ctx, state)
            .map_err(|e| ("Output validation", e))?;
    }
    Ok(outcome)
}

/// Shared stop flag for a pipeline or a whole batch.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask running work to stop at its next boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Which steps ran and which skipped themselves.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunResult {
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
}

impl PipelineRunResult {
    /// No step skipped itself.
    pub fn all_completed(&self) -> bool {
        self.steps_skipped.is_empty()
    }

    pub fn total_steps(&self) -> usize {
        self.steps_completed.len() + self.steps_skipped.len()
    }
}
