//! The contract every rip step fulfils.

use super::errors::StepResult;
use super::types::{Context, JobState, StepOutcome};

/// One stage of ripping a clip.
///
/// `Pipeline::run` calls `validate_input`, then `execute`, then
/// `validate_output` unless the step skipped itself. Any error fails the clip.
///
/// # Example
///
/// ```ignore
/// struct ChecksumStep;
///
/// impl PipelineStep for ChecksumStep {
///     fn name(&self) -> &str { "Checksum" }
///
///     fn validate_input(&self, ctx: &Context) -> StepResult<()> {
///         if !ctx.output_path.exists() {
///             return Err(StepError::invalid_input("Nothing to checksum"));
///         }
///         Ok(())
///     }
///
///     fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
///         // Hash the output...
///         Ok(StepOutcome::Success)
///     }
///
///     fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait PipelineStep: Send + Sync {
    /// Short name used in phase headers and `PipelineError::StepFailed`.
    fn name(&self) -> &str;

    /// Preconditions, checked before anything runs.
    fn validate_input(&self, ctx: &Context) -> StepResult<()>;

    /// Do the work and record what it produced in `state`.
    ///
    /// `StepOutcome::Skipped` is not a failure.
    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    /// Postconditions on `state` and the files the step wrote.
    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Whether the job is complete without this step.
    ///
    /// Skipping a required step is logged as a warning.
    fn is_optional(&self) -> bool {
        false
    }

    /// One-line summary, logged at debug level.
    fn description(&self) -> &str {
        self.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStep {
        name: &'static str,
    }

    impl PipelineStep for MockStep {
        fn name(&self) -> &str {
            self.name
        }

        fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &Context, _state: &mut JobState) -> StepResult<StepOutcome> {
            Ok(StepOutcome::Skipped("Test skip".to_string()))
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            Ok(())
        }
    }

    #[test]
    fn step_trait_object_works() {
        let step: Box<dyn PipelineStep> = Box::new(MockStep { name: "TestStep" });

        assert_eq!(step.name(), "TestStep");
        assert_eq!(step.description(), "TestStep");
        assert!(!step.is_optional());
    }
}
