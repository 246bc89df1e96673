//! Probe step - lists the source's elementary streams.
//!
//! Informational: a prober failure only skips the step. A missing source
//! fails the job.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};
use crate::probe::{ProbeError, StreamProbe};

/// Probe step running the configured prober.
pub struct ProbeStep {
    probe: StreamProbe,
}

impl ProbeStep {
    pub fn new(probe: StreamProbe) -> Self {
        Self { probe }
    }
}

impl PipelineStep for ProbeStep {
    fn name(&self) -> &str {
        "Probe"
    }

    fn description(&self) -> &str {
        "List source streams with the prober"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if !ctx.source_path.exists() {
            return Err(StepError::from(ProbeError::SourceMissing(
                ctx.source_path.clone(),
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let tool = self.probe.command();
        ctx.logger.command(
            &tool.display_with(&StreamProbe::args(&ctx.source_path)),
        );

        match self.probe.probe(&ctx.source_path) {
            Ok(streams) => {
                ctx.logger.info(&format!("Found {} stream(s)", streams.len()));
                for stream in &streams {
                    ctx.logger.info(&format!("  {}", stream.summary()));
                }
                state.streams = Some(streams);
                Ok(StepOutcome::Success)
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                ctx.logger.warn(&format!("Stream probe failed: {}", e));
                Ok(StepOutcome::Skipped(e.to_string()))
            }
        }
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if !state.has_streams() {
            return Err(StepError::invalid_output("Stream list not recorded"));
        }
        Ok(())
    }

    fn is_optional(&self) -> bool {
        true
    }
}
