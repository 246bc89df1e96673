//! Mux step - merges the encoded video, the source's other tracks and chapters.

use crate::mux::{MkvmergeOptionsBuilder, Muxer};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

/// Mux step for merging tracks with mkvmerge.
pub struct MuxStep {
    muxer: Muxer,
}

impl MuxStep {
    pub fn new(muxer: Muxer) -> Self {
        Self { muxer }
    }
}

impl PipelineStep for MuxStep {
    fn name(&self) -> &str {
        "Mux"
    }

    fn description(&self) -> &str {
        "Merge tracks into output file with mkvmerge"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if let Some(chapters) = ctx.chapters() {
            if !chapters.is_file() {
                return Err(StepError::invalid_input(format!(
                    "Chapter file missing: {}",
                    chapters.display()
                )));
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let encoded = state
            .encode
            .as_ref()
            .ok_or_else(|| StepError::invalid_input("No encoded stream to merge"))?;

        match ctx.chapters() {
            Some(path) => ctx.logger.info(&format!("Chapters: {}", path.display())),
            None => ctx.logger.info("Chapters: none for this clip"),
        }
        ctx.logger
            .info(&format!("Output: {}", ctx.output_path.display()));

        let tokens = MkvmergeOptionsBuilder::new(&ctx.output_path, &encoded.path, &ctx.source_path)
            .with_chapters(ctx.chapters())
            .build();

        ctx.logger.section("Executing mkvmerge");
        let output = self.muxer.mux(&tokens, &ctx.output_path, &ctx.logger)?;

        ctx.logger.success(&format!(
            "Merged to: {}",
            output
                .output_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
        ));
        state.mux = Some(output);

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        let mux = state
            .mux
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Mux results not recorded"))?;

        if !mux.output_path.exists() {
            return Err(StepError::invalid_output(format!(
                "Output file not created: {}",
                mux.output_path.display()
            )));
        }
        ctx.logger
            .validation(&format!("Output present: {}", mux.output_path.display()));

        Ok(())
    }
}
