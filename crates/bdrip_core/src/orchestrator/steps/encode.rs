//! Encode step - runs the user transform and streams its frames into the encoder.

use std::sync::Arc;

use crate::config::EncoderSettings;
use crate::encode::{EncodeParams, Encoder};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};
use crate::transform::{TransformContext, VideoTransform};

/// File name of the encoded elementary stream inside the work directory.
pub const ENCODED_FILE_NAME: &str = "out.hevc";

/// Encode step for transform + encoder.
pub struct EncodeStep {
    transform: Arc<dyn VideoTransform>,
    encoder: Encoder,
    settings: EncoderSettings,
}

impl EncodeStep {
    pub fn new(
        transform: Arc<dyn VideoTransform>,
        encoder: Encoder,
        settings: EncoderSettings,
    ) -> Self {
        Self {
            transform,
            encoder,
            settings,
        }
    }
}

impl PipelineStep for EncodeStep {
    fn name(&self) -> &str {
        "Encode"
    }

    fn description(&self) -> &str {
        "Transform the source and encode the video stream"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if !ctx.work_dir.is_dir() {
            return Err(StepError::invalid_input(format!(
                "Work directory missing: {}",
                ctx.work_dir.display()
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let transform_ctx = TransformContext {
            clip_id: ctx.job_name.clone(),
            work_dir: ctx.work_dir.clone(),
            threads: self.settings.frameserver_threads,
        };

        ctx.logger.section(&format!("Transform: {}", self.transform.name()));
        let output = self.transform.transform(&ctx.source_path, &transform_ctx)?;
        ctx.logger
            .info(&format!("Stream: {}", output.metadata.summary()));

        let params = EncodeParams::from_metadata(
            &output.metadata,
            &self.settings,
            ctx.work_dir.join(ENCODED_FILE_NAME),
        )?;
        ctx.logger
            .log_options_pretty(&self.encoder.command().name(), &params.args());

        ctx.logger.section("Encoding");
        let encoded = self.encoder.encode(&params, output.frames, &ctx.logger)?;
        ctx.logger.info(&format!(
            "Encoded {} frame(s) to {}",
            encoded.frames_written,
            encoded.path.display()
        ));

        state.encode = Some(encoded);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        let encode = state
            .encode
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Encode results not recorded"))?;

        if !encode.path.exists() {
            return Err(StepError::invalid_output(format!(
                "Encoded stream not created: {}",
                encode.path.display()
            )));
        }
        ctx.logger.validation(&format!(
            "{} frame(s) in {}",
            encode.frames_written,
            encode.path.display()
        ));
        Ok(())
    }
}
