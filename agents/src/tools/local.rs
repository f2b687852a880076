use crate::budget::IMAGE_CAPTION;
use crate::context::ToolContext;
use crate::tool::{Tool, parse_params, schema_of};
use amb_core::{CaptionRequest, ImageCaptioner};
use async_trait::async_trait;
use errors::ToolError;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

fn default_prompt() -> String {
    "An image of".to_string()
}

#[derive(Deserialize, JsonSchema)]
pub struct CaptionParams {
    /// URL or local path of the image. Defaults to the session's image.
    #[serde(default)]
    pub img_url: Option<String>,
    /// Conditioning prompt for the captioner.
    #[serde(default = "default_prompt")]
    pub prompt: String
}

/// Conditional image captioning, at most `max_captions` calls per session.
pub struct ImageCaptionTool {
    captioner: Arc<dyn ImageCaptioner>
}

impl ImageCaptionTool {
    pub fn new(captioner: Arc<dyn ImageCaptioner>) -> Self {
        Self { captioner }
    }
}

#[async_trait]
impl Tool for ImageCaptionTool {
    fn name(&self) -> &str {
        IMAGE_CAPTION
    }

    fn description(&self) -> &str {
        "Get the caption of an image uploaded by the user to understand the environment the user \
         is in. A prompt conditions the caption on specific details."
    }

    fn input_schema(&self) -> Value {
        schema_of::<CaptionParams>()
    }

    async fn call(&self, ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: CaptionParams = parse_params(params)?;
        let image_ref = p
            .img_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| ctx.image_ref.clone());

        if image_ref.trim() == crate::context::NO_IMAGE || image_ref.trim().is_empty() {
            return Ok("No image provided; no local context available.".to_string());
        }

        ctx.budget.reserve_caption()?;

        self.captioner
            .caption(&CaptionRequest {
                image_ref,
                prompt: p.prompt
            })
            .await
            .map_err(|e| ToolError::Backend {
                tool: IMAGE_CAPTION.to_string(),
                reason: e.to_string()
            })
    }
}
