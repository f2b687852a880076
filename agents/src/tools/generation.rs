//! Generation-agent tools. Both are guarded by the session's call budget.

use crate::budget::{GENERATE_MUSIC, OVERLAY_AUDIO};
use crate::context::ToolContext;
use crate::tool::{Tool, parse_params, schema_of};
use crate::workspace::ArtifactWorkspace;
use amb_core::{AudioBackend, TrackRequest};
use async_trait::async_trait;
use errors::ToolError;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

fn default_file_name() -> String {
    "output".to_string()
}

#[derive(Deserialize, JsonSchema)]
pub struct GenerateParams {
    /// What the layer should sound like. One instrument or sound.
    pub prompt: String,
    /// Length in seconds; values above the cap are clamped.
    #[serde(default)]
    pub duration: Option<u32>,
    /// Output file name; `.wav` is appended when missing.
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Whether this layer carries the rhythmic beat.
    #[serde(default)]
    pub has_beat: bool
}

pub struct GenerateMusicTool {
    backend: Arc<dyn AudioBackend>,
    max_seconds: u32,
    default_seconds: u32
}

impl GenerateMusicTool {
    pub fn new(backend: Arc<dyn AudioBackend>, max_seconds: u32, default_seconds: u32) -> Self {
        Self {
            backend,
            max_seconds,
            default_seconds: default_seconds.min(max_seconds)
        }
    }
}

#[async_trait]
impl Tool for GenerateMusicTool {
    fn name(&self) -> &str {
        GENERATE_MUSIC
    }

    fn description(&self) -> &str {
        "Generate one audio layer. At most 4 per session, one instrument each, at most one with a beat."
    }

    fn input_schema(&self) -> Value {
        schema_of::<GenerateParams>()
    }

    async fn call(&self, ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: GenerateParams = parse_params(params)?;
        if p.prompt.trim().is_empty() {
            return Err(ToolError::invalid_input("prompt", "must not be empty"));
        }
        let file_name = ArtifactWorkspace::track_file_name(&p.file_name)?;
        let duration = p.duration.unwrap_or(self.default_seconds).min(self.max_seconds).max(1);

        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        ctx.budget.reserve_track(p.has_beat)?;

        let request = TrackRequest {
            prompt: p.prompt.clone(),
            duration_secs: duration,
            has_beat: p.has_beat
        };
        let audio = self
            .backend
            .generate(&request)
            .await
            .map_err(|e| ToolError::Artifact {
                tool: GENERATE_MUSIC.to_string(),
                reason: e.to_string()
            })?;

        // A cancel that lands during generation must not leave a new file.
        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        ctx.workspace.write_track(&file_name, &audio).await?;
        debug!(session_id = %ctx.session_id, file = %file_name, duration, "track generated");

        Ok(format!(
            "prompt: {}, duration: {duration}, generated music: {file_name}",
            p.prompt
        ))
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct OverlayParams {
    /// Track file names to merge, as returned by generate_music.
    pub file_names: Vec<String>
}

pub struct OverlayAudioTool {
    backend: Arc<dyn AudioBackend>
}

impl OverlayAudioTool {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for OverlayAudioTool {
    fn name(&self) -> &str {
        OVERLAY_AUDIO
    }

    fn description(&self) -> &str {
        "Merge the generated tracks into one soundscape. Use exactly once, after all tracks."
    }

    fn input_schema(&self) -> Value {
        schema_of::<OverlayParams>()
    }

    async fn call(&self, ctx: &ToolContext, params: Value) -> Result<String, ToolError> {
        let p: OverlayParams = parse_params(params)?;
        if p.file_names.is_empty() {
            return Err(ToolError::invalid_input("file_names", "must name at least one track"));
        }
        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        ctx.workspace.ensure_covers(&p.file_names)?;
        ctx.budget.reserve_merge()?;
        let inputs = ctx.workspace.read_inputs(&p.file_names).await?;

        let mixed = self
            .backend
            .mix(&inputs)
            .await
            .map_err(|e| ToolError::Artifact {
                tool: OVERLAY_AUDIO.to_string(),
                reason: e.to_string()
            })?;

        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        let merged = ctx.workspace.write_merged(&mixed).await?;
        info!(session_id = %ctx.session_id, tracks = inputs.len(), path = %merged.display(), "tracks merged");
        Ok(merged.display().to_string())
    }
}

pub fn generation_tools(
    backend: Arc<dyn AudioBackend>,
    max_seconds: u32,
    default_seconds: u32
) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(GenerateMusicTool::new(backend.clone(), max_seconds, default_seconds)),
        Arc::new(OverlayAudioTool::new(backend))
    ]
}
