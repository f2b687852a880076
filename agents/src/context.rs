use crate::budget::{BudgetLimits, CallBudget};
use crate::workspace::ArtifactWorkspace;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The image reference used when the caller supplied none.
pub const NO_IMAGE: &str = "no image provided";

/// Session-scoped state shared by every tool call of one session.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub image_ref: String,
    pub cancel: CancellationToken,
    pub budget: Arc<CallBudget>,
    pub workspace: Arc<ArtifactWorkspace>
}

impl ToolContext {
    pub fn new(
        session_id: impl Into<String>,
        image_ref: impl Into<String>,
        cancel: CancellationToken,
        limits: BudgetLimits,
        output_dir: impl AsRef<Path>,
        merged_file_name: &str
    ) -> Self {
        let session_id = session_id.into();
        let workspace = ArtifactWorkspace::new(output_dir, &session_id, merged_file_name);
        Self {
            session_id,
            image_ref: image_ref.into(),
            cancel,
            budget: Arc::new(CallBudget::new(limits)),
            workspace: Arc::new(workspace)
        }
    }

    pub fn has_image(&self) -> bool {
        let image = self.image_ref.trim();
        !image.is_empty() && image != NO_IMAGE
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
