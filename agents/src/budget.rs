//! Per-session call budgets.
//!
//! Every guarded tool reserves its slot here before touching a backend. The
//! counters only ever grow, so a reservation is never returned even if the
//! backend call later fails: the ceiling is on calls issued, not on calls
//! that succeeded.

use errors::ToolError;
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

pub const GENERATE_MUSIC: &str = "generate_music";
pub const OVERLAY_AUDIO: &str = "overlay_audio_files";
pub const IMAGE_CAPTION: &str = "get_image_caption";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetLimits {
    pub max_tracks: u32,
    pub max_merges: u32,
    pub max_captions: u32,
    pub max_beat_tracks: u32
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_tracks: 4,
            max_merges: 1,
            max_captions: 3,
            max_beat_tracks: 1
        }
    }
}

impl BudgetLimits {
    pub fn from_config(generation: &config::GenerationConfig, agents: &config::AgentConfig) -> Self {
        Self {
            max_tracks: generation.max_tracks,
            max_captions: agents.max_captions,
            ..Self::default()
        }
    }
}

/// Snapshot of what a session has used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BudgetUsage {
    pub tracks: u32,
    pub beat_tracks: u32,
    pub merges: u32,
    pub captions: u32
}

#[derive(Debug)]
pub struct CallBudget {
    limits: BudgetLimits,
    usage: Mutex<BudgetUsage>
}

impl CallBudget {
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            limits,
            usage: Mutex::new(BudgetUsage::default())
        }
    }

    pub fn limits(&self) -> BudgetLimits {
        self.limits
    }

    pub fn usage(&self) -> BudgetUsage {
        *self.usage.lock()
    }

    /// Claims one track slot. Rejected once the track ceiling is reached,
    /// when a second beat layer is requested, or after the merge.
    pub fn reserve_track(&self, has_beat: bool) -> Result<(), ToolError> {
        let mut usage = self.usage.lock();
        if usage.merges > 0 {
            return Err(reject(
                GENERATE_MUSIC,
                self.limits.max_tracks,
                "tracks cannot be generated after the merge"
            ));
        }
        if usage.tracks >= self.limits.max_tracks {
            return Err(reject(
                GENERATE_MUSIC,
                self.limits.max_tracks,
                "track budget spent"
            ));
        }
        if has_beat && usage.beat_tracks >= self.limits.max_beat_tracks {
            return Err(reject(
                GENERATE_MUSIC,
                self.limits.max_beat_tracks,
                "only one track may carry a beat"
            ));
        }
        usage.tracks += 1;
        if has_beat {
            usage.beat_tracks += 1;
        }
        Ok(())
    }

    /// Claims the merge slot. Requires at least one issued track.
    pub fn reserve_merge(&self) -> Result<(), ToolError> {
        let mut usage = self.usage.lock();
        if usage.tracks == 0 {
            return Err(reject(
                OVERLAY_AUDIO,
                self.limits.max_merges,
                "no tracks have been generated"
            ));
        }
        if usage.merges >= self.limits.max_merges {
            return Err(reject(
                OVERLAY_AUDIO,
                self.limits.max_merges,
                "merge already issued"
            ));
        }
        usage.merges += 1;
        Ok(())
    }

    pub fn reserve_caption(&self) -> Result<(), ToolError> {
        let mut usage = self.usage.lock();
        if usage.captions >= self.limits.max_captions {
            return Err(reject(
                IMAGE_CAPTION,
                self.limits.max_captions,
                "caption budget spent"
            ));
        }
        usage.captions += 1;
        Ok(())
    }
}

fn reject(tool: &str, limit: u32, reason: &str) -> ToolError {
    warn!(tool, limit, reason, "tool call rejected by budget guard");
    counter!("agent_budget_rejections_total", "tool" => tool.to_string()).increment(1);
    ToolError::BudgetExceeded {
        tool: tool.to_string(),
        limit,
        reason: reason.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifth_track_is_rejected() {
        let budget = CallBudget::new(BudgetLimits::default());
        for _ in 0..4 {
            budget.reserve_track(false).unwrap();
        }
        let err = budget.reserve_track(false).unwrap_err();
        assert!(matches!(err, ToolError::BudgetExceeded { limit: 4, .. }));
        assert_eq!(budget.usage().tracks, 4);
    }

    #[test]
    fn test_single_beat_layer() {
        let budget = CallBudget::new(BudgetLimits::default());
        budget.reserve_track(true).unwrap();
        assert!(budget.reserve_track(true).is_err());
        budget.reserve_track(false).unwrap();
        assert_eq!(budget.usage().beat_tracks, 1);
        assert_eq!(budget.usage().tracks, 2);
    }

    #[test]
    fn test_merge_ordering() {
        let budget = CallBudget::new(BudgetLimits::default());
        assert!(budget.reserve_merge().is_err());

        budget.reserve_track(false).unwrap();
        budget.reserve_merge().unwrap();
        assert!(budget.reserve_merge().is_err());
        assert!(budget.reserve_track(false).is_err());
    }

    #[test]
    fn test_fourth_caption_is_rejected() {
        let budget = CallBudget::new(BudgetLimits::default());
        for _ in 0..3 {
            budget.reserve_caption().unwrap();
        }
        assert!(budget.reserve_caption().unwrap_err().is_fatal());
    }
}
