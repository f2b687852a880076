pub mod generation;
pub mod global;
pub mod local;
pub mod memory;
pub mod reinforcement;

pub use generation::{GenerateMusicTool, OverlayAudioTool, generation_tools};
pub use global::{CurrentTimeTool, WebSearchTool};
pub use local::ImageCaptionTool;
pub use memory::{ADD_MUSIC_GENERATION_MEMORY, memory_tools};
pub use reinforcement::{GET_RECOMMENDATION_WEIGHTS, LEARN_FROM_INTERACTION, reinforcement_tools};
