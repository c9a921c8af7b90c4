pub mod controls;
pub mod registry;
pub mod render;

pub use self::controls::{
    ControlOutcome, JumpOutcome, MuteOutcome, activate_control, jump_to_sources, mute_overlay,
};
pub use self::registry::{MuteAllSummary, OverlayRegistry};
pub use self::render::{AnnotationRenderer, RenderSummary, SkippedFinding};
