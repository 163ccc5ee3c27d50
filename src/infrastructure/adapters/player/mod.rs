//! Player Adapter - 播放元素实现

mod probe;
mod timeline_player;

pub use probe::probe_duration;
pub use timeline_player::{TimelineElement, TimelinePlayer};
