//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod player;
pub mod synthesis;

pub use player::*;
pub use synthesis::*;
