//! Room-agnostic building blocks for musicroom: configuration, typed ids,
//! and the playback clock that drives track progression.

mod config;
mod playback;
mod util;

pub use config::*;
pub use playback::*;
pub use util::*;
