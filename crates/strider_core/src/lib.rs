//! Strider Core
//!
//! Foundational types shared by every Strider crate:
//!
//! - [`errors`]: the engine-wide error type and `Result` alias
//! - [`time`]: frame timing and fixed-step accumulation

pub mod errors;
pub mod time;

pub use errors::{Result, StriderError};
pub use time::FrameClock;
