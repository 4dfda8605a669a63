//! Text config file for LoudCal
//!
//! A line-oriented config file lets power users drive the DSP modules from a
//! text editor:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ JamesDSP.conf│ ──► │ parse_line   │ ──► │ ConfigApplier │ ──► prefs + one update
//! └──────────────┘     └──────────────┘     └───────────────┘
//!        ▲                                          │
//!   notify watcher                        LoudnessTarget (controller)
//! ```
//!
//! # Example
//!
//! ```
//! use loudcal_config::protocol::{parse_line, Directive, LoudnessDirective};
//!
//! assert_eq!(
//!     parse_line("Loudness.volume=60"),
//!     Some(Directive::Loudness(LoudnessDirective::Volume(60.0)))
//! );
//! ```

#![forbid(unsafe_code)]

pub mod apply;
pub mod error;
pub mod protocol;
pub mod watcher;

pub use apply::{ConfigApplier, LoudnessTarget};
pub use error::{ConfigError, Result};
pub use protocol::{parse_line, Directive, LoudnessDirective};
pub use watcher::{ConfigFileWatcher, SharedLoudness, WatcherConfig, WatcherHandle};
