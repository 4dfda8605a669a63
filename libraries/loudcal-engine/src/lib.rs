//! Loudness compensation engine for LoudCal
//!
//! This crate provides:
//! - The calibration profile (target/reference phon, max SPL, offsets)
//! - Gain computation: preamp interpolation, FIR compensation, attenuation
//! - FIR filter selection and gain-script generation
//! - Debounced, mute-protected emission of DSP configuration
//! - Safe volume for alarm/ring/notification streams
//! - A two-step calibration wizard with a pink-noise test tone
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌────────────────────┐
//! │  Setters /   │ ──► │ LoudnessController │ ──► │ CalibrationProfile │ (persisted)
//! │  Wizard      │     └────────────────────┘     └────────────────────┘
//! └──────────────┘               │ debounce 50 ms
//!                                ▼
//!                      ┌──────────────────┐     ┌───────────────┐
//!                      │ MuteCoordinator  │ ──► │ ConfigEmitter │ ──► script + prefs + bus
//!                      └──────────────────┘     └───────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use loudcal_engine::{compute_gain, CalibrationProfile};
//!
//! let profile = CalibrationProfile::default();
//! let gain = compute_gain(&profile);
//! assert!(gain.total_gain_db < 0.0);
//! ```

#![forbid(unsafe_code)]

pub mod calibration;
pub mod config;
pub mod controller;
pub mod emitter;
pub mod error;
pub mod gain;
pub mod interpolation;
pub mod mute;
pub mod pink_noise;
pub mod preamp;
pub mod profile;
pub mod safe_volume;
pub mod safety;
pub mod scheduler;
pub mod script;
pub mod tone;

pub use calibration::{CalibrationStep, CalibrationWizard};
pub use config::EngineConfig;
pub use controller::{CalibrationOverride, EngineContext, FilterStatus, LoudnessController};
pub use emitter::{ConfigEmitter, Emission};
pub use error::{EngineError, Result};
pub use gain::{compute_gain, select_filter, FilterSelection, GainBreakdown};
pub use profile::{CalibrationProfile, ProfileSlot};
pub use safe_volume::{SafeVolumeCoordinator, StreamVolumeInfo};
pub use safety::SafetyLevel;
pub use script::GainScript;
pub use tone::{SinkFactory, TestTonePlayer};
