//! Live wildlife monitoring: capture → detect → aggregate → stream.
//!
//! A single capture loop pulls frames, asks a detection engine for the
//! currently selected animal classes, folds the results into process-wide
//! session state (per-class history, overall timeline, read-and-clear status),
//! and streams annotated JPEG frames to a viewer.

pub mod aggregator;
pub mod alert;
pub mod annotate;
#[cfg(feature = "camera")]
pub mod camera;
pub mod capture;
pub mod classes;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod logging;
pub mod monitor;
pub mod pattern;
pub mod server;
pub mod session;
pub mod source;
pub mod stream;
#[cfg(feature = "onnx")]
pub mod yolo;

pub use error::{PipelineError, Result};
