//! # Opustuck Pipeline
//!
//! The transcode coordinator for the opustuck engine.
//!
//! This crate wires the engine's components into the complete pipeline and
//! runs it on a background worker thread:
//!
//! ```text
//! ┌────────┐   ┌───────────┐   ┌───────────┐   ┌────────┐   ┌────────┐   ┌───────┐
//! │ Decode │──▶│ Normalize │──▶│ Transform │──▶│ Declip │──▶│ Encode │──▶│ Write │
//! └────────┘   └───────────┘   └───────────┘   └────────┘   └───┬────┘   └───────┘
//!                 (optional)                     (optional)     │   ▲
//!                                                               ▼   │
//!                                                  decode ─▶ detect ─▶ re-tuck
//!                                                    (iterative de-clip loop)
//! ```
//!
//! In iterative mode the encoded stream is decoded back, clipping the codec
//! introduced is merged into the source's half-wave records, and a freshly
//! tucked copy of the source is encoded again until the output stays clean
//! or the pass cap is hit.
//!
//! # Key components
//!
//! - [`Transcoder`] - the coordinator with its worker thread
//! - [`TranscodeConfig`] / [`OutputLayout`] - per-run options
//! - [`StatusBoard`] / [`Outcome`] - the status triple observers read
//!
//! # Usage
//!
//! ```ignore
//! use opustuck_pipeline::{Transcoder, TranscodeConfig, OutputLayout};
//!
//! let mut transcoder = Transcoder::new(loader, encoder_factory,
//!     TranscodeConfig::default()
//!         .with_declip(true)
//!         .with_iterative_declip(true));
//!
//! transcoder.transcode("movie.mka".into(), "movie.opus".into())?;
//! while transcoder.outcome().is_none() {
//!     transcoder.wait_for_change(std::time::Duration::from_millis(250));
//!     println!("{} ({:.0}%)",
//!         transcoder.current_step_message(),
//!         transcoder.current_step_progress() * 100.0);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod status;
pub mod transcoder;
pub mod writer;

pub use config::{OutputLayout, TranscodeConfig};
pub use error::{Result, TranscodeError};
pub use status::{Outcome, StatusBoard, INDETERMINATE};
pub use transcoder::{Transcoder, MAX_DECLIP_PASSES};
pub use writer::{write_blob, WRITE_CHUNK_BYTES};
