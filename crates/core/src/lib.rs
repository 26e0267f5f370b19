//! Drawlens domain core.
//!
//! Pure, synchronous building blocks shared by the pipeline and the HTTP
//! server: identifiers and errors, coordinate handling, grounding and entity
//! parsing of model output, label classification, and prompt construction.

pub mod clock;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod grounding;
pub mod labels;
pub mod prompt;
pub mod types;
