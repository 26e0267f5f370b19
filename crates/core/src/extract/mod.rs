//! Entity extractors run over a model answer.
//!
//! Each extractor is stateless and independent of the others; duplicates
//! across extractors are left for callers to resolve.

pub mod dimensions;
pub mod lexer;
pub mod metadata;
pub mod part_numbers;
pub mod tables;

pub use dimensions::{dedup_dimensions, extract_dimensions, Dimension, DimensionType};
pub use metadata::{extract_metadata, DrawingMetadata};
pub use part_numbers::{extract_part_numbers, PartNumber, PartNumberOptions};
pub use tables::{extract_tables, ExtractedTable, TableRow, TableType};
