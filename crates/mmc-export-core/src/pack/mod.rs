//! Pack input and output: manifest reading, intermediate model building,
//! config overlay, and format writers.

mod builder;
mod manifest;
mod mrpack;
mod overlay;
mod writer;

pub use builder::{build_intermediate, validate_metadata};
pub use manifest::{ManifestReader, MultiMcReader};
pub use mrpack::ModrinthWriter;
pub use overlay::{ConfigOverlay, ResourceOverride};
pub use writer::{writer_for, FormatWriter, IntermediateWriter};
