// memflat-optimize: view flattening for memflat modules
//
// Architecture:
// - rewrite: pattern interface plus partial-conversion and greedy drivers
// - passes: the flattening pass built from rewrite patterns
// - pipeline: ordered pass runs with verification in between
// - utils: the module pass interface shared by all passes

pub mod error;
pub mod options;
pub mod passes;
pub mod pipeline;
pub mod rewrite;
pub mod utils;

// Re-export key types for convenience
pub use error::FlattenError;
pub use options::FlattenOptions;
pub use passes::*;
pub use pipeline::{PassManager, PassName, PipelineReport};
pub use utils::*;
