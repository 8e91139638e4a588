// Utils - shared pass interface

pub mod optimize_pass;

pub use optimize_pass::*;
