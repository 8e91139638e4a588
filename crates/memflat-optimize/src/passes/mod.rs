// Passes - module passes built on the rewrite drivers

pub mod flatten;

pub use flatten::FlattenMemRefPass;
