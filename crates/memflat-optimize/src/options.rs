use memflat_core::config;
use memflat_core::error::Result;
use serde::{Deserialize, Serialize};

/// Knobs of the flattening pass.
///
/// Missing fields fall back to [`FlattenOptions::default`], which itself honours
/// the `MEMFLAT_*` environment switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenOptions {
    /// Upper bound on sweeps of each greedy phase.
    pub max_iterations: usize,
    /// Decline folding when a constant byte offset is not a multiple of the
    /// element width.
    pub verify_offset_divisibility: bool,
    /// Let greedy phases erase side-effect-free ops whose results are unused.
    pub erase_dead_ops: bool,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            max_iterations: config::max_iterations(),
            verify_offset_divisibility: config::verify_offset_divisibility(),
            erase_dead_ops: true,
        }
    }
}

impl FlattenOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: FlattenOptions = serde_json::from_str(json)?;
        crate::opt_ensure!(
            options.max_iterations > 0,
            "max_iterations must be at least 1",
            code = "memflat::invalid-options"
        );
        Ok(options)
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_offset_divisibility_check(mut self, enabled: bool) -> Self {
        self.verify_offset_divisibility = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_missing_fields_from_defaults() {
        let options =
            FlattenOptions::from_json_str(r#"{ "verify_offset_divisibility": true }"#).expect("valid json");
        assert!(options.verify_offset_divisibility);
        assert!(options.erase_dead_ops);
        assert_eq!(options.max_iterations, FlattenOptions::default().max_iterations);
    }

    #[test]
    fn zero_iterations_are_rejected() {
        assert!(FlattenOptions::from_json_str(r#"{ "max_iterations": 0 }"#).is_err());
        assert!(FlattenOptions::from_json_str("not json").is_err());
    }
}
