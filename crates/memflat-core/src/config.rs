use std::sync::OnceLock;

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<usize>().ok())
}

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Iteration cap for greedy rewrite drivers, `MEMFLAT_MAX_ITERATIONS` overrides it.
pub fn max_iterations() -> usize {
    static MAX: OnceLock<usize> = OnceLock::new();
    *MAX.get_or_init(|| {
        env_usize("MEMFLAT_MAX_ITERATIONS")
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_ITERATIONS)
    })
}

/// Whether constant byte offsets are checked against the element width before
/// folding. Off unless `MEMFLAT_VERIFY_OFFSET_DIVISIBILITY` is set.
pub fn verify_offset_divisibility() -> bool {
    static VERIFY: OnceLock<bool> = OnceLock::new();
    *VERIFY.get_or_init(|| env_true("MEMFLAT_VERIFY_OFFSET_DIVISIBILITY").unwrap_or(false))
}
