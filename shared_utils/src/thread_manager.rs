//! Concurrency limits
//!
//! Two independent limits drive the batch: CPU-bound conversion work and
//! I/O-bound copy/stat work. Both are plain values handed to each stage;
//! nothing here is process-global.

/// Default number of concurrent filesystem operations.
pub const DEFAULT_IO_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimits {
    /// External converter / minifier workers
    pub cpu: usize,
    /// Copy, stat, rename and header-patch workers
    pub io: usize,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            cpu: num_cpus::get().max(1),
            io: DEFAULT_IO_LIMIT,
        }
    }
}

impl ConcurrencyLimits {
    /// Build limits from optional overrides, falling back to the detected defaults.
    /// A zero override is treated as 1.
    pub fn with_overrides(cpu: Option<usize>, io: Option<usize>) -> Self {
        let defaults = Self::default();
        Self {
            cpu: cpu.unwrap_or(defaults.cpu).max(1),
            io: io.unwrap_or(defaults.io).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_positive() {
        let limits = ConcurrencyLimits::default();
        assert!(limits.cpu >= 1);
        assert_eq!(limits.io, DEFAULT_IO_LIMIT);
    }

    #[test]
    fn test_overrides_clamp_zero() {
        let limits = ConcurrencyLimits::with_overrides(Some(0), Some(0));
        assert_eq!(limits.cpu, 1);
        assert_eq!(limits.io, 1);
    }

    #[test]
    fn test_partial_override() {
        let limits = ConcurrencyLimits::with_overrides(Some(3), None);
        assert_eq!(limits.cpu, 3);
        assert_eq!(limits.io, DEFAULT_IO_LIMIT);
    }
}
