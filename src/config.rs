//! Engine configuration.

/// Configuration for a concurrent sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of worker threads executing generation and read tasks.
    /// This is the admission-control budget: at most `workers` tasks run
    /// concurrently.
    pub workers: usize,

    /// How many streams may generate partitions concurrently. The baseline
    /// is 1 (next stream starts generating only after the current one
    /// finishes); raising it changes no other component.
    pub max_concurrent_generators: usize,

    /// Emit a debug log for every discovered partition slice.
    pub verbose_slice_logging: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            max_concurrent_generators: 1,
            verbose_slice_logging: false,
        }
    }
}

impl SyncConfig {
    /// Validate the configuration before a sync starts.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.workers == 0 {
            return Err(crate::error::SyncError::Config(
                "worker pool size must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_generators == 0 {
            return Err(crate::error::SyncError::Config(
                "max_concurrent_generators must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = SyncConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
