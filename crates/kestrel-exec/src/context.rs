//! Per-operator execution context.

use std::sync::Arc;

use kestrel_common::config::ExecConfig;
use kestrel_common::error::KestrelResult;
use kestrel_common::memory::{BufferAllocator, Reservation};

/// Configuration and allocator handed to every operator of a fragment.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    config: ExecConfig,
    allocator: Arc<BufferAllocator>,
}

impl OperatorContext {
    /// Creates a context with a fresh allocator sized by `config`.
    pub fn new(config: ExecConfig) -> KestrelResult<Self> {
        config.validate()?;
        let allocator = Arc::new(BufferAllocator::new(config.memory_limit_bytes));
        Ok(Self { config, allocator })
    }

    /// Creates a context sharing an existing allocator.
    pub fn with_allocator(config: ExecConfig, allocator: Arc<BufferAllocator>) -> KestrelResult<Self> {
        config.validate()?;
        Ok(Self { config, allocator })
    }

    /// Creates a small context for testing.
    pub fn for_testing() -> Self {
        let config = ExecConfig::for_testing();
        let allocator = Arc::new(BufferAllocator::new(config.memory_limit_bytes));
        Self { config, allocator }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Returns the shared allocator.
    pub fn allocator(&self) -> &Arc<BufferAllocator> {
        &self.allocator
    }

    /// Returns the platform default output-row cap.
    pub fn output_batch_rows(&self) -> usize {
        self.config.output_batch_rows
    }

    /// Reserves `bytes` from the shared allocator.
    pub fn reserve(&self, bytes: usize) -> KestrelResult<Reservation> {
        self.allocator.reserve(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates() {
        assert!(OperatorContext::new(ExecConfig::with_output_batch_rows(0)).is_err());

        let ctx = OperatorContext::new(ExecConfig::with_output_batch_rows(8)).unwrap();
        assert_eq!(ctx.output_batch_rows(), 8);
        assert_eq!(ctx.allocator().limit(), ctx.config().memory_limit_bytes);
    }

    #[test]
    fn test_shared_allocator() {
        let allocator = Arc::new(BufferAllocator::new(100));
        let a = OperatorContext::with_allocator(ExecConfig::for_testing(), allocator.clone()).unwrap();
        let b = OperatorContext::with_allocator(ExecConfig::for_testing(), allocator.clone()).unwrap();

        let _r = a.reserve(60).unwrap();
        assert!(b.reserve(60).is_err());
        assert_eq!(allocator.allocated(), 60);
    }
}
