//! # Failing Storage Medium
//!
//! A StorageMedium wrapper that can simulate failures for testing how the
//! persistence engine degrades. Useful for exercising fallback and healing
//! paths without real flaky hardware.

use hal::{MediumError, StorageMedium};
use std::ops::Range;

/// Policy for when failures should occur
#[derive(Debug, Clone)]
pub enum FailurePolicy {
    /// Never fail (passthrough)
    Never,
    /// Fail every write after N successful writes
    AfterWrites(usize),
    /// Fail writes touching this byte range
    OnRange(Range<usize>),
    /// Fail every read
    Reads,
    /// Fail every commit
    Commits,
}

/// Wrapper around a StorageMedium that can simulate failures
pub struct FailingMedium<M: StorageMedium> {
    inner: M,
    policy: FailurePolicy,
    write_count: usize,
}

impl<M: StorageMedium> FailingMedium<M> {
    /// Create a new failing medium with the given policy
    pub fn new(inner: M, policy: FailurePolicy) -> Self {
        Self {
            inner,
            policy,
            write_count: 0,
        }
    }

    /// Check if a write should fail based on policy
    fn should_fail_write(&self, offset: usize, len: usize) -> bool {
        match &self.policy {
            FailurePolicy::AfterWrites(n) => self.write_count >= *n,
            FailurePolicy::OnRange(range) => offset < range.end && range.start < offset + len,
            _ => false,
        }
    }

    /// Get the underlying medium (for inspection)
    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Get mutable access to the underlying medium
    pub fn inner_mut(&mut self) -> &mut M {
        &mut self.inner
    }

    pub fn into_inner(self) -> M {
        self.inner
    }

    /// Get the number of writes that have succeeded
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    /// Reset the failure policy
    pub fn set_policy(&mut self, policy: FailurePolicy) {
        self.policy = policy;
        self.write_count = 0;
    }
}

impl<M: StorageMedium> StorageMedium for FailingMedium<M> {
    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), MediumError> {
        if matches!(self.policy, FailurePolicy::Reads) {
            return Err(MediumError::IoError);
        }
        self.inner.read(offset, buffer)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), MediumError> {
        if self.should_fail_write(offset, data.len()) {
            return Err(MediumError::IoError);
        }
        self.write_count += 1;
        self.inner.write(offset, data)
    }

    fn commit(&mut self) -> Result<(), MediumError> {
        if matches!(self.policy, FailurePolicy::Commits) {
            return Err(MediumError::IoError);
        }
        self.inner.commit()
    }
}
