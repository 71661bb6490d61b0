//! Compute → sampling synchronization.
//!
//! A compute dispatch marks every image it writes as pending and hands back a
//! `ComputeFence`. The images cannot be bound for sampling until the fence has
//! been passed to `GraphicsDevice::memory_barrier`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{GraphicsError, Result};
use crate::gfx::resources::ResourceId;

const NO_FENCE: u64 = 0;

/// Pending-write marker shared between a resource and the fences that wrote it.
#[derive(Debug, Default)]
pub struct ResourceSync {
    pending: AtomicU64,
}

impl ResourceSync {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Id of the fence that still has to be waited on, if any.
    pub fn pending_fence(&self) -> Option<u64> {
        match self.pending.load(Ordering::Acquire) {
            NO_FENCE => None,
            id => Some(id),
        }
    }

    pub(crate) fn mark_pending(&self, fence: u64) {
        self.pending.store(fence, Ordering::Release);
    }

    /// Clears the marker only if `fence` is the latest writer.
    pub(crate) fn clear(&self, fence: u64) {
        let _ = self
            .pending
            .compare_exchange(fence, NO_FENCE, Ordering::AcqRel, Ordering::Acquire);
    }

    pub fn ensure_readable(&self, resource: ResourceId) -> Result<()> {
        match self.pending_fence() {
            None => Ok(()),
            Some(_) => Err(GraphicsError::UnsynchronizedTexture(resource.0)),
        }
    }
}

/// Token returned by a compute dispatch.
#[must_use = "pass the fence to memory_barrier before sampling the written textures"]
#[derive(Debug)]
pub struct ComputeFence {
    id: u64,
    written: Vec<Arc<ResourceSync>>,
}

impl ComputeFence {
    /// Creates a fence and marks `written` as pending on it. `id` must be non-zero.
    pub(crate) fn new(id: u64, written: Vec<Arc<ResourceSync>>) -> Self {
        debug_assert_ne!(id, NO_FENCE);
        for sync in &written {
            sync.mark_pending(id);
        }
        Self { id, written }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn written_count(&self) -> usize {
        self.written.len()
    }

    pub(crate) fn signal(self) {
        for sync in &self.written {
            sync.clear(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_gates_until_signaled() {
        let sync = ResourceSync::new();
        let fence = ComputeFence::new(1, vec![sync.clone()]);

        assert_eq!(sync.pending_fence(), Some(1));
        assert!(matches!(
            sync.ensure_readable(ResourceId(9)),
            Err(GraphicsError::UnsynchronizedTexture(9))
        ));

        fence.signal();
        assert!(sync.ensure_readable(ResourceId(9)).is_ok());
    }

    #[test]
    fn stale_fence_does_not_clear_newer_write() {
        let sync = ResourceSync::new();
        let first = ComputeFence::new(1, vec![sync.clone()]);
        let second = ComputeFence::new(2, vec![sync.clone()]);

        first.signal();
        assert_eq!(sync.pending_fence(), Some(2));

        second.signal();
        assert_eq!(sync.pending_fence(), None);
    }
}
