//! Renderer statistics
//!
//! Aggregate counters maintained by renderer objects themselves. Nothing
//! verifies that increments and decrements pair up; an unpaired call shows
//! up as drift, and underflow is clamped and logged.

/// Counters reported by a renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Resident resource bytes
    pub allocated_bytes: u64,
    /// Objects currently suspended
    pub suspended_objects: u64,
    /// Objects pushed during the most recent submission
    pub pushed_objects: u64,
    /// Completed render cycles
    pub frames: u64,
}

impl RenderStats {
    /// Account for newly allocated resource bytes
    pub fn increase_allocated_resource_bytes(&mut self, bytes: u64) {
        self.allocated_bytes = self.allocated_bytes.saturating_add(bytes);
    }

    /// Account for released resource bytes
    pub fn decrease_allocated_resource_bytes(&mut self, bytes: u64) {
        if bytes > self.allocated_bytes {
            log::warn!(
                "Allocated byte counter underflow: releasing {bytes} of {} bytes",
                self.allocated_bytes
            );
        }
        self.allocated_bytes = self.allocated_bytes.saturating_sub(bytes);
    }

    /// Count an object entering suspension
    pub fn increase_suspended_objects(&mut self) {
        self.suspended_objects += 1;
    }

    /// Count an object leaving suspension
    pub fn decrease_suspended_objects(&mut self) {
        if self.suspended_objects == 0 {
            log::warn!("Suspended object counter underflow");
        }
        self.suspended_objects = self.suspended_objects.saturating_sub(1);
    }
}
