use std::fmt::Debug;

pub type FrameId = u32;

/// Eviction policy of the page buffer.
pub trait Replacer: Debug {
    /// Mark a frame as just used. Unknown frames become tracked.
    fn record_access(&mut self, frame_id: FrameId);

    /// Select a frame to evict and stop tracking it. Returns None if no frame is tracked.
    fn evict(&mut self) -> Option<FrameId>;

    /// Stop tracking a frame without evicting it.
    fn remove(&mut self, frame_id: FrameId);

    /// Get the number of tracked frames.
    fn size(&self) -> usize;
}
