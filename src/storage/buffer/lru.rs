use super::replacer::{FrameId, Replacer};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Tracked frames, least recently used at front
    lru_list: VecDeque<FrameId>,
    /// Membership of `lru_list`
    frames: HashSet<FrameId>,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lru_list: VecDeque::with_capacity(capacity),
            frames: HashSet::with_capacity(capacity),
        }
    }

    fn unlink(&mut self, frame_id: FrameId) {
        if let Some(idx) = self.lru_list.iter().position(|&f| f == frame_id) {
            self.lru_list.remove(idx);
        }
    }
}

impl Replacer for LruReplacer {
    fn record_access(&mut self, frame_id: FrameId) {
        if !self.frames.insert(frame_id) {
            self.unlink(frame_id);
        }
        self.lru_list.push_back(frame_id);
    }

    fn evict(&mut self) -> Option<FrameId> {
        let frame_id = self.lru_list.pop_front()?;
        self.frames.remove(&frame_id);
        Some(frame_id)
    }

    fn remove(&mut self, frame_id: FrameId) {
        if self.frames.remove(&frame_id) {
            self.unlink(frame_id);
        }
    }

    fn size(&self) -> usize {
        self.lru_list.len()
    }
}
