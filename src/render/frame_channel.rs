// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot frame handoff from the capture thread to the render thread
//!
//! The slot holds at most one frame. Publishing replaces whatever is there,
//! so a frame the renderer never picked up is dropped without notice. Frames
//! are whole `Arc` buffers swapped under a short lock; the reader can never
//! see a partially written frame. Every publish also raises a render request
//! and pokes the [`RenderTrigger`], which is how the render loop learns there
//! is something to draw.

use crate::errors::FrameError;
use crate::media::Frame;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Wakes the render loop after a publish
pub trait RenderTrigger: Send + Sync {
    fn request_render(&self);
}

impl<T: RenderTrigger + ?Sized> RenderTrigger for Arc<T> {
    fn request_render(&self) {
        (**self).request_render();
    }
}

/// Trigger for consumers that poll [`FrameChannel::take_render_request`]
#[derive(Debug, Default, Clone, Copy)]
pub struct PollingTrigger;

impl RenderTrigger for PollingTrigger {
    fn request_render(&self) {}
}

/// Latest-frame-wins slot shared by one producer and one consumer
pub struct FrameChannel<T = PollingTrigger> {
    slot: Mutex<Option<Frame>>,
    render_requested: AtomicBool,
    trigger: T,
    published: AtomicU64,
    overwritten: AtomicU64,
}

impl<T> std::fmt::Debug for FrameChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameChannel")
            .field("render_requested", &self.render_requested.load(Ordering::Relaxed))
            .field("published", &self.published.load(Ordering::Relaxed))
            .field("overwritten", &self.overwritten.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for FrameChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameChannel {
    pub fn new() -> Self {
        Self::with_trigger(PollingTrigger)
    }
}

impl<T: RenderTrigger> FrameChannel<T> {
    pub fn with_trigger(trigger: T) -> Self {
        Self {
            slot: Mutex::new(None),
            render_requested: AtomicBool::new(false),
            trigger,
            published: AtomicU64::new(0),
            overwritten: AtomicU64::new(0),
        }
    }

    /// Replace the slot contents and request a render. Producer side only.
    pub fn publish(&self, frame: Frame) {
        let previous = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(frame);

        let count = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        if previous.is_some() {
            let overwritten = self.overwritten.fetch_add(1, Ordering::Relaxed) + 1;
            if overwritten % 30 == 1 {
                tracing::debug!(published = count, overwritten, "Renderer behind, frame replaced");
            }
        }

        self.render_requested.store(true, Ordering::Release);
        self.trigger.request_render();
    }

    /// Validate and copy a borrowed buffer into a fresh frame, then publish it.
    ///
    /// Malformed buffers are rejected here and never reach the slot.
    pub fn publish_bytes(&self, bytes: &[u8], width: u32, height: u32) -> Result<(), FrameError> {
        let frame = Frame::copy_from(bytes, width, height)?;
        self.publish(frame);
        Ok(())
    }

    /// Take the newest frame published since the last drain. Render side only.
    pub fn drain(&self) -> Option<Frame> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Consume the pending render request, if any
    pub fn take_render_request(&self) -> bool {
        self.render_requested.swap(false, Ordering::AcqRel)
    }

    /// Request a redraw without a new frame (e.g. after a resize)
    pub fn request_render(&self) {
        self.render_requested.store(true, Ordering::Release);
        self.trigger.request_render();
    }

    /// Total frames published
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames replaced before the renderer drained them
    pub fn overwritten_count(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn frame(seq: u64) -> Frame {
        Frame::copy_from(&[seq as u8; 6], 2, 2).unwrap().with_sequence(seq)
    }

    struct CountingTrigger(AtomicUsize);

    impl RenderTrigger for CountingTrigger {
        fn request_render(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_drain_empty() {
        let channel = FrameChannel::new();
        assert!(channel.drain().is_none());
        assert!(!channel.take_render_request());
    }

    #[test]
    fn test_second_drain_is_empty() {
        let channel = FrameChannel::new();
        channel.publish(frame(1));
        assert_eq!(channel.drain().map(|f| f.sequence()), Some(1));
        assert!(channel.drain().is_none());
    }

    #[test]
    fn test_latest_wins() {
        let channel = FrameChannel::new();
        channel.publish(frame(1));
        channel.publish(frame(2));
        channel.publish(frame(3));
        assert_eq!(channel.drain().map(|f| f.sequence()), Some(3));
        assert_eq!(channel.published_count(), 3);
        assert_eq!(channel.overwritten_count(), 2);
    }

    #[test]
    fn test_publish_raises_request_and_trigger() {
        let trigger = Arc::new(CountingTrigger(AtomicUsize::new(0)));
        let channel = FrameChannel::with_trigger(trigger.clone());
        channel.publish(frame(1));
        assert!(channel.take_render_request());
        assert!(!channel.take_render_request());
        assert_eq!(trigger.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_bytes_rejects_malformed() {
        let channel = FrameChannel::new();
        assert!(channel.publish_bytes(&[0u8; 5], 2, 2).is_err());
        assert!(channel.drain().is_none());
        assert!(!channel.take_render_request());
        assert_eq!(channel.published_count(), 0);
    }

    #[test]
    fn test_publish_bytes_copies() {
        let channel = FrameChannel::new();
        let mut buffer = vec![1u8; 6];
        channel.publish_bytes(&buffer, 2, 2).unwrap();
        // Producer reuses its buffer; the published frame is unaffected
        buffer.fill(9);
        assert_eq!(channel.drain().unwrap().data(), &[1u8; 6]);
    }
}
