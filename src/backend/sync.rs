// Per-frame synchronization primitives
//
// Each in-flight frame slot owns two semaphores (GPU-to-GPU ordering) and
// one fence (GPU-to-CPU throttling). A slot's triad is touched by that
// slot alone; no cross-slot sharing, so the single CPU thread needs no
// locking at all.

use std::sync::Arc;

use ash::vk;

use super::device::VulkanContext;
use crate::error::{RenderError, RenderResult};

/// How many frames the CPU may record ahead of the GPU. Slot k can be
/// recorded while slot k-1 is still executing.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Advance the frame cursor by one slot, wrapping at the pipelining depth.
pub fn next_frame(current: usize) -> usize {
    (current + 1) % MAX_FRAMES_IN_FLIGHT
}

/// Synchronization for one pipelined frame.
pub struct FrameSlot {
    /// Signaled by the presentation subsystem once the acquired image is
    /// actually free to draw into. Waited on by exactly one submit.
    pub image_available: vk::Semaphore,
    /// Signaled when this slot's submitted work completes. Waited on by
    /// exactly one present.
    pub render_finished: vk::Semaphore,
    /// Signaled by the GPU alongside render_finished; the CPU blocks on
    /// it before reusing the slot.
    pub in_flight: vk::Fence,
    ctx: Arc<VulkanContext>,
}

impl FrameSlot {
    /// The fence starts signaled so the first pass through the slot does
    /// not wait forever.
    pub fn new(ctx: Arc<VulkanContext>) -> RenderResult<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let creation_error = |e| RenderError::ResourceCreation {
            what: "frame sync objects",
            source: e,
        };

        unsafe {
            let image_available = ctx
                .device
                .create_semaphore(&semaphore_info, None)
                .map_err(creation_error)?;
            let render_finished = match ctx.device.create_semaphore(&semaphore_info, None) {
                Ok(s) => s,
                Err(e) => {
                    ctx.device.destroy_semaphore(image_available, None);
                    return Err(creation_error(e));
                }
            };
            let in_flight = match ctx.device.create_fence(&fence_info, None) {
                Ok(f) => f,
                Err(e) => {
                    ctx.device.destroy_semaphore(image_available, None);
                    ctx.device.destroy_semaphore(render_finished, None);
                    return Err(creation_error(e));
                }
            };

            Ok(Self {
                image_available,
                render_finished,
                in_flight,
                ctx,
            })
        }
    }

    /// Block until the GPU finished the previous use of this slot. The
    /// only CPU-side suspension point in the whole loop.
    pub fn wait_fence(&self) -> RenderResult<()> {
        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[self.in_flight], true, u64::MAX)?
        };
        Ok(())
    }

    /// Back to unsignaled; re-signaled only when the next submission
    /// using this slot completes.
    pub fn reset_fence(&self) -> RenderResult<()> {
        unsafe { self.ctx.device.reset_fences(&[self.in_flight])? };
        Ok(())
    }
}

impl Drop for FrameSlot {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.image_available, None);
            self.ctx.device.destroy_semaphore(self.render_finished, None);
            self.ctx.device.destroy_fence(self.in_flight, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_stays_in_range() {
        let mut frame = 0;
        for _ in 0..100 {
            frame = next_frame(frame);
            assert!(frame < MAX_FRAMES_IN_FLIGHT);
        }
    }

    #[test]
    fn cursor_advances_by_one_per_iteration() {
        let mut frame = 0;
        for i in 1..=10 {
            frame = next_frame(frame);
            assert_eq!(frame, i % MAX_FRAMES_IN_FLIGHT);
        }
    }

    #[test]
    fn cursor_covers_every_slot_once_per_cycle() {
        let mut seen = vec![false; MAX_FRAMES_IN_FLIGHT];
        let mut frame = 0;
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            assert!(!seen[frame], "slot repeated within one cycle");
            seen[frame] = true;
            frame = next_frame(frame);
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(frame, 0);
    }
}
