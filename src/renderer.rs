// Renderer - drives the per-frame loop over the backend objects
//
// Owns everything the loop touches. Field order is teardown order: sync
// objects and commands go before the framebuffers and pipeline, which go
// before the chain, which goes before the context.

use std::sync::Arc;

use ash::vk;

use crate::backend::{
    CommandRecorder, FrameSlot, Framebuffers, Pipeline, RenderPass, Swapchain, VulkanContext,
    MAX_FRAMES_IN_FLIGHT,
};
use crate::backend::sync;
use crate::error::{RenderError, RenderResult};

pub struct Renderer {
    frames: Vec<FrameSlot>,
    recorder: CommandRecorder,
    framebuffers: Framebuffers,
    pipeline: Pipeline,
    render_pass: RenderPass,
    swapchain: Swapchain,
    ctx: Arc<VulkanContext>,

    current_frame: usize,
    needs_rebuild: bool,
    clear_color: [f32; 4],
}

impl Renderer {
    pub fn new(
        ctx: Arc<VulkanContext>,
        fb_width: u32,
        fb_height: u32,
        vert_code: &[u32],
        frag_code: &[u32],
        clear_color: [f32; 4],
    ) -> RenderResult<Self> {
        let swapchain = Swapchain::new(ctx.clone(), fb_width, fb_height)?;
        let render_pass = RenderPass::new(ctx.clone(), swapchain.format)?;
        let pipeline = Pipeline::new(ctx.clone(), render_pass.handle(), vert_code, frag_code)?;
        let framebuffers = Framebuffers::new(
            ctx.clone(),
            render_pass.handle(),
            &swapchain.image_views,
            swapchain.extent,
        )?;
        debug_assert_eq!(framebuffers.len(), swapchain.image_count());

        let recorder = CommandRecorder::new(ctx.clone(), MAX_FRAMES_IN_FLIGHT as u32)?;

        let frames = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSlot::new(ctx.clone()))
            .collect::<RenderResult<Vec<_>>>()?;

        log::info!(
            "Renderer ready: {} chain images, {} frames in flight",
            swapchain.image_count(),
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            frames,
            recorder,
            framebuffers,
            pipeline,
            render_pass,
            swapchain,
            ctx,
            current_frame: 0,
            needs_rebuild: false,
            clear_color,
        })
    }

    /// The window was resized; the chain must be replaced before the next
    /// image is acquired from it.
    pub fn mark_resized(&mut self) {
        self.needs_rebuild = true;
    }

    /// Run one frame through the current slot: throttle on the slot's
    /// fence, acquire, re-record, submit, present, advance the cursor.
    ///
    /// A zero-area framebuffer (minimized window) skips the frame
    /// entirely; a stale chain is rebuilt and the frame retried on the
    /// next call.
    pub fn draw_frame(&mut self, fb_width: u32, fb_height: u32) -> RenderResult<()> {
        if fb_width == 0 || fb_height == 0 {
            return Ok(());
        }

        if self.needs_rebuild {
            self.rebuild_presentation(fb_width, fb_height)?;
        }

        let frame = &self.frames[self.current_frame];
        frame.wait_fence()?;

        let image_index = match self.swapchain.acquire_next_image(frame.image_available) {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    self.needs_rebuild = true;
                }
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                // Fence still signaled: nothing was submitted, so the slot
                // stays reusable after the rebuild.
                self.rebuild_presentation(fb_width, fb_height)?;
                return Ok(());
            }
            Err(e) => {
                return Err(RenderError::AcquirePresent {
                    op: "acquire",
                    source: e,
                })
            }
        };

        // Only reset once we know a submission will follow, otherwise the
        // next wait on this slot would never return.
        frame.reset_fence()?;

        self.recorder.record_frame(
            self.current_frame,
            self.render_pass.handle(),
            self.framebuffers.get(image_index as usize),
            self.pipeline.handle(),
            self.swapchain.extent,
            self.clear_color,
        )?;

        self.submit()?;

        match self
            .swapchain
            .present(self.ctx.present_queue, image_index, self.frames[self.current_frame].render_finished)
        {
            Ok(suboptimal) => {
                if suboptimal {
                    self.needs_rebuild = true;
                }
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.needs_rebuild = true;
            }
            Err(e) => {
                return Err(RenderError::AcquirePresent {
                    op: "present",
                    source: e,
                })
            }
        }

        self.current_frame = sync::next_frame(self.current_frame);
        Ok(())
    }

    fn submit(&self) -> RenderResult<()> {
        let frame = &self.frames[self.current_frame];
        let command_buffers = [self.recorder.buffer(self.current_frame)];
        let wait_semaphores = [frame.image_available];
        // Earlier stages (vertex work) may run before the image is ready;
        // only color writes wait for the acquire to signal.
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], frame.in_flight)?;
        }
        Ok(())
    }

    /// Replace the chain and its framebuffers for the current framebuffer
    /// size. The render pass and pipeline survive as long as the surface
    /// format stays stable, which the chain warns about if it changes.
    fn rebuild_presentation(&mut self, fb_width: u32, fb_height: u32) -> RenderResult<()> {
        log::debug!("Rebuilding presentation chain at {}x{}", fb_width, fb_height);
        self.ctx.wait_idle()?;
        self.swapchain.rebuild(fb_width, fb_height)?;
        self.framebuffers.rebuild(
            self.render_pass.handle(),
            &self.swapchain.image_views,
            self.swapchain.extent,
        )?;
        debug_assert_eq!(self.framebuffers.len(), self.swapchain.image_count());
        self.needs_rebuild = false;
        Ok(())
    }

    /// Drain the device before teardown so no handle is destroyed while
    /// the GPU still references it.
    pub fn wait_idle(&self) -> RenderResult<()> {
        self.ctx.wait_idle()
    }
}
