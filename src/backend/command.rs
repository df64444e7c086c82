// Command recording - pool plus one primary buffer per in-flight frame
//
// Buffers are not recorded once and replayed; each frame resets its slot's
// buffer and re-records the full pass against whichever chain image was
// acquired. The pool allows individual buffer reset for exactly that.

use std::sync::Arc;

use ash::vk;

use super::device::VulkanContext;
use crate::error::{RenderError, RenderResult};

pub struct CommandRecorder {
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
    ctx: Arc<VulkanContext>,
}

impl CommandRecorder {
    /// Pool on the graphics family, `count` primary buffers (one per
    /// frame slot).
    pub fn new(ctx: Arc<VulkanContext>, count: u32) -> RenderResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(ctx.graphics_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe {
            ctx.device
                .create_command_pool(&pool_info, None)
                .map_err(|e| RenderError::ResourceCreation {
                    what: "command pool",
                    source: e,
                })?
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe {
            ctx.device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| {
                    ctx.device.destroy_command_pool(pool, None);
                    RenderError::ResourceCreation {
                        what: "command buffers",
                        source: e,
                    }
                })?
        };

        log::info!("Allocated {} command buffers", buffers.len());

        Ok(Self { pool, buffers, ctx })
    }

    pub fn buffer(&self, slot: usize) -> vk::CommandBuffer {
        self.buffers[slot]
    }

    /// Reset and re-record one slot's buffer: clear to the given color,
    /// bind the pipeline, set viewport/scissor to the chain extent, draw
    /// the fixed 3-vertex, 1-instance call. Geometry comes entirely from
    /// the vertex shader; there are no vertex or index buffers to bind.
    pub fn record_frame(
        &self,
        slot: usize,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        pipeline: vk::Pipeline,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> RenderResult<()> {
        let device = &self.ctx.device;
        let cmd = self.buffers[slot];

        unsafe {
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| RenderError::Recording {
                    step: "reset",
                    source: e,
                })?;

            let begin_info = vk::CommandBufferBeginInfo::builder();
            device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| RenderError::Recording {
                    step: "begin",
                    source: e,
                })?;

            let clear_values = [vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            }];

            let render_pass_begin = vk::RenderPassBeginInfo::builder()
                .render_pass(render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);

            device.cmd_begin_render_pass(cmd, &render_pass_begin, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);

            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            device.cmd_set_scissor(cmd, 0, &[scissor]);

            device.cmd_draw(cmd, 3, 1, 0, 0);

            device.cmd_end_render_pass(cmd);
            device
                .end_command_buffer(cmd)
                .map_err(|e| RenderError::Recording {
                    step: "end",
                    source: e,
                })?;
        }

        Ok(())
    }
}

impl Drop for CommandRecorder {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its buffers too.
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}
