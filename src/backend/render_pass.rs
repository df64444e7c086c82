// Render pass - how the single color attachment is loaded, written, stored
//
// One attachment, one subpass, one external dependency. The dependency
// defers color-attachment writes until the acquired image is actually
// available, which is what lets us submit before the acquire semaphore
// has signaled: the wait recorded at submission time gates the same stage.

use std::sync::Arc;

use ash::vk;

use super::device::VulkanContext;
use crate::error::{RenderError, RenderResult};

pub struct RenderPass {
    handle: vk::RenderPass,
    ctx: Arc<VulkanContext>,
}

impl RenderPass {
    /// Format must match the presentation chain's format.
    pub fn new(ctx: Arc<VulkanContext>, format: vk::Format) -> RenderResult<Self> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            // UNDEFINED: previous contents are discarded, we clear anyway
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();

        let color_attachments = [color_attachment_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachments)
            .build();

        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .build();

        let attachments = [color_attachment];
        let subpasses = [subpass];
        let dependencies = [dependency];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let handle = unsafe {
            ctx.device
                .create_render_pass(&create_info, None)
                .map_err(|e| RenderError::ResourceCreation {
                    what: "render pass",
                    source: e,
                })?
        };

        Ok(Self { handle, ctx })
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.handle, None);
        }
    }
}
