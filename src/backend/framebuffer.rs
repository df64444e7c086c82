// Framebuffers - one per presentation-chain image view
//
// Each binds a single chain image view to the render pass at exactly the
// chain's extent. Count always equals the chain's image count, indexed
// identically, and the whole set is replaced when the chain is rebuilt.

use std::sync::Arc;

use ash::vk;

use super::device::VulkanContext;
use crate::error::{RenderError, RenderResult};

pub struct Framebuffers {
    framebuffers: Vec<vk::Framebuffer>,
    ctx: Arc<VulkanContext>,
}

impl Framebuffers {
    pub fn new(
        ctx: Arc<VulkanContext>,
        render_pass: vk::RenderPass,
        image_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RenderResult<Self> {
        let framebuffers = create_framebuffers(&ctx, render_pass, image_views, extent)?;
        Ok(Self { framebuffers, ctx })
    }

    /// Replace the set after a chain rebuild. Caller must have drained
    /// the device; the old framebuffers go first.
    pub fn rebuild(
        &mut self,
        render_pass: vk::RenderPass,
        image_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RenderResult<()> {
        self.destroy_all();
        self.framebuffers = create_framebuffers(&self.ctx, render_pass, image_views, extent)?;
        Ok(())
    }

    /// Framebuffer for a chain image index. Indices come from acquire,
    /// which the chain bounds for us.
    pub fn get(&self, image_index: usize) -> vk::Framebuffer {
        self.framebuffers[image_index]
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    fn destroy_all(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.ctx.device.destroy_framebuffer(framebuffer, None);
            }
        }
        self.framebuffers.clear();
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

fn create_framebuffers(
    ctx: &VulkanContext,
    render_pass: vk::RenderPass,
    image_views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> RenderResult<Vec<vk::Framebuffer>> {
    image_views
        .iter()
        .map(|&view| {
            let attachments = [view];
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            unsafe {
                ctx.device
                    .create_framebuffer(&create_info, None)
                    .map_err(|e| RenderError::ResourceCreation {
                        what: "framebuffer",
                        source: e,
                    })
            }
        })
        .collect()
}
