// Swapchain - the presentation chain
//
// Owns the negotiated chain of presentable images and one view per image.
// The images belong to the display subsystem; only the views are ours to
// destroy. Extent and format are fixed for the chain's lifetime; a resize
// or out-of-date signal replaces the whole chain via rebuild().

use std::sync::Arc;

use ash::vk;

use super::device::VulkanContext;
use super::surface::SurfaceSupport;
use crate::error::{RenderError, RenderResult};

pub struct Swapchain {
    pub swapchain_loader: ash::extensions::khr::Swapchain,
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    ctx: Arc<VulkanContext>,
}

impl Swapchain {
    /// Negotiate against the surface and build the chain for a framebuffer
    /// of the given pixel size.
    pub fn new(ctx: Arc<VulkanContext>, fb_width: u32, fb_height: u32) -> RenderResult<Self> {
        let support =
            SurfaceSupport::query(&ctx.surface_loader, ctx.physical_device, ctx.surface)?;
        let config = support.negotiate(fb_width, fb_height)?;

        let swapchain_loader =
            ash::extensions::khr::Swapchain::new(&ctx.instance, &ctx.device);

        // Using exclusive mode across two distinct families is undefined
        // behavior on present, so list both and go concurrent in that case.
        let family_indices = [ctx.graphics_family, ctx.present_family];
        let (sharing_mode, family_slice): (_, &[u32]) =
            if ctx.graphics_family != ctx.present_family {
                (vk::SharingMode::CONCURRENT, &family_indices)
            } else {
                (vk::SharingMode::EXCLUSIVE, &[])
            };

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(ctx.surface)
            .min_image_count(config.image_count)
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_slice)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true);

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| RenderError::ResourceCreation {
                    what: "swapchain",
                    source: e,
                })?
        };

        // The driver may allocate more images than we asked for.
        let images = unsafe {
            swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| RenderError::ResourceCreation {
                    what: "swapchain images",
                    source: e,
                })?
        };
        log::info!("Created swapchain with {} images", images.len());

        let image_views = create_image_views(&ctx, &images, config.surface_format.format)?;
        debug_assert_eq!(images.len(), image_views.len());

        Ok(Self {
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format: config.surface_format.format,
            extent: config.extent,
            ctx,
        })
    }

    /// Tear the chain down and renegotiate against the same surface.
    /// Caller must have drained the device first; the surface can only
    /// back one chain at a time, so the old one goes before the new one.
    pub fn rebuild(&mut self, fb_width: u32, fb_height: u32) -> RenderResult<()> {
        self.destroy_resources();

        let mut rebuilt = Self::new(self.ctx.clone(), fb_width, fb_height)?;
        if rebuilt.format != self.format {
            log::warn!(
                "Surface format changed across rebuild: {:?} -> {:?}",
                self.format,
                rebuilt.format
            );
        }

        self.swapchain = rebuilt.swapchain;
        self.images = std::mem::take(&mut rebuilt.images);
        self.image_views = std::mem::take(&mut rebuilt.image_views);
        self.format = rebuilt.format;
        self.extent = rebuilt.extent;

        // Keep the temporary's Drop from freeing the handles we just took.
        rebuilt.swapchain = vk::SwapchainKHR::null();

        Ok(())
    }

    /// Ask for the next presentable image, to be signaled on the given
    /// semaphore. Non-blocking: the index comes back immediately and
    /// readiness is deferred to the semaphore. Raw result so the caller
    /// can tell an out-of-date chain from a real failure.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Queue the image for display once the wait semaphore signals.
    /// Returns the suboptimal flag.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    fn destroy_resources(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.ctx.device.destroy_image_view(view, None);
            }
            self.image_views.clear();
            self.images.clear();

            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_resources();
    }
}

/// One 2D, single-layer, identity-swizzled color view per chain image.
fn create_image_views(
    ctx: &VulkanContext,
    images: &[vk::Image],
    format: vk::Format,
) -> RenderResult<Vec<vk::ImageView>> {
    images
        .iter()
        .map(|&image| {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            unsafe {
                ctx.device
                    .create_image_view(&create_info, None)
                    .map_err(|e| RenderError::ResourceCreation {
                        what: "image view",
                        source: e,
                    })
            }
        })
        .collect()
}
