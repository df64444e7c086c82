// Surface capability negotiation
//
// Queries what a physical device + surface pair can do and picks the
// format, present mode, extent and image count the swapchain will use.
// The selection helpers are pure so the policy is testable without a GPU.

use ash::vk;

use crate::error::{RenderError, RenderResult};

/// Snapshot of surface support, taken at negotiation time.
/// Must be re-queried if the surface is invalidated (chain rebuild).
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// The negotiated parameters a presentation chain is built from.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

impl SurfaceSupport {
    pub fn query(
        surface_loader: &ash::extensions::khr::Surface,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RenderResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        log::debug!(
            "Surface support: {} formats, {} present modes, image count {}..{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count,
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Suitability gate: at least one format and one present mode.
    /// Checked during device selection, before negotiation is attempted.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    /// Resolve the parameters for a chain covering a framebuffer of the
    /// given pixel size. Fails if the surface offers no formats or modes.
    pub fn negotiate(&self, fb_width: u32, fb_height: u32) -> RenderResult<SurfaceConfig> {
        if self.formats.is_empty() {
            return Err(RenderError::UnsupportedSurface("no surface formats"));
        }
        if self.present_modes.is_empty() {
            return Err(RenderError::UnsupportedSurface("no present modes"));
        }

        let surface_format = choose_surface_format(&self.formats);
        let present_mode = choose_present_mode(&self.present_modes);
        let extent = choose_extent(&self.capabilities, fb_width, fb_height);
        let image_count = choose_image_count(&self.capabilities);

        log::info!(
            "Negotiated surface: {}x{}, format {:?}, {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            image_count
        );

        Ok(SurfaceConfig {
            surface_format,
            present_mode,
            extent,
            image_count,
        })
    }
}

/// Prefer 8-bit BGRA with the standard non-linear color space, otherwise
/// take the first entry. The fallback is a simplification, not a ranking.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(formats[0])
}

/// Prefer MAILBOX (bounded queue, replace-on-full, no tearing). FIFO is
/// the fallback: every conformant implementation must support it.
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Use the surface's current extent verbatim unless it reports the
/// "any size" sentinel, in which case clamp the live framebuffer size
/// into the reported bounds, each dimension independently.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    fb_width: u32,
    fb_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: fb_width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: fb_height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One above the minimum so the driver is never starved for an image,
/// clamped to the maximum when one exists (zero means unbounded).
fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(
        min_count: u32,
        max_count: u32,
        current: (u32, u32),
        min_extent: (u32, u32),
        max_extent: (u32, u32),
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min_extent.0,
                height: min_extent.1,
            },
            max_image_extent: vk::Extent2D {
                width: max_extent.0,
                height: max_extent.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn format_prefers_bgra_srgb() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn format_falls_back_to_first_entry() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_current_when_defined() {
        let capabilities = caps(1, 0, (1920, 1080), (1, 1), (4096, 4096));
        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn extent_sentinel_takes_framebuffer_size() {
        let capabilities = caps(1, 0, (u32::MAX, u32::MAX), (1, 1), (4096, 4096));
        let extent = choose_extent(&capabilities, 1024, 768);
        assert_eq!((extent.width, extent.height), (1024, 768));
    }

    #[test]
    fn extent_clamps_into_reported_bounds() {
        let capabilities = caps(1, 0, (u32::MAX, u32::MAX), (100, 100), (2000, 2000));
        let too_big = choose_extent(&capabilities, 3000, 3000);
        assert_eq!((too_big.width, too_big.height), (2000, 2000));
        let too_small = choose_extent(&capabilities, 50, 50);
        assert_eq!((too_small.width, too_small.height), (100, 100));
    }

    #[test]
    fn image_count_unbounded_is_min_plus_one() {
        let capabilities = caps(1, 0, (800, 600), (1, 1), (4096, 4096));
        assert_eq!(choose_image_count(&capabilities), 2);
    }

    #[test]
    fn image_count_clamps_to_maximum() {
        let capabilities = caps(3, 3, (800, 600), (1, 1), (4096, 4096));
        assert_eq!(choose_image_count(&capabilities), 3);
    }

    #[test]
    fn image_count_stays_within_bounds() {
        let capabilities = caps(2, 8, (800, 600), (1, 1), (4096, 4096));
        let count = choose_image_count(&capabilities);
        assert!(count >= capabilities.min_image_count);
        assert!(count <= capabilities.max_image_count);
    }

    #[test]
    fn negotiate_rejects_empty_lists() {
        let empty_formats = SurfaceSupport {
            capabilities: Default::default(),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(!empty_formats.is_adequate());
        assert!(empty_formats.negotiate(800, 600).is_err());

        let empty_modes = SurfaceSupport {
            capabilities: Default::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![],
        };
        assert!(!empty_modes.is_adequate());
        assert!(empty_modes.negotiate(800, 600).is_err());
    }

    #[test]
    fn negotiate_single_nonpreferred_format_succeeds() {
        let support = SurfaceSupport {
            capabilities: caps(1, 0, (800, 600), (1, 1), (4096, 4096)),
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let config = support.negotiate(800, 600).unwrap();
        assert_eq!(config.surface_format.format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(config.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(config.image_count, 2);
    }
}
