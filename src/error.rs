// Error taxonomy for setup and the frame loop
//
// Every fallible step propagates to main, which logs the failing step and
// exits nonzero. The only recovery path anywhere is the presentation-chain
// rebuild on an out-of-date surface, handled inside the renderer.

use ash::vk;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// The Vulkan loader itself could not be found or initialized.
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// No physical device offers a graphics queue, a present-capable queue,
    /// the swapchain extension, and a usable surface at the same time.
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Surface negotiation found nothing to work with. Fatal before any
    /// chain object is built.
    #[error("Surface unsupported: {0}")]
    UnsupportedSurface(&'static str),

    /// A builder call failed during bring-up; nothing downstream exists yet.
    #[error("Failed to create {what}: {source}")]
    ResourceCreation {
        what: &'static str,
        #[source]
        source: vk::Result,
    },

    /// Command buffer begin/end/reset failed. A partially recorded buffer
    /// cannot be submitted, so this kills the frame loop.
    #[error("Command recording failed at {step}: {source}")]
    Recording {
        step: &'static str,
        #[source]
        source: vk::Result,
    },

    /// Acquire, submit or present signaled an error that is not the
    /// out-of-date condition (which triggers a chain rebuild instead).
    #[error("Swapchain {op} failed: {source}")]
    AcquirePresent {
        op: &'static str,
        #[source]
        source: vk::Result,
    },

    #[error("Failed to read shader {}: {source}", path.display())]
    ShaderIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid SPIR-V in {}: {reason}", path.display())]
    InvalidShader {
        path: std::path::PathBuf,
        reason: String,
    },

    /// The windowing toolkit refused to hand out a native handle.
    #[error("Window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    /// Catch-all for raw Vulkan calls outside the categories above
    /// (fence waits, queue idles, surface queries).
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
