// Backend module - Vulkan abstraction layer
//
// Thin RAII wrappers around ash. Each object holds an Arc to the context
// it was created from, so handle lifetimes follow Rust ownership.

pub mod command;
pub mod device;
pub mod framebuffer;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use command::CommandRecorder;
pub use device::VulkanContext;
pub use framebuffer::Framebuffers;
pub use pipeline::Pipeline;
pub use render_pass::RenderPass;
pub use swapchain::Swapchain;
pub use sync::{FrameSlot, MAX_FRAMES_IN_FLIGHT};
