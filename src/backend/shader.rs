// SPIR-V loading and shader module creation
//
// Shaders are compiled to .spv files at build time and read from disk at
// startup, so the binary can pick up recompiled shaders without a rebuild
// of the Rust side.

use std::path::Path;

use ash::vk;

use super::device::VulkanContext;
use crate::error::{RenderError, RenderResult};

/// Reinterpret a raw SPIR-V byte stream as the 4-byte words Vulkan wants.
/// Rejects empty and non-word-aligned input instead of trusting the file.
pub fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>, String> {
    if bytes.is_empty() {
        return Err("empty SPIR-V blob".to_string());
    }
    if bytes.len() % 4 != 0 {
        return Err(format!(
            "SPIR-V length {} is not a multiple of 4",
            bytes.len()
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Read a compiled shader from disk and convert it to words.
pub fn load_spirv(path: &Path) -> RenderResult<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|e| RenderError::ShaderIo {
        path: path.to_path_buf(),
        source: e,
    })?;
    spirv_words(&bytes).map_err(|reason| RenderError::InvalidShader {
        path: path.to_path_buf(),
        reason,
    })
}

pub fn create_shader_module(
    ctx: &VulkanContext,
    code: &[u32],
) -> RenderResult<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

    unsafe {
        ctx.device
            .create_shader_module(&create_info, None)
            .map_err(|e| RenderError::ResourceCreation {
                what: "shader module",
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_bytes_to_native_endian_words() {
        let bytes = 0x0723_0203u32.to_ne_bytes();
        let words = spirv_words(&bytes).unwrap();
        assert_eq!(words, vec![0x0723_0203]);
    }

    #[test]
    fn rejects_empty_input() {
        assert!(spirv_words(&[]).is_err());
    }

    #[test]
    fn rejects_unaligned_length() {
        assert!(spirv_words(&[1, 2, 3]).is_err());
        assert!(spirv_words(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn word_count_is_quarter_of_byte_count() {
        let bytes = vec![0u8; 64];
        assert_eq!(spirv_words(&bytes).unwrap().len(), 16);
    }
}
