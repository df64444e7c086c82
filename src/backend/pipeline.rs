// Graphics pipeline - all fixed-function state baked at build time
//
// Geometry lives entirely in the vertex shader, so there is no vertex
// input state at all. Viewport and scissor are dynamic (set per recording);
// everything else is immutable once built. The layout is empty: no
// descriptor sets, no push constants.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;

use super::device::VulkanContext;
use super::shader;
use crate::error::{RenderError, RenderResult};

const SHADER_ENTRY_POINT: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

pub struct Pipeline {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    ctx: Arc<VulkanContext>,
}

impl Pipeline {
    /// Build the one pipeline this renderer ever uses from two SPIR-V
    /// blobs. The shader modules are transient: created here, referenced
    /// by the build call, destroyed before returning. The pipeline keeps
    /// its own compiled form.
    pub fn new(
        ctx: Arc<VulkanContext>,
        render_pass: vk::RenderPass,
        vert_code: &[u32],
        frag_code: &[u32],
    ) -> RenderResult<Self> {
        let vert_module = shader::create_shader_module(&ctx, vert_code)?;
        let frag_module = match shader::create_shader_module(&ctx, frag_code) {
            Ok(module) => module,
            Err(e) => {
                unsafe { ctx.device.destroy_shader_module(vert_module, None) };
                return Err(e);
            }
        };

        let result = build_pipeline(&ctx, render_pass, vert_module, frag_module);

        unsafe {
            ctx.device.destroy_shader_module(vert_module, None);
            ctx.device.destroy_shader_module(frag_module, None);
        }

        let (pipeline, layout) = result?;
        log::info!("Graphics pipeline created");

        Ok(Self {
            pipeline,
            layout,
            ctx,
        })
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

fn build_pipeline(
    ctx: &VulkanContext,
    render_pass: vk::RenderPass,
    vert_module: vk::ShaderModule,
    frag_module: vk::ShaderModule,
) -> RenderResult<(vk::Pipeline, vk::PipelineLayout)> {
    let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::VERTEX)
        .module(vert_module)
        .name(SHADER_ENTRY_POINT)
        .build();

    let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::FRAGMENT)
        .module(frag_module)
        .name(SHADER_ENTRY_POINT)
        .build();

    let shader_stages = [vert_stage, frag_stage];

    // No bindings, no attributes: the vertex shader synthesizes positions.
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Counts are baked, the rectangles themselves are dynamic state.
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
        .build();

    let color_blend_attachments = [color_blend_attachment];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let layout_info = vk::PipelineLayoutCreateInfo::builder();
    let layout = unsafe {
        ctx.device
            .create_pipeline_layout(&layout_info, None)
            .map_err(|e| RenderError::ResourceCreation {
                what: "pipeline layout",
                source: e,
            })?
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0)
        .build();

    let pipelines = unsafe {
        ctx.device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
            .map_err(|(_, e)| {
                ctx.device.destroy_pipeline_layout(layout, None);
                RenderError::ResourceCreation {
                    what: "graphics pipeline",
                    source: e,
                }
            })?
    };

    Ok((pipelines[0], layout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_entry_point_is_main() {
        assert_eq!(SHADER_ENTRY_POINT.to_str().unwrap(), "main");
    }
}
