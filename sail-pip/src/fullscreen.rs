//  FULLSCREEN.rs
//    by Lut99
//
//  Created:
//    22 Oct 2022, 15:14:38
//  Last edited:
//    14 Jan 2023, 18:55:20
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the internally-driven fullscreen passes: the depth copy,
//!   the color copy and the tonemap. Each binds one sampled image (with
//!   an immutable sampler), a pipeline built from a shared full-triangle
//!   vertex shader, and draws three vertices.
//

use std::ptr;

use ash::vk;
use log::warn;

use sail_gfx::RenderSystem;
use sail_thr::spec::{DrawBatch, RecordBuffer};
use sail_utl::to_cstr;

pub use crate::errors::RenderPipelineError as Error;
use crate::shaders::load_shader;


/***** LIBRARY STRUCTS *****/
/// The user record the fullscreen draw contexts carry: just the set with the image to sample.
#[derive(Clone, Copy, Debug)]
pub struct FullscreenBatch {
    /// The descriptor set with the sampled image (and immutable sampler)
    pub set : vk::DescriptorSet,
}





/***** VIEWPORT HELPERS *****/
/// Returns the viewport covering the full target.
#[inline]
pub fn fullscreen_viewport(width: u32, height: u32) -> vk::Viewport {
    vk::Viewport {
        x         : 0.0,
        y         : 0.0,
        width     : width as f32,
        height    : height as f32,
        min_depth : 0.0,
        max_depth : 1.0,
    }
}

/// Returns the viewport covering the full target, flipped so the output lands right side up on the swapchain.
#[inline]
pub fn flipped_viewport(width: u32, height: u32) -> vk::Viewport {
    vk::Viewport {
        x         : 0.0,
        y         : height as f32,
        width     : width as f32,
        height    : -(height as f32),
        min_depth : 0.0,
        max_depth : 1.0,
    }
}

/// Returns the scissor rect covering the full target.
#[inline]
pub fn fullscreen_scissor(width: u32, height: u32) -> vk::Rect2D {
    vk::Rect2D {
        offset : vk::Offset2D{ x: 0, y: 0 },
        extent : vk::Extent2D{ width, height },
    }
}





/***** RECORD CALLBACKS *****/
/// Records a single fullscreen draw: bind, viewport/scissor, one set, three vertices.
fn record_fullscreen(device: &ash::Device, buffer: vk::CommandBuffer, batch: &DrawBatch, set: vk::DescriptorSet) {
    unsafe {
        device.cmd_bind_pipeline(buffer, vk::PipelineBindPoint::GRAPHICS, batch.pipeline);

        device.cmd_set_viewport(buffer, 0, &[ batch.viewport ]);
        device.cmd_set_scissor(buffer, 0, &[ batch.scissor ]);

        device.cmd_bind_descriptor_sets(buffer, vk::PipelineBindPoint::GRAPHICS, batch.layout, 0, &[ set ], &[]);

        // Just drawing a fullscreen triangle that's generated by the vertex shader
        device.cmd_draw(buffer, 3, 1, 0, 0);
    }
}

/// The record callback of the depth copy pass.
pub fn record_depth_copy(device: &ash::Device, buffer: vk::CommandBuffer, batches: &[DrawBatch], records: &RecordBuffer) {
    // Only expecting one draw per pass
    if batches.len() != 1 {
        warn!("Depth copy pass got {} batches; expected 1", batches.len());
        return;
    }
    record_fullscreen(device, buffer, &batches[0], records.get::<FullscreenBatch>(0).set);
}

/// The record callback of the color copy pass.
pub fn record_color_copy(device: &ash::Device, buffer: vk::CommandBuffer, batches: &[DrawBatch], records: &RecordBuffer) {
    // Only expecting one draw per pass
    if batches.len() != 1 {
        warn!("Color copy pass got {} batches; expected 1", batches.len());
        return;
    }
    record_fullscreen(device, buffer, &batches[0], records.get::<FullscreenBatch>(0).set);
}

/// The record callback of the tonemap pass.
pub fn record_tonemapping(device: &ash::Device, buffer: vk::CommandBuffer, batches: &[DrawBatch], records: &RecordBuffer) {
    // Only expecting one draw per pass
    if batches.len() != 1 {
        warn!("Tonemap pass got {} batches; expected 1", batches.len());
        return;
    }
    record_fullscreen(device, buffer, &batches[0], records.get::<FullscreenBatch>(0).set);
}





/***** PIPELINE CREATION *****/
/// Creates one of the fullscreen pipelines: the shared full-triangle vertex shader with a pass-specific fragment shader, rendering to a single color attachment of the given format.
///
/// # Arguments
/// - `render_system`: The RenderSystem to create the modules and the pipeline through.
/// - `color_format`: The format of the pass's color attachment.
/// - `pipe_layout`: The (shared) pipeline layout with the single sampled-image set.
/// - `vert_name`: The embedded file name of the vertex shader blob.
/// - `frag_name`: The embedded file name of the fragment shader blob.
/// - `label`: A debug name for the pipeline.
///
/// # Errors
/// This function errors if a shader blob is missing or the pipeline could not be created.
pub fn create_fullscreen_pipeline(render_system: &RenderSystem, color_format: vk::Format, pipe_layout: vk::PipelineLayout, vert_name: &'static str, frag_name: &'static str, label: &'static str) -> Result<vk::Pipeline, Error> {
    // Fetch and wrap the shaders
    let vert_words = load_shader(vert_name)?;
    let frag_words = load_shader(frag_name)?;
    let vert_info = vk::ShaderModuleCreateInfo {
        s_type    : vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_next    : ptr::null(),
        flags     : vk::ShaderModuleCreateFlags::empty(),
        code_size : vert_words.len() * 4,
        p_code    : vert_words.as_ptr(),
    };
    let frag_info = vk::ShaderModuleCreateInfo {
        s_type    : vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_next    : ptr::null(),
        flags     : vk::ShaderModuleCreateFlags::empty(),
        code_size : frag_words.len() * 4,
        p_code    : frag_words.as_ptr(),
    };
    let vert_mod = render_system.create_shader(&vert_info, vert_name).map_err(|err| Error::ResourceError{ what: "fullscreen vertex shader", err })?;
    let frag_mod = render_system.create_shader(&frag_info, frag_name).map_err(|err| Error::ResourceError{ what: "fullscreen fragment shader", err })?;

    // The two stages, with the conventional entry point names
    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type : vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            p_next : ptr::null(),
            flags  : vk::PipelineShaderStageCreateFlags::empty(),

            stage  : vk::ShaderStageFlags::VERTEX,
            module : vert_mod,
            p_name : to_cstr!("vert").as_ptr(),

            p_specialization_info : ptr::null(),
        },
        vk::PipelineShaderStageCreateInfo {
            s_type : vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            p_next : ptr::null(),
            flags  : vk::PipelineShaderStageCreateFlags::empty(),

            stage  : vk::ShaderStageFlags::FRAGMENT,
            module : frag_mod,
            p_name : to_cstr!("frag").as_ptr(),

            p_specialization_info : ptr::null(),
        },
    ];

    // No vertex buffers; the triangle comes out of the vertex shader
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type : vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        p_next : ptr::null(),
        flags  : vk::PipelineVertexInputStateCreateFlags::empty(),

        vertex_binding_description_count   : 0,
        p_vertex_binding_descriptions      : ptr::null(),
        vertex_attribute_description_count : 0,
        p_vertex_attribute_descriptions    : ptr::null(),
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type : vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        p_next : ptr::null(),
        flags  : vk::PipelineInputAssemblyStateCreateFlags::empty(),

        topology                 : vk::PrimitiveTopology::TRIANGLE_LIST,
        primitive_restart_enable : vk::FALSE,
    };

    // Viewport and scissor are dynamic; these are placeholders
    let viewport = fullscreen_viewport(800, 600);
    let scissor  = fullscreen_scissor(800, 600);
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type : vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        p_next : ptr::null(),
        flags  : vk::PipelineViewportStateCreateFlags::empty(),

        viewport_count : 1,
        p_viewports    : &viewport,
        scissor_count  : 1,
        p_scissors     : &scissor,
    };

    let rasterization = vk::PipelineRasterizationStateCreateInfo {
        s_type : vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        p_next : ptr::null(),
        flags  : vk::PipelineRasterizationStateCreateFlags::empty(),

        depth_clamp_enable        : vk::FALSE,
        rasterizer_discard_enable : vk::FALSE,
        polygon_mode              : vk::PolygonMode::FILL,
        cull_mode                 : vk::CullModeFlags::NONE,
        front_face                : vk::FrontFace::COUNTER_CLOCKWISE,
        depth_bias_enable         : vk::FALSE,
        depth_bias_constant_factor : 0.0,
        depth_bias_clamp           : 0.0,
        depth_bias_slope_factor    : 0.0,
        line_width                 : 1.0,
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type : vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        p_next : ptr::null(),
        flags  : vk::PipelineMultisampleStateCreateFlags::empty(),

        rasterization_samples    : vk::SampleCountFlags::TYPE_1,
        sample_shading_enable    : vk::FALSE,
        min_sample_shading       : 0.0,
        p_sample_mask            : ptr::null(),
        alpha_to_coverage_enable : vk::FALSE,
        alpha_to_one_enable      : vk::FALSE,
    };

    let blend_attachment = vk::PipelineColorBlendAttachmentState {
        blend_enable           : vk::FALSE,
        src_color_blend_factor : vk::BlendFactor::ONE,
        dst_color_blend_factor : vk::BlendFactor::ZERO,
        color_blend_op         : vk::BlendOp::ADD,
        src_alpha_blend_factor : vk::BlendFactor::ONE,
        dst_alpha_blend_factor : vk::BlendFactor::ZERO,
        alpha_blend_op         : vk::BlendOp::ADD,
        color_write_mask       : vk::ColorComponentFlags::R | vk::ColorComponentFlags::G | vk::ColorComponentFlags::B | vk::ColorComponentFlags::A,
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type : vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        p_next : ptr::null(),
        flags  : vk::PipelineColorBlendStateCreateFlags::empty(),

        logic_op_enable  : vk::FALSE,
        logic_op         : vk::LogicOp::COPY,
        attachment_count : 1,
        p_attachments    : &blend_attachment,
        blend_constants  : [ 0.0, 0.0, 0.0, 0.0 ],
    };

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
        s_type : vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
        p_next : ptr::null(),
        flags  : vk::PipelineDepthStencilStateCreateFlags::empty(),

        depth_test_enable        : vk::FALSE,
        depth_write_enable       : vk::FALSE,
        depth_compare_op         : vk::CompareOp::ALWAYS,
        depth_bounds_test_enable : vk::FALSE,
        stencil_test_enable      : vk::FALSE,
        front                    : vk::StencilOpState::default(),
        back                     : vk::StencilOpState::default(),
        min_depth_bounds         : 0.0,
        max_depth_bounds         : 1.0,
    };

    let dynamic_states = [ vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR ];
    let dynamic = vk::PipelineDynamicStateCreateInfo {
        s_type : vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        p_next : ptr::null(),
        flags  : vk::PipelineDynamicStateCreateFlags::empty(),

        dynamic_state_count : dynamic_states.len() as u32,
        p_dynamic_states    : dynamic_states.as_ptr(),
    };

    // We render with dynamic rendering, so the attachment format comes through the chain
    let rendering_info = vk::PipelineRenderingCreateInfo {
        s_type : vk::StructureType::PIPELINE_RENDERING_CREATE_INFO,
        p_next : ptr::null(),

        view_mask                  : 0,
        color_attachment_count     : 1,
        p_color_attachment_formats : &color_format,
        depth_attachment_format    : vk::Format::UNDEFINED,
        stencil_attachment_format  : vk::Format::UNDEFINED,
    };

    let create_info = vk::GraphicsPipelineCreateInfo {
        s_type : vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        p_next : (&rendering_info as *const vk::PipelineRenderingCreateInfo).cast(),
        flags  : vk::PipelineCreateFlags::empty(),

        stage_count : stages.len() as u32,
        p_stages    : stages.as_ptr(),

        p_vertex_input_state   : &vertex_input,
        p_input_assembly_state : &input_assembly,
        p_tessellation_state   : ptr::null(),
        p_viewport_state       : &viewport_state,
        p_rasterization_state  : &rasterization,
        p_multisample_state    : &multisample,
        p_depth_stencil_state  : &depth_stencil,
        p_color_blend_state    : &color_blend,
        p_dynamic_state        : &dynamic,

        layout : pipe_layout,

        render_pass : vk::RenderPass::null(),
        subpass     : 0,

        base_pipeline_handle : vk::Pipeline::null(),
        base_pipeline_index  : -1,
    };

    let result = render_system.create_graphics_pipelines(&[ create_info ], label);

    // The modules have served their purpose either way
    render_system.destroy_shader(vert_mod);
    render_system.destroy_shader(frag_mod);

    match result {
        Ok(pipelines) => Ok(pipelines[0]),
        Err(err)      => Err(Error::ResourceError{ what: "fullscreen pipeline", err }),
    }
}





/***** TESTS *****/
#[cfg(test)]
mod test {
    use super::*;

    /// The tonemap draw at 1280x720 must flip its viewport to land right side up.
    #[test]
    fn test_tonemap_viewport() {
        let viewport = flipped_viewport(1280, 720);
        assert_eq!(viewport.x, 0.0);
        assert_eq!(viewport.y, 720.0);
        assert_eq!(viewport.width, 1280.0);
        assert_eq!(viewport.height, -720.0);
        assert_eq!(viewport.min_depth, 0.0);
        assert_eq!(viewport.max_depth, 1.0);
    }

    /// The copy draws cover the target without flipping.
    #[test]
    fn test_copy_viewport() {
        let viewport = fullscreen_viewport(1280, 720);
        assert_eq!((viewport.x, viewport.y), (0.0, 0.0));
        assert_eq!((viewport.width, viewport.height), (1280.0, 720.0));

        let scissor = fullscreen_scissor(1280, 720);
        assert_eq!((scissor.offset.x, scissor.offset.y), (0, 0));
        assert_eq!((scissor.extent.width, scissor.extent.height), (1280, 720));
    }
}
