//  SYSTEM.rs
//    by Lut99
//
//  Created:
//    22 Oct 2022, 15:44:03
//  Last edited:
//    14 Jan 2023, 20:19:42
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the RenderPipelineSystem: pass registration, the default
//!   pass graph, per-frame pass context construction, draw contexts and
//!   the internally-driven fullscreen draws.
//

use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::mem;
use std::ptr;
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use log::debug;

use sail_ecs::spec::{System, SystemId};
use sail_gfx::{FrameDescriptorPools, RenderSystem};
use sail_tgt::{RenderTargetId, RenderTargetSystem, CASCADE_COUNT, PREFILTER_MIP_COUNT};
use sail_thr::RenderThread;
use sail_thr::spec::{AttachmentContext, DrawBatch, DrawContext, PassContext, RecordFn};

pub use crate::errors::RenderPipelineError as Error;
use crate::{MAX_ATTACHMENTS, MAX_RENDER_PASS_TRANS, RENDER_PIPELINE_SYSTEM_ID};
use crate::fullscreen::{self, FullscreenBatch};
use crate::graph::{assign_command_buffers, sort_pass_graph};
use crate::pass::{build_barriers, RenderPass};
use crate::spec::{AttachmentInfo, DrawContextId, PassTransition, RenderPassId, RenderPassInfo};


/***** CONSTANTS *****/
/// The number of descriptor sets the fullscreen passes write per frame (depth copy + the shared color set).
const FULLSCREEN_SET_COUNT: u32 = 2;





/***** HELPER FUNCTIONS *****/
/// Shorthand constructor for a PassTransition.
#[allow(clippy::too_many_arguments)]
fn transition(render_target: RenderTargetId, src_stage: vk::PipelineStageFlags, dst_stage: vk::PipelineStageFlags, src_access: vk::AccessFlags, dst_access: vk::AccessFlags, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout, aspect: vk::ImageAspectFlags, level_count: u32, layer_count: u32) -> PassTransition {
    PassTransition {
        render_target,
        src_stage,
        dst_stage,
        src_access,
        dst_access,
        old_layout,
        new_layout,
        range : vk::ImageSubresourceRange {
            aspect_mask      : aspect,
            base_mip_level   : 0,
            level_count,
            base_array_layer : 0,
            layer_count,
        },
    }
}

/// Shorthand constructor for an AttachmentInfo.
fn attachment(target: RenderTargetId, mip: u32, load_op: vk::AttachmentLoadOp, store_op: vk::AttachmentStoreOp, clear_value: vk::ClearValue) -> AttachmentInfo {
    AttachmentInfo {
        attachment : target,
        mip,
        load_op,
        store_op,
        clear_value,
    }
}





/***** LIBRARY *****/
/// The RenderPipelineSystem translates the declarative pass graph plus the frame's draw batches into pass contexts the render thread records.
pub struct RenderPipelineSystem {
    /// The render system we create device resources through.
    render_system : Rc<RefCell<RenderSystem>>,
    /// The render target catalog the passes attach to.
    target_system : Rc<RefCell<RenderTargetSystem>>,
    /// The render thread whose frame states we populate.
    thread        : Arc<RenderThread>,

    /// The registered passes, indexed by RenderPassId.
    passes     : Vec<RenderPass>,
    /// The execution order, as pass IDs.
    pass_order : Vec<u32>,
    /// The command buffer index for every position in `pass_order`.
    cb_indices : Vec<u32>,
    /// How many command buffers the passes are split over.
    cb_count   : u32,
    /// How many draw contexts are registered (mirrored in every frame state).
    draw_ctx_count : u32,

    /// The opaque depth + normal prepass (the root of the graph)
    pub opaque_depth_normal_pass : RenderPassId,
    /// The environment capture pass (multiview, all six faces)
    pub env_capture_pass         : RenderPassId,
    /// The irradiance convolution pass
    pub irradiance_pass          : RenderPassId,
    /// The prefilter passes, one per prefiltered-cube mip
    pub prefilter_passes         : [RenderPassId; PREFILTER_MIP_COUNT as usize],
    /// The shadow passes, one per cascade
    pub shadow_passes            : [RenderPassId; CASCADE_COUNT],
    /// The opaque color pass
    pub opaque_color_pass        : RenderPassId,
    /// The sky pass
    pub sky_pass                 : RenderPassId,
    /// The depth copy pass
    pub depth_copy_pass          : RenderPassId,
    /// The color copy pass
    pub color_copy_pass          : RenderPassId,
    /// The transparent depth pass
    pub transparent_depth_pass   : RenderPassId,
    /// The transparent color pass
    pub transparent_color_pass   : RenderPassId,
    /// The brightness downsample pass
    pub brightness_pass          : RenderPassId,
    /// The tonemap pass
    pub tonemap_pass             : RenderPassId,
    /// The UI pass
    pub ui_pass                  : RenderPassId,

    /// The shared sampler of the fullscreen passes (immutable in the set layout)
    sampler          : vk::Sampler,
    /// The set layout of the fullscreen passes (sampled image + immutable sampler)
    copy_set_layout  : vk::DescriptorSetLayout,
    /// The pipeline layout of the fullscreen passes
    copy_pipe_layout : vk::PipelineLayout,
    /// The depth copy pipeline
    depth_copy_pipe  : vk::Pipeline,
    /// The color copy pipeline
    color_copy_pipe  : vk::Pipeline,
    /// The tonemap pipeline
    tonemap_pipe     : vk::Pipeline,
    /// The per-frame descriptor pools for the fullscreen sets
    descriptor_pools : FrameDescriptorPools,
    /// The draw context of the depth copy pass
    depth_copy_ctx   : DrawContextId,
    /// The draw context of the color copy pass
    color_copy_ctx   : DrawContextId,
    /// The draw context of the tonemap pass
    tonemap_ctx      : DrawContextId,
}

impl RenderPipelineSystem {
    /// Constructor for the RenderPipelineSystem.
    ///
    /// Registers the default pass graph, sorts it, splits it over command buffers, pushes the pass contexts to the render thread and wires up the internally-driven fullscreen passes.
    ///
    /// # Arguments
    /// - `render_system`: The RenderSystem to create device resources through.
    /// - `target_system`: The RenderTargetSystem with the catalog the passes attach to.
    /// - `thread`: The RenderThread whose frame states we populate.
    ///
    /// # Errors
    /// This function errors if the graph is malformed or any device resource could not be created.
    pub fn new(render_system: Rc<RefCell<RenderSystem>>, target_system: Rc<RefCell<RenderTargetSystem>>, thread: Arc<RenderThread>) -> Result<Self, Error> {
        let mut this = Self {
            render_system,
            target_system,
            thread,

            passes     : Vec::with_capacity(32),
            pass_order : vec![],
            cb_indices : vec![],
            cb_count   : 0,
            draw_ctx_count : 0,

            opaque_depth_normal_pass : RenderPassId(0),
            env_capture_pass         : RenderPassId(0),
            irradiance_pass          : RenderPassId(0),
            prefilter_passes         : [RenderPassId(0); PREFILTER_MIP_COUNT as usize],
            shadow_passes            : [RenderPassId(0); CASCADE_COUNT],
            opaque_color_pass        : RenderPassId(0),
            sky_pass                 : RenderPassId(0),
            depth_copy_pass          : RenderPassId(0),
            color_copy_pass          : RenderPassId(0),
            transparent_depth_pass   : RenderPassId(0),
            transparent_color_pass   : RenderPassId(0),
            brightness_pass          : RenderPassId(0),
            tonemap_pass             : RenderPassId(0),
            ui_pass                  : RenderPassId(0),

            sampler          : vk::Sampler::null(),
            copy_set_layout  : vk::DescriptorSetLayout::null(),
            copy_pipe_layout : vk::PipelineLayout::null(),
            depth_copy_pipe  : vk::Pipeline::null(),
            color_copy_pipe  : vk::Pipeline::null(),
            tonemap_pipe     : vk::Pipeline::null(),
            descriptor_pools : FrameDescriptorPools::new(),
            depth_copy_ctx   : DrawContextId(0),
            color_copy_ctx   : DrawContextId(0),
            tonemap_ctx      : DrawContextId(0),
        };

        // Declare the default graph, then lower it to the render thread
        this.create_default_passes()?;
        this.rebuild_pass_graph()?;

        // And wire up the passes this system drives itself
        this.create_fullscreen_resources()?;

        debug!("Initialized RenderPipelineSystem v{} with {} passes over {} command buffers", env!("CARGO_PKG_VERSION"), this.passes.len(), this.cb_count);
        Ok(this)
    }



    /// Registers a new render pass.
    ///
    /// Passes get dense IDs in registration order. Registering does not make the pass execute yet; `rebuild_pass_graph()` recomputes the order, the command buffer split and the per-frame pass contexts.
    ///
    /// # Arguments
    /// - `info`: The declaration of the pass.
    ///
    /// # Returns
    /// The ID of the new pass.
    ///
    /// # Errors
    /// This function errors if the declaration exceeds the attachment or transition maxima, or if a dependency does not exist.
    pub fn create_render_pass(&mut self, info: RenderPassInfo) -> Result<RenderPassId, Error> {
        let id = RenderPassId(self.passes.len() as u32);

        // Enforce the declared maxima
        if info.attachments.len() > MAX_ATTACHMENTS { return Err(Error::TooManyAttachments{ name: info.name, count: info.attachments.len() }); }
        if info.transitions.len() > MAX_RENDER_PASS_TRANS { return Err(Error::TooManyTransitions{ name: info.name, count: info.transitions.len() }); }
        // Dependencies can only point at passes registered before this one
        for dep in &info.dependencies {
            if dep.0 as usize >= self.passes.len() { return Err(Error::InvalidDependency{ id, dep: *dep }); }
        }

        self.passes.push(RenderPass {
            deps        : info.dependencies,
            transitions : info.transitions,
            attachments : info.attachments,
            view_mask   : info.view_mask,
            label       : info.name,
        });
        Ok(id)
    }

    /// Returns the declared attachments of the given pass.
    ///
    /// # Errors
    /// This function errors if the pass ID is out of range.
    pub fn get_attachments(&self, pass: RenderPassId) -> Result<&[AttachmentInfo], Error> {
        match self.passes.get(pass.0 as usize) {
            Some(pass) => Ok(&pass.attachments),
            None       => Err(Error::InvalidPassId{ id: pass, pass_count: self.passes.len() as u32 }),
        }
    }



    /// Recomputes the execution order and the command buffer split, then rebuilds the per-frame pass contexts on the render thread.
    ///
    /// Call after registering passes (the constructor does) and never while the render loop is mid-frame.
    ///
    /// # Errors
    /// This function errors if the graph has unreachable passes or the render thread could not allocate the command buffers.
    pub fn rebuild_pass_graph(&mut self) -> Result<(), Error> {
        // Order, then split
        self.pass_order = sort_pass_graph(&self.passes)?;
        let (cb_indices, cb_count) = assign_command_buffers(&self.passes, &self.pass_order);
        self.cb_indices = cb_indices;
        self.cb_count   = cb_count;

        // The render thread records the passes over this many buffers (plus the upload buffer)
        if let Err(err) = self.thread.realloc_pass_command_buffers(self.cb_count) {
            return Err(Error::CommandBufferError{ err });
        }

        // And it needs the per-frame contexts to know what to record
        self.register_pass_contexts()?;
        Ok(())
    }

    /// Rebuilds every frame's pass contexts from the current pass list and render target catalog.
    fn register_pass_contexts(&self) -> Result<(), Error> {
        let target_system = self.target_system.borrow();

        for frame_idx in 0..self.thread.frames().len() {
            // Build the new contexts before taking the lock
            let mut contexts: Vec<PassContext> = Vec::with_capacity(self.pass_order.len());
            for (position, id) in self.pass_order.iter().enumerate() {
                let pass = &self.passes[*id as usize];

                // Patch the declared transitions with this frame's images
                let mut images: HashMap<RenderTargetId, vk::Image> = HashMap::with_capacity(pass.transitions.len());
                for transition in &pass.transitions {
                    let image = match target_system.get_image(frame_idx, transition.render_target) {
                        Ok(image) => image,
                        Err(err)  => { return Err(Error::TargetError{ err }); }
                    };
                    images.insert(transition.render_target, image);
                }
                let barriers = build_barriers(&pass.transitions, |target| images[&target]);

                // Resolve the attachments to this frame's views
                let mut attachments: Vec<AttachmentContext> = Vec::with_capacity(pass.attachments.len());
                for att in &pass.attachments {
                    let format = target_system.get_format(att.attachment).map_err(|err| Error::TargetError{ err })?;
                    let view   = target_system.get_mip_view(att.mip, frame_idx, att.attachment).map_err(|err| Error::TargetError{ err })?;
                    let is_depth = format == vk::Format::D32_SFLOAT;
                    attachments.push(AttachmentContext {
                        view,
                        layout      : if is_depth { vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL } else { vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL },
                        is_depth,
                        load_op     : att.load_op,
                        store_op    : att.store_op,
                        clear_value : att.clear_value,
                    });
                }

                // All attachments share the primary's extents
                let extent = match pass.attachments.first() {
                    Some(primary) => target_system.get_mip_extent(primary.mip, primary.attachment).map_err(|err| Error::TargetError{ err })?,
                    None          => vk::Extent3D{ width: 0, height: 0, depth: 1 },
                };

                contexts.push(PassContext {
                    id                   : *id,
                    command_buffer_index : self.cb_indices[position],

                    barriers,
                    attachments,

                    width       : extent.width,
                    height      : extent.height,
                    layer_count : 1,
                    view_mask   : pass.view_mask,

                    label : pass.label.into(),
                });
            }

            // Swap them in
            let mut state = self.thread.frame(frame_idx).state.lock().expect("Could not lock frame state");
            state.pass_contexts = contexts;
        }

        Ok(())
    }



    /// Registers a new draw context against a pass.
    ///
    /// # Generic arguments
    /// - `T`: The user record type that travels with every batch submitted against this context. Copied by value; the record callback reads it back through the RecordBuffer.
    ///
    /// # Arguments
    /// - `pass_id`: The pass this context draws in.
    /// - `record_fn`: The callback that records this context's draws.
    ///
    /// # Returns
    /// The ID of the new context.
    ///
    /// # Errors
    /// This function errors if the pass does not exist.
    pub fn register_draw_context<T: Copy>(&mut self, pass_id: RenderPassId, record_fn: RecordFn) -> Result<DrawContextId, Error> {
        if pass_id.0 as usize >= self.passes.len() { return Err(Error::InvalidPassId{ id: pass_id, pass_count: self.passes.len() as u32 }); }

        let id = DrawContextId(self.draw_ctx_count);
        for slot in self.thread.frames() {
            let mut state = slot.state.lock().expect("Could not lock frame state");
            state.draw_contexts.push(DrawContext::new(pass_id.0, mem::size_of::<T>(), record_fn));
        }
        self.draw_ctx_count += 1;

        debug!("Registered draw context {} against pass {}", id, pass_id);
        Ok(id)
    }

    /// Submits draw batches against a draw context for the current frame.
    ///
    /// Batches within one call keep their order; later calls append after earlier ones. Every batch's user record is copied by value into frame-owned storage, so the caller may drop its records right after this returns.
    ///
    /// # Generic arguments
    /// - `T`: The user record type; must be the type the context was registered with.
    ///
    /// # Arguments
    /// - `draw_ctx`: The context to submit against.
    /// - `batches`: The draw batches.
    /// - `records`: One user record per batch.
    ///
    /// # Errors
    /// This function errors if the context does not exist or the batch and record counts differ.
    pub fn issue_draw_batch<T: Copy>(&self, draw_ctx: DrawContextId, batches: &[DrawBatch], records: &[T]) -> Result<(), Error> {
        if batches.len() != records.len() { return Err(Error::BatchCountMismatch{ batches: batches.len(), records: records.len() }); }

        let frame_idx = self.render_system.borrow().frame_idx();
        let mut state = self.thread.frame(frame_idx).state.lock().expect("Could not lock frame state");
        let ctx = match state.draw_contexts.get_mut(draw_ctx.0 as usize) {
            Some(ctx) => ctx,
            None      => { return Err(Error::InvalidDrawContextId{ id: draw_ctx, ctx_count: self.draw_ctx_count }); }
        };

        for (batch, record) in batches.iter().zip(records.iter()) {
            ctx.batches.push(*batch);
            ctx.records.push(record);
        }
        Ok(())
    }



    /// Adjusts the pipeline to a resized swapchain.
    ///
    /// Reimports the render target catalog, rebuilds every frame's pass contexts against the new images and views, and drops any draw batches that were still in flight (their descriptors point at destroyed resources).
    ///
    /// # Errors
    /// This function errors if the catalog or the contexts could not be rebuilt.
    pub fn on_swapchain_resize(&mut self) -> Result<(), Error> {
        // The catalog first; the contexts are derived from it
        if let Err(err) = self.target_system.borrow_mut().reimport_swapchain() {
            return Err(Error::TargetError{ err });
        }
        self.register_pass_contexts()?;

        // Any batches that referenced the old views are now invalid
        for slot in self.thread.frames() {
            let mut state = slot.state.lock().expect("Could not lock frame state");
            for ctx in &mut state.draw_contexts {
                ctx.batches.clear();
                ctx.records.clear();
            }
        }

        Ok(())
    }



    /// Registers the default pass graph: prepass, environment lighting, shadows, scene color, copies, post processing and UI.
    ///
    /// The transitions mirror how each target flows through the frame; the dependencies keep everything chained to the prepass, which the sort requires as its single root.
    fn create_default_passes(&mut self) -> Result<(), Error> {
        const FRAG: vk::PipelineStageFlags = vk::PipelineStageFlags::FRAGMENT_SHADER;
        let (env_cube, irradiance_map, prefiltered_cube, opaque_depth, opaque_normal, hdr_color, depth_copy, color_copy, swapchain_target, shadow_maps, brightness_downsample) = {
            let targets = self.target_system.borrow();
            (targets.env_cube, targets.irradiance_map, targets.prefiltered_cube, targets.depth_buffer, targets.normal_buffer, targets.hdr_color, targets.depth_buffer_copy, targets.color_copy, targets.swapchain, targets.shadow_maps, targets.brightness_downsample)
        };

        // Create opaque depth normal pass
        self.opaque_depth_normal_pass = self.create_render_pass(RenderPassInfo {
            transitions : vec![
                transition(opaque_depth, vk::PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                           vk::AccessFlags::empty(), vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                           vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::DEPTH, 1, 1),
                transition(opaque_normal, vk::PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                           vk::AccessFlags::empty(), vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                           vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1),
            ],
            attachments : vec![
                attachment(opaque_depth, 0, vk::AttachmentLoadOp::CLEAR, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
                attachment(opaque_normal, 0, vk::AttachmentLoadOp::CLEAR, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
            ],
            name : "Opaque Depth Normal Pass",
            ..Default::default()
        })?;

        // Create env capture pass
        self.env_capture_pass = self.create_render_pass(RenderPassInfo {
            view_mask    : 0x0000003F, // 0b00111111
            dependencies : vec![ self.opaque_depth_normal_pass ],
            transitions  : vec![
                transition(env_cube, FRAG, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                           vk::AccessFlags::empty(), vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                           vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 6),
            ],
            attachments : vec![
                attachment(env_cube, 0, vk::AttachmentLoadOp::CLEAR, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
            ],
            name : "Env Capture Pass",
        })?;

        // Create irradiance convolution pass
        self.irradiance_pass = self.create_render_pass(RenderPassInfo {
            view_mask    : 0x0000003F,
            dependencies : vec![ self.env_capture_pass ],
            transitions  : vec![
                transition(env_cube, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, FRAG,
                           vk::AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::SHADER_READ,
                           vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 6),
                transition(irradiance_map, FRAG, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                           vk::AccessFlags::empty(), vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                           vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 6),
            ],
            attachments : vec![
                attachment(irradiance_map, 0, vk::AttachmentLoadOp::DONT_CARE, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
            ],
            name : "Irradiance Pass",
        })?;

        // Create environment prefiltering passes, one per mip; the layout transition covers all mips up front
        for i in 0..PREFILTER_MIP_COUNT {
            let transitions = if i == 0 {
                vec![
                    transition(prefiltered_cube, FRAG, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                               vk::AccessFlags::empty(), vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                               vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::COLOR, PREFILTER_MIP_COUNT, 6),
                ]
            } else {
                vec![]
            };
            self.prefilter_passes[i as usize] = self.create_render_pass(RenderPassInfo {
                view_mask    : 0x0000003F,
                dependencies : vec![ self.env_capture_pass ],
                transitions,
                attachments  : vec![
                    attachment(prefiltered_cube, i, vk::AttachmentLoadOp::DONT_CARE, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
                ],
                name : "Prefilter Pass",
            })?;
        }

        // Create shadow passes; all cascades transition up front on the first one.
        // Note: these don't actually consume the prepass, but the pass dependency
        // system has a single starter node, so everything must be a child of it.
        for i in 0..CASCADE_COUNT {
            let transitions = if i == 0 {
                shadow_maps.iter().map(|cascade| {
                    transition(*cascade, FRAG, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                               vk::AccessFlags::empty(), vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                               vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::DEPTH, 1, 1)
                }).collect()
            } else {
                vec![]
            };
            self.shadow_passes[i] = self.create_render_pass(RenderPassInfo {
                dependencies : vec![ self.opaque_depth_normal_pass ],
                transitions,
                attachments  : vec![
                    attachment(shadow_maps[i], 0, vk::AttachmentLoadOp::CLEAR, vk::AttachmentStoreOp::STORE, vk::ClearValue{ depth_stencil: vk::ClearDepthStencilValue{ depth: 1.0, stencil: 0 } }),
                ],
                name : "Shadow Pass",
                ..Default::default()
            })?;
        }

        // Create opaque color pass: everything the lighting samples becomes readable here
        {
            let mut transitions: Vec<PassTransition> = shadow_maps.iter().map(|cascade| {
                transition(*cascade, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, FRAG,
                           vk::AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::SHADER_READ,
                           vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageAspectFlags::DEPTH, 1, 1)
            }).collect();
            transitions.push(transition(irradiance_map, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, FRAG,
                                        vk::AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::SHADER_READ,
                                        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 6));
            transitions.push(transition(prefiltered_cube, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, FRAG,
                                        vk::AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::SHADER_READ,
                                        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageAspectFlags::COLOR, PREFILTER_MIP_COUNT, 6));
            transitions.push(transition(hdr_color, FRAG, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                                        vk::AccessFlags::empty(), vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                                        vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1));
            transitions.push(transition(opaque_normal, FRAG, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                                        vk::AccessFlags::empty(), vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                                        vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1));

            self.opaque_color_pass = self.create_render_pass(RenderPassInfo {
                dependencies : vec![ self.opaque_depth_normal_pass, self.shadow_passes[CASCADE_COUNT - 1] ],
                transitions,
                attachments  : vec![
                    attachment(hdr_color, 0, vk::AttachmentLoadOp::CLEAR, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
                    attachment(opaque_depth, 0, vk::AttachmentLoadOp::LOAD, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
                ],
                name : "Opaque Color Pass",
                ..Default::default()
            })?;
        }

        // Create sky pass
        self.sky_pass = self.create_render_pass(RenderPassInfo {
            dependencies : vec![ self.opaque_depth_normal_pass, self.opaque_color_pass ],
            attachments  : vec![
                attachment(hdr_color, 0, vk::AttachmentLoadOp::LOAD, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
                attachment(opaque_depth, 0, vk::AttachmentLoadOp::LOAD, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
            ],
            name : "Sky Pass",
            ..Default::default()
        })?;

        // Create opaque depth copy pass
        self.depth_copy_pass = self.create_render_pass(RenderPassInfo {
            dependencies : vec![ self.sky_pass ],
            transitions  : vec![
                transition(opaque_depth, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS, FRAG,
                           vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE, vk::AccessFlags::SHADER_READ,
                           vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageAspectFlags::DEPTH, 1, 1),
                transition(depth_copy, FRAG, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                           vk::AccessFlags::SHADER_READ, vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                           vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1),
            ],
            attachments : vec![
                attachment(depth_copy, 0, vk::AttachmentLoadOp::DONT_CARE, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
            ],
            name : "Depth Copy Pass",
            ..Default::default()
        })?;

        // Create opaque color copy pass
        self.color_copy_pass = self.create_render_pass(RenderPassInfo {
            dependencies : vec![ self.depth_copy_pass ],
            transitions  : vec![
                transition(hdr_color, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, FRAG,
                           vk::AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::SHADER_READ,
                           vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1),
                transition(color_copy, FRAG, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                           vk::AccessFlags::SHADER_READ, vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                           vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1),
            ],
            attachments : vec![
                attachment(color_copy, 0, vk::AttachmentLoadOp::DONT_CARE, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
            ],
            name : "Color Copy Pass",
            ..Default::default()
        })?;

        // Create transparent depth pass; must transition back to depth so that we can load the contents
        self.transparent_depth_pass = self.create_render_pass(RenderPassInfo {
            dependencies : vec![ self.color_copy_pass ],
            transitions  : vec![
                transition(opaque_depth, FRAG, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                           vk::AccessFlags::SHADER_READ, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                           vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::DEPTH, 1, 1),
            ],
            attachments : vec![
                attachment(opaque_depth, 0, vk::AttachmentLoadOp::LOAD, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
            ],
            name : "Transparent Depth Pass",
            ..Default::default()
        })?;

        // Create transparent color pass
        self.transparent_color_pass = self.create_render_pass(RenderPassInfo {
            dependencies : vec![ self.transparent_depth_pass ],
            transitions  : vec![
                transition(hdr_color, FRAG, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                           vk::AccessFlags::SHADER_READ, vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                           vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1),
                transition(color_copy, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, FRAG,
                           vk::AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::SHADER_READ,
                           vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1),
                transition(depth_copy, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, FRAG,
                           vk::AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::SHADER_READ,
                           vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1),
            ],
            attachments : vec![
                attachment(hdr_color, 0, vk::AttachmentLoadOp::LOAD, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
                attachment(opaque_depth, 0, vk::AttachmentLoadOp::LOAD, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
            ],
            name : "Transparent Color Pass",
            ..Default::default()
        })?;

        // Create brightness pass
        self.brightness_pass = self.create_render_pass(RenderPassInfo {
            dependencies : vec![ self.transparent_color_pass ],
            transitions  : vec![
                transition(hdr_color, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, FRAG,
                           vk::AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::SHADER_READ,
                           vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1),
                transition(brightness_downsample, FRAG, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                           vk::AccessFlags::empty(), vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                           vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1),
            ],
            attachments : vec![
                attachment(brightness_downsample, 0, vk::AttachmentLoadOp::CLEAR, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
            ],
            name : "Brightness Pass",
            ..Default::default()
        })?;

        // Create tonemapping pass
        self.tonemap_pass = self.create_render_pass(RenderPassInfo {
            dependencies : vec![ self.brightness_pass ],
            attachments  : vec![
                attachment(swapchain_target, 0, vk::AttachmentLoadOp::LOAD, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
            ],
            name : "Tonemap Pass",
            ..Default::default()
        })?;

        // Create UI pass
        self.ui_pass = self.create_render_pass(RenderPassInfo {
            dependencies : vec![ self.tonemap_pass ],
            transitions  : vec![
                transition(hdr_color, FRAG, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                           vk::AccessFlags::SHADER_READ, vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                           vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageAspectFlags::COLOR, 1, 1),
            ],
            attachments : vec![
                attachment(swapchain_target, 0, vk::AttachmentLoadOp::LOAD, vk::AttachmentStoreOp::STORE, vk::ClearValue::default()),
            ],
            name : "UI Pass",
            ..Default::default()
        })?;

        Ok(())
    }

    /// Creates the sampler, layouts, pipelines and draw contexts for the internally-driven fullscreen passes.
    fn create_fullscreen_resources(&mut self) -> Result<(), Error> {
        let render_system = self.render_system.borrow();
        let target_system = self.target_system.borrow();

        // The shared sampler, baked into the set layout as an immutable sampler
        let sampler_info = vk::SamplerCreateInfo {
            s_type : vk::StructureType::SAMPLER_CREATE_INFO,
            p_next : ptr::null(),
            flags  : vk::SamplerCreateFlags::empty(),

            mag_filter  : vk::Filter::LINEAR,
            min_filter  : vk::Filter::LINEAR,
            mipmap_mode : vk::SamplerMipmapMode::LINEAR,

            address_mode_u : vk::SamplerAddressMode::REPEAT,
            address_mode_v : vk::SamplerAddressMode::REPEAT,
            address_mode_w : vk::SamplerAddressMode::REPEAT,

            mip_lod_bias       : 0.0,
            anisotropy_enable  : vk::FALSE,
            max_anisotropy     : 1.0,
            compare_enable     : vk::FALSE,
            compare_op         : vk::CompareOp::NEVER,
            min_lod            : 0.0,
            max_lod            : 1.0,
            border_color       : vk::BorderColor::FLOAT_OPAQUE_BLACK,
            unnormalized_coordinates : vk::FALSE,
        };
        self.sampler = render_system.create_sampler(&sampler_info, "Fullscreen Copy Sampler").map_err(|err| Error::ResourceError{ what: "fullscreen sampler", err })?;

        // One sampled image plus the immutable sampler
        let bindings = [
            vk::DescriptorSetLayoutBinding {
                binding              : 0,
                descriptor_type      : vk::DescriptorType::SAMPLED_IMAGE,
                descriptor_count     : 1,
                stage_flags          : vk::ShaderStageFlags::FRAGMENT,
                p_immutable_samplers : ptr::null(),
            },
            vk::DescriptorSetLayoutBinding {
                binding              : 1,
                descriptor_type      : vk::DescriptorType::SAMPLER,
                descriptor_count     : 1,
                stage_flags          : vk::ShaderStageFlags::FRAGMENT,
                p_immutable_samplers : &self.sampler,
            },
        ];
        let set_layout_info = vk::DescriptorSetLayoutCreateInfo {
            s_type : vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
            p_next : ptr::null(),
            flags  : vk::DescriptorSetLayoutCreateFlags::empty(),

            binding_count : bindings.len() as u32,
            p_bindings    : bindings.as_ptr(),
        };
        self.copy_set_layout = render_system.create_set_layout(&set_layout_info, "Fullscreen Copy Set Layout").map_err(|err| Error::ResourceError{ what: "fullscreen set layout", err })?;

        let pipe_layout_info = vk::PipelineLayoutCreateInfo {
            s_type : vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            p_next : ptr::null(),
            flags  : vk::PipelineLayoutCreateFlags::empty(),

            set_layout_count : 1,
            p_set_layouts    : &self.copy_set_layout,

            push_constant_range_count : 0,
            p_push_constant_ranges    : ptr::null(),
        };
        self.copy_pipe_layout = render_system.create_pipeline_layout(&pipe_layout_info, "Fullscreen Copy Pipeline Layout").map_err(|err| Error::ResourceError{ what: "fullscreen pipeline layout", err })?;

        // Each pipeline renders to its pass's single attachment, whose format comes from the catalog
        let depth_copy_format = target_system.get_format(self.get_attachments(self.depth_copy_pass)?[0].attachment).map_err(|err| Error::TargetError{ err })?;
        let color_copy_format = target_system.get_format(self.get_attachments(self.color_copy_pass)?[0].attachment).map_err(|err| Error::TargetError{ err })?;
        let swap_format       = target_system.get_format(self.get_attachments(self.tonemap_pass)?[0].attachment).map_err(|err| Error::TargetError{ err })?;
        self.depth_copy_pipe = fullscreen::create_fullscreen_pipeline(&render_system, depth_copy_format, self.copy_pipe_layout, "depthcopy.vert.spv", "depthcopy.frag.spv", "Depth Copy Pipeline")?;
        self.color_copy_pipe = fullscreen::create_fullscreen_pipeline(&render_system, color_copy_format, self.copy_pipe_layout, "colorcopy.vert.spv", "colorcopy.frag.spv", "Color Copy Pipeline")?;
        self.tonemap_pipe    = fullscreen::create_fullscreen_pipeline(&render_system, swap_format, self.copy_pipe_layout, "tonemap.vert.spv", "tonemap.frag.spv", "Tonemapping Pipeline")?;

        // And the contexts their draws get submitted against
        drop(render_system);
        drop(target_system);
        self.depth_copy_ctx = self.register_draw_context::<FullscreenBatch>(self.depth_copy_pass, fullscreen::record_depth_copy)?;
        self.color_copy_ctx = self.register_draw_context::<FullscreenBatch>(self.color_copy_pass, fullscreen::record_color_copy)?;
        self.tonemap_ctx    = self.register_draw_context::<FullscreenBatch>(self.tonemap_pass, fullscreen::record_tonemapping)?;

        Ok(())
    }



    /// Runs one frame of the pipeline itself: clears the frame's batches, refreshes the fullscreen descriptor sets and issues the internally-driven draws.
    fn tick_internal(&mut self) -> Result<(), Error> {
        let render_system = self.render_system.borrow();
        let frame_idx = render_system.frame_idx();

        // Whatever this slot drew a lap ago is stale now
        {
            let mut state = self.thread.frame(frame_idx).state.lock().expect("Could not lock frame state");
            for ctx in &mut state.draw_contexts {
                ctx.batches.clear();
                ctx.records.clear();
            }
        }

        // Make sure this frame's descriptor pool holds our sets
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty               : vk::DescriptorType::SAMPLED_IMAGE,
                descriptor_count : FULLSCREEN_SET_COUNT * 2,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo {
            s_type : vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            p_next : ptr::null(),
            flags  : vk::DescriptorPoolCreateFlags::empty(),

            max_sets        : FULLSCREEN_SET_COUNT * 2,
            pool_size_count : pool_sizes.len() as u32,
            p_pool_sizes    : pool_sizes.as_ptr(),
        };
        let layouts = [ self.copy_set_layout, self.copy_set_layout ];
        render_system.frame_desc_pool_tick(&pool_info, &layouts, &mut self.descriptor_pools, FULLSCREEN_SET_COUNT).map_err(|err| Error::ResourceError{ what: "fullscreen descriptor sets", err })?;

        let depth_set = render_system.frame_desc_pool_get_set(&self.descriptor_pools, 0);
        let color_set = render_system.frame_desc_pool_get_set(&self.descriptor_pools, 1);

        // Point the sets at this frame's depth buffer and HDR color output
        {
            let target_system = self.target_system.borrow();
            let depth_view = target_system.get_view(frame_idx, target_system.depth_buffer).map_err(|err| Error::TargetError{ err })?;
            let color_view = target_system.get_view(frame_idx, target_system.hdr_color).map_err(|err| Error::TargetError{ err })?;

            let image_infos = [
                vk::DescriptorImageInfo {
                    sampler      : vk::Sampler::null(),
                    image_view   : depth_view,
                    image_layout : vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                },
                vk::DescriptorImageInfo {
                    sampler      : vk::Sampler::null(),
                    image_view   : color_view,
                    image_layout : vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                },
            ];
            let writes = [
                vk::WriteDescriptorSet {
                    s_type : vk::StructureType::WRITE_DESCRIPTOR_SET,
                    p_next : ptr::null(),

                    dst_set           : depth_set,
                    dst_binding       : 0,
                    dst_array_element : 0,
                    descriptor_count  : 1,
                    descriptor_type   : vk::DescriptorType::SAMPLED_IMAGE,

                    p_image_info        : &image_infos[0],
                    p_buffer_info       : ptr::null(),
                    p_texel_buffer_view : ptr::null(),
                },
                vk::WriteDescriptorSet {
                    s_type : vk::StructureType::WRITE_DESCRIPTOR_SET,
                    p_next : ptr::null(),

                    dst_set           : color_set,
                    dst_binding       : 0,
                    dst_array_element : 0,
                    descriptor_count  : 1,
                    descriptor_type   : vk::DescriptorType::SAMPLED_IMAGE,

                    p_image_info        : &image_infos[1],
                    p_buffer_info       : ptr::null(),
                    p_texel_buffer_view : ptr::null(),
                },
            ];
            unsafe { self.thread.device().update_descriptor_sets(&writes, &[]); }
        }

        // Issue the fullscreen draws at the swapchain's size
        let extent = self.thread.swapchain().read().expect("Could not lock swapchain").extent();
        let (width, height) = (extent.width, extent.height);

        // Depth copy pass
        self.issue_draw_batch(self.depth_copy_ctx, &[ DrawBatch {
            pipeline : self.depth_copy_pipe,
            layout   : self.copy_pipe_layout,
            viewport : fullscreen::fullscreen_viewport(width, height),
            scissor  : fullscreen::fullscreen_scissor(width, height),
        } ], &[ FullscreenBatch{ set: depth_set } ])?;
        // Color copy pass
        self.issue_draw_batch(self.color_copy_ctx, &[ DrawBatch {
            pipeline : self.color_copy_pipe,
            layout   : self.copy_pipe_layout,
            viewport : fullscreen::fullscreen_viewport(width, height),
            scissor  : fullscreen::fullscreen_scissor(width, height),
        } ], &[ FullscreenBatch{ set: color_set } ])?;
        // Tonemapping pass
        self.issue_draw_batch(self.tonemap_ctx, &[ DrawBatch {
            pipeline : self.tonemap_pipe,
            layout   : self.copy_pipe_layout,
            viewport : fullscreen::flipped_viewport(width, height),
            scissor  : fullscreen::fullscreen_scissor(width, height),
        } ], &[ FullscreenBatch{ set: color_set } ])?;

        Ok(())
    }
}

impl System for RenderPipelineSystem {
    #[inline]
    fn id(&self) -> SystemId { RENDER_PIPELINE_SYSTEM_ID }

    fn tick(&mut self, _delta_seconds: f32) -> Result<(), Box<dyn StdError>> {
        self.tick_internal().map_err(|err| Box::new(err) as Box<dyn StdError>)
    }
}

impl Drop for RenderPipelineSystem {
    fn drop(&mut self) {
        let render_system = self.render_system.borrow();

        render_system.destroy_pipeline(self.depth_copy_pipe);
        render_system.destroy_pipeline(self.color_copy_pipe);
        render_system.destroy_pipeline(self.tonemap_pipe);
        render_system.destroy_pipeline_layout(self.copy_pipe_layout);
        render_system.destroy_set_layout(self.copy_set_layout);
        render_system.destroy_sampler(self.sampler);

        for pool in &self.descriptor_pools.pools {
            if pool.set_pool != vk::DescriptorPool::null() {
                render_system.destroy_descriptor_pool(pool.set_pool);
            }
        }
    }
}
