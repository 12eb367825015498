//  SPEC.rs
//    by Lut99
//
//  Created:
//    22 Oct 2022, 14:02:29
//  Last edited:
//    14 Jan 2023, 18:08:55
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines (public) interfaces and structs for the `sail-pip` crate:
//!   the pass and draw-context identifiers and the create infos callers
//!   declare passes with.
//

use std::fmt::{Display, Formatter, Result as FResult};

use ash::vk;

use sail_tgt::RenderTargetId;


/***** LIBRARY *****/
/// Identifies a registered render pass.
///
/// IDs are dense and assigned in registration order; pass 0 is the root of the dependency graph.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RenderPassId(pub u32);

impl Display for RenderPassId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{}", self.0)
    }
}



/// Identifies a registered draw context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DrawContextId(pub u32);

impl Display for DrawContextId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{}", self.0)
    }
}



/// A pre-pass image memory barrier, declared against a named render target.
///
/// The concrete image handle is patched in per frame index when the pass contexts are built (and re-patched on resize).
#[derive(Clone, Copy, Debug)]
pub struct PassTransition {
    /// The target whose image the barrier applies to
    pub render_target : RenderTargetId,

    /// The source pipeline stages to wait on
    pub src_stage  : vk::PipelineStageFlags,
    /// The destination pipeline stages that wait
    pub dst_stage  : vk::PipelineStageFlags,
    /// The source access mask
    pub src_access : vk::AccessFlags,
    /// The destination access mask
    pub dst_access : vk::AccessFlags,
    /// The layout the image is in before the barrier
    pub old_layout : vk::ImageLayout,
    /// The layout the image is in after the barrier
    pub new_layout : vk::ImageLayout,
    /// The subresource range the barrier applies to
    pub range      : vk::ImageSubresourceRange,
}



/// One declared attachment of a pass.
#[derive(Clone, Copy)]
pub struct AttachmentInfo {
    /// The target to attach
    pub attachment  : RenderTargetId,
    /// The mip of the target to render into
    pub mip         : u32,
    /// What to do with the attachment's previous contents
    pub load_op     : vk::AttachmentLoadOp,
    /// What to do with the attachment's new contents
    pub store_op    : vk::AttachmentStoreOp,
    /// The clear value, if the load op clears
    pub clear_value : vk::ClearValue,
}

impl Default for AttachmentInfo {
    fn default() -> Self {
        Self {
            attachment  : RenderTargetId(0),
            mip         : 0,
            load_op     : vk::AttachmentLoadOp::DONT_CARE,
            store_op    : vk::AttachmentStoreOp::STORE,
            clear_value : vk::ClearValue::default(),
        }
    }
}



/// Everything a caller declares to register a render pass.
#[derive(Clone, Default)]
pub struct RenderPassInfo {
    /// The multiview mask (0 for no multiview)
    pub view_mask : u32,

    /// The passes that must execute before this one
    pub dependencies : Vec<RenderPassId>,
    /// The pre-pass barriers
    pub transitions  : Vec<PassTransition>,
    /// The attachments, primary first (the primary decides the framebuffer extent)
    pub attachments  : Vec<AttachmentInfo>,

    /// A debug label for the pass
    pub name : &'static str,
}
