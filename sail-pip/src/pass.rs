//  PASS.rs
//    by Lut99
//
//  Created:
//    22 Oct 2022, 14:20:13
//  Last edited:
//    14 Jan 2023, 18:14:31
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the stored representation of a registered render pass, and
//!   the patching of its declared transitions into per-frame barriers
//!   with concrete image handles.
//

use ash::vk;

use sail_thr::spec::ImageTransition;
use sail_tgt::RenderTargetId;

use crate::spec::{AttachmentInfo, PassTransition, RenderPassId};


/***** LIBRARY *****/
/// A registered render pass, as stored by the pipeline system.
#[derive(Clone)]
pub struct RenderPass {
    /// The passes that must execute before this one
    pub deps        : Vec<RenderPassId>,
    /// The pre-pass barriers, still by target name
    pub transitions : Vec<PassTransition>,
    /// The declared attachments
    pub attachments : Vec<AttachmentInfo>,
    /// The multiview mask (0 for no multiview)
    pub view_mask   : u32,
    /// A debug label
    pub label       : &'static str,
}



/// Patches a pass's declared transitions into concrete barriers by resolving every target to its image for one frame index.
///
/// # Arguments
/// - `transitions`: The declared transitions of the pass.
/// - `resolve`: Resolves a target ID to the image backing it for the frame in question.
///
/// # Returns
/// One ImageTransition per declared transition, in declaration order.
pub fn build_barriers<F: Fn(RenderTargetId) -> vk::Image>(transitions: &[PassTransition], resolve: F) -> Vec<ImageTransition> {
    transitions.iter().map(|transition| ImageTransition {
        src_stage  : transition.src_stage,
        dst_stage  : transition.dst_stage,
        src_access : transition.src_access,
        dst_access : transition.dst_access,
        old_layout : transition.old_layout,
        new_layout : transition.new_layout,
        range      : transition.range,
        image      : resolve(transition.render_target),
    }).collect()
}





/***** TESTS *****/
#[cfg(test)]
mod test {
    use ash::vk::Handle;

    use super::*;

    /// Builds a transition against the given target.
    fn depth_transition(target: RenderTargetId) -> PassTransition {
        PassTransition {
            render_target : target,
            src_stage     : vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            dst_stage     : vk::PipelineStageFlags::FRAGMENT_SHADER,
            src_access    : vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access    : vk::AccessFlags::SHADER_READ,
            old_layout    : vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            new_layout    : vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            range         : vk::ImageSubresourceRange{ aspect_mask: vk::ImageAspectFlags::DEPTH, base_mip_level: 0, level_count: 1, base_array_layer: 0, layer_count: 1 },
        }
    }


    /// Tests that barriers carry the image the resolver hands out, and that re-patching replaces it (like a swapchain resize does).
    #[test]
    fn test_barrier_patching() {
        let transitions = vec![ depth_transition(RenderTargetId(0)), depth_transition(RenderTargetId(1)) ];

        // The "old" catalog
        let barriers = build_barriers(&transitions, |id| vk::Image::from_raw(0x1000 + id.0 as u64));
        assert_eq!(barriers.len(), 2);
        assert_eq!(barriers[0].image, vk::Image::from_raw(0x1000));
        assert_eq!(barriers[1].image, vk::Image::from_raw(0x1001));

        // After a resize, the catalog hands out new images; re-patching must pick them all up
        let barriers = build_barriers(&transitions, |id| vk::Image::from_raw(0x2000 + id.0 as u64));
        assert_eq!(barriers[0].image, vk::Image::from_raw(0x2000));
        assert_eq!(barriers[1].image, vk::Image::from_raw(0x2001));

        // The rest of the barrier is carried over verbatim
        assert_eq!(barriers[0].src_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
        assert_eq!(barriers[0].new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }
}
