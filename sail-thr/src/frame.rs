//  FRAME.rs
//    by Lut99
//
//  Created:
//    01 Oct 2022, 12:02:17
//  Last edited:
//    14 Jan 2023, 13:55:33
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the per-frame states of the render thread. Every frame slot
//!   couples two counting semaphores (the handoff protocol) with a
//!   mutex-guarded FrameState (the data being handed off).
//

use std::sync::Mutex;

use ash::vk;
use gpu_allocator::vulkan::Allocation;

use sail_vk::sync::{Fence, Semaphore as VkSemaphore};

use crate::semaphore::Semaphore;
use crate::spec::{BufferCopy, BufferImageCopy, DrawContext, PassContext};


/***** LIBRARY *****/
/// The data of a single frame in flight.
///
/// The main thread fills the pass contexts, draw contexts and upload queues; the render thread records and submits them. Exclusion is by the frame protocol (the slot's semaphores); the mutex is the belt to that suspenders.
pub struct FrameState {
    /// The command pool all of this frame's command buffers come from
    pub command_pool    : vk::CommandPool,
    /// The command buffers for this frame; index 0 carries the uploads, the rest carry the passes
    pub command_buffers : Vec<vk::CommandBuffer>,
    /// The semaphores that chain this frame's submits together (one per command buffer)
    pub chain_sems      : Vec<VkSemaphore>,

    /// Signalled when the swapchain image is actually acquired
    pub img_acquired_sem    : VkSemaphore,
    /// Signalled when all of this frame's work is done, waited on by the present
    pub render_complete_sem : VkSemaphore,
    /// The fence that tells us the frame's previous submission has fully retired
    pub fence           : Fence,
    /// Whether the fence has a submission pending on it
    pub fence_in_flight : bool,

    /// The index of the swapchain image this frame acquired
    pub swapchain_image_index : u32,

    /// The GPU-side mirror of the main thread's temporary host buffer
    pub tmp_gpu_buffer : vk::Buffer,
    /// The allocation backing the temporary GPU buffer
    pub tmp_gpu_alloc  : Option<Allocation>,

    /// The render thread's view of the registered passes, in execution order
    pub pass_contexts : Vec<PassContext>,
    /// The registered draw contexts with this frame's batches
    pub draw_contexts : Vec<DrawContext>,

    /// The buffer-to-buffer uploads handed off for this frame
    pub buf_copy_queue     : Vec<BufferCopy>,
    /// The buffer-to-image uploads handed off for this frame
    pub buf_img_copy_queue : Vec<BufferImageCopy>,
}



/// One of the frame slots of the render thread.
pub struct FrameSlot {
    /// Posted by the main thread when the frame is prepared; initial count 1
    pub wait   : Semaphore,
    /// Posted by the render thread when the frame is done; initial count 0
    pub signal : Semaphore,
    /// The frame data itself
    pub state  : Mutex<FrameState>,
}
