//  LIB.rs
//    by Lut99
//
//  Created:
//    01 Oct 2022, 11:05:47
//  Last edited:
//    14 Jan 2023, 12:21:09
//  Auto updated?
//    Yes
//
//  Description:
//!   Entrypoint for the render thread crate. The render thread owns the
//!   Vulkan device objects and runs the GPU submission loop; the main
//!   thread talks to it through per-frame counting semaphores and
//!   mutex-guarded frame states.
//

/// The module for the errors of this crate.
pub mod errors;
/// The module with the counting semaphore the frame handoff is built on.
pub mod semaphore;
/// The module with the cross-thread data model (pass contexts, draw contexts, upload requests).
pub mod spec;
/// The module with the per-frame states.
pub mod frame;
/// The module with the render thread itself.
pub mod thread;

// Bring some components into the general package namespace
pub use spec::{AttachmentContext, BufferCopy, BufferImageCopy, DrawBatch, DrawContext, ImageTransition, PassContext, RecordBuffer, RecordFn, MAX_FRAME_STATES, TMP_BUFFER_SIZE};
pub use frame::{FrameSlot, FrameState};
pub use thread::RenderThread;
