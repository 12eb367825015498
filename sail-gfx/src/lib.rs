/* LIB.rs
 *   by Lut99
 *
 * Created:
 *   08 Oct 2022, 10:21:14
 * Last edited:
 *   14 Jan 2023, 15:02:48
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Entrypoint for the render system crate: the device-facing resource
 *   factory with per-frame linear staging and upload queues.
**/

use sail_ecs::SystemId;

/// The module for the errors of this crate.
pub mod errors;
/// The module with the buffer/image handle types and the upload queues.
pub mod spec;
/// The module with the per-frame linear staging buffer.
pub mod staging;
/// The module with the per-frame descriptor pools.
pub mod descpool;
/// The module with the render system itself.
pub mod system;

// Bring some components into the general package namespace
pub use spec::{GpuBuffer, GpuImage, HostBuffer, HostBufferSlice, UploadQueues};
pub use staging::TmpHostBuffer;
pub use descpool::{FrameDescriptorPool, FrameDescriptorPools};
pub use system::RenderSystem;


/***** CONSTANTS *****/
/// The ID the render system registers in the World with.
pub const RENDER_SYSTEM_ID: SystemId = SystemId::new(1);
