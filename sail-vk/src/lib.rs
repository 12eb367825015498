/* LIB.rs
 *   by Lut99
 *
 * Created:
 *   24 Sep 2022, 14:12:50
 * Last edited:
 *   11 Jan 2023, 21:14:36
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Entrypoint to our own wrapper around Vulkan.
**/

/// The module for the errors of this crate.
pub mod errors;
/// The module for the instance
pub mod instance;
/// The module for the debug messenger
pub mod debug;
/// The module for the device
pub mod device;
/// The module for the surface
pub mod surface;
/// The module for the swapchain
pub mod swapchain;
/// The module that contains synchronization primitives
pub mod sync;
