//  SPEC.rs
//    by Lut99
//
//  Created:
//    15 Oct 2022, 13:40:11
//  Last edited:
//    14 Jan 2023, 16:44:36
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines (public) interfaces and structs for the `sail-tgt` crate.
//

use std::fmt::{Display, Formatter, Result as FResult};

use ash::vk;


/***** LIBRARY *****/
/// Identifies a render target in the catalog.
///
/// IDs are dense and assigned in catalog registration order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RenderTargetId(pub u32);

impl Display for RenderTargetId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{}", self.0)
    }
}



/// Determines how a render target's size follows the surface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TargetSize {
    /// The target has a fixed size, independent of the window
    Absolute{ width: u32, height: u32 },
    /// The target follows the swapchain's size, divided by the given factor (1 = same size)
    SwapchainRelative{ divisor: u32 },
}



/// Describes a render target before it is created.
#[derive(Clone, Copy, Debug)]
pub struct TargetDescriptor {
    /// A (debug) name for the target
    pub name : &'static str,

    /// The format of the target's images
    pub format      : vk::Format,
    /// The size rule for the target
    pub size        : TargetSize,
    /// The number of mip levels
    pub mip_count   : u32,
    /// The number of array layers (6 for the cube targets)
    pub layer_count : u32,

    /// How the target's images will be used
    pub usage     : vk::ImageUsageFlags,
    /// The aspect its views cover
    pub aspect    : vk::ImageAspectFlags,
    /// The type of the default view
    pub view_type : vk::ImageViewType,
}
