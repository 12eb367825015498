//  ERRORS.rs
//    by Lut99
//
//  Created:
//    15 Oct 2022, 13:34:49
//  Last edited:
//    14 Jan 2023, 16:41:27
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the errors for the render target crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};

use crate::spec::RenderTargetId;


/***** LIBRARY *****/
/// Defines common errors that may occur when working with the render target catalog.
#[derive(Debug)]
pub enum RenderTargetError {
    /// The given target ID does not name a target in the catalog
    UnknownTarget{ id: RenderTargetId },
    /// The given mip level does not exist on the given target
    UnknownMip{ id: RenderTargetId, mip: u32, mip_count: u32 },

    /// Failed to create the image for a target
    ImageCreateError{ name: &'static str, err: sail_gfx::errors::RenderSystemError },
    /// Failed to create an image view for a target
    ViewCreateError{ name: &'static str, err: sail_gfx::errors::RenderSystemError },
}

impl Display for RenderTargetError {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use RenderTargetError::*;
        match self {
            UnknownTarget{ id }             => write!(f, "Unknown render target {}", id),
            UnknownMip{ id, mip, mip_count } => write!(f, "Render target {} has no mip {} (it has {} mips)", id, mip, mip_count),

            ImageCreateError{ name, err } => write!(f, "Failed to create image for render target '{}': {}", name, err),
            ViewCreateError{ name, err }  => write!(f, "Failed to create image view for render target '{}': {}", name, err),
        }
    }
}

impl Error for RenderTargetError {}
