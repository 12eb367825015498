//  LIB.rs
//    by Lut99
//
//  Created:
//    15 Oct 2022, 13:30:22
//  Last edited:
//    14 Jan 2023, 16:40:07
//  Auto updated?
//    Yes
//
//  Description:
//!   Entrypoint for the render target crate: the catalog of named image
//!   attachments the render passes draw into and sample from.
//

use sail_ecs::SystemId;

/// The module for the errors of this crate.
pub mod errors;
/// The module with the target identifiers and descriptors.
pub mod spec;
/// The module with the render target system itself.
pub mod system;

// Bring some components into the general package namespace
pub use spec::{RenderTargetId, TargetDescriptor, TargetSize};
pub use system::RenderTargetSystem;


/***** CONSTANTS *****/
/// The ID the render target system registers in the World with.
pub const RENDER_TARGET_SYSTEM_ID: SystemId = SystemId::new(2);

/// The number of shadow cascades (each cascade is its own target).
pub const CASCADE_COUNT: usize = 4;
/// The number of mips in the prefiltered environment cube.
pub const PREFILTER_MIP_COUNT: u32 = 10;
