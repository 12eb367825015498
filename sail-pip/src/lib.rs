//  LIB.rs
//    by Lut99
//
//  Created:
//    22 Oct 2022, 13:50:11
//  Last edited:
//    14 Jan 2023, 18:02:46
//  Auto updated?
//    Yes
//
//  Description:
//!   Entrypoint for the render pipeline crate: the declarative pass
//!   graph, its topological ordering and command-buffer splitting, the
//!   per-frame pass contexts, draw contexts and the built-in fullscreen
//!   passes.
//

use sail_ecs::SystemId;

/// The module for the errors of this crate.
pub mod errors;
/// The module with the pass and draw-context identifiers and create infos.
pub mod spec;
/// The module with the stored pass representation and barrier patching.
pub mod pass;
/// The module with the dependency-graph sort and the command-buffer split walk.
pub mod graph;
/// The module with the embedded internal shaders.
pub mod shaders;
/// The module with the internally-driven fullscreen passes.
pub mod fullscreen;
/// The module with the render pipeline system itself.
pub mod system;

// Bring some components into the general package namespace
pub use spec::{AttachmentInfo, DrawContextId, PassTransition, RenderPassId, RenderPassInfo};
pub use system::RenderPipelineSystem;


/***** CONSTANTS *****/
/// The ID the render pipeline system registers in the World with.
pub const RENDER_PIPELINE_SYSTEM_ID: SystemId = SystemId::new(3);

/// The maximum number of attachments a single pass may declare.
pub const MAX_ATTACHMENTS: usize = 16;
/// The maximum number of transitions a single pass may declare.
pub const MAX_RENDER_PASS_TRANS: usize = 16;
