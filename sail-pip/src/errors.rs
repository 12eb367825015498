//  ERRORS.rs
//    by Lut99
//
//  Created:
//    22 Oct 2022, 13:55:37
//  Last edited:
//    14 Jan 2023, 18:04:12
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the errors for the render pipeline crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};

use crate::spec::{DrawContextId, RenderPassId};


/***** LIBRARY *****/
/// Defines errors that occur when building or driving the render pipeline.
#[derive(Debug)]
pub enum RenderPipelineError {
    /// The given pass ID does not name a registered pass
    InvalidPassId{ id: RenderPassId, pass_count: u32 },
    /// A declared dependency does not name a registered pass
    InvalidDependency{ id: RenderPassId, dep: RenderPassId },
    /// The given draw context ID does not name a registered context
    InvalidDrawContextId{ id: DrawContextId, ctx_count: u32 },
    /// A pass declared more attachments than the maximum
    TooManyAttachments{ name: &'static str, count: usize },
    /// A pass declared more transitions than the maximum
    TooManyTransitions{ name: &'static str, count: usize },
    /// The pre-order from pass 0 did not reach every pass; the graph has extra roots or a cycle
    UnreachablePasses{ ids: Vec<u32> },
    /// A draw batch submission had mismatching batch and record counts
    BatchCountMismatch{ batches: usize, records: usize },

    /// Something went wrong looking up a render target
    TargetError{ err: sail_tgt::errors::RenderTargetError },
    /// Something went wrong creating a device resource
    ResourceError{ what: &'static str, err: sail_gfx::errors::RenderSystemError },
    /// Could not (re)allocate the pass command buffers on the render thread
    CommandBufferError{ err: sail_thr::errors::RenderThreadError },

    /// An internal shader's SPIR-V blob is missing from the binary
    MissingShader{ name: &'static str },
    /// An internal shader's SPIR-V blob could not be parsed
    ShaderParseError{ name: &'static str, err: std::io::Error },
}

impl Display for RenderPipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use RenderPipelineError::*;
        match self {
            InvalidPassId{ id, pass_count }        => write!(f, "Pass ID {} is out of range ({} passes registered)", id, pass_count),
            InvalidDependency{ id, dep }           => write!(f, "Pass {} declares dependency on unregistered pass {}", id, dep),
            InvalidDrawContextId{ id, ctx_count }  => write!(f, "Draw context ID {} is out of range ({} contexts registered)", id, ctx_count),
            TooManyAttachments{ name, count }      => write!(f, "Pass '{}' declares {} attachments; the maximum is {}", name, count, crate::MAX_ATTACHMENTS),
            TooManyTransitions{ name, count }      => write!(f, "Pass '{}' declares {} transitions; the maximum is {}", name, count, crate::MAX_RENDER_PASS_TRANS),
            UnreachablePasses{ ids }               => write!(f, "Passes {:?} are not reachable from pass 0; chain extra roots to pass 0 (the sort has a single-root precondition)", ids),
            BatchCountMismatch{ batches, records } => write!(f, "Got {} draw batches but {} user records; need exactly one record per batch", batches, records),

            TargetError{ err }         => write!(f, "Render target error: {}", err),
            ResourceError{ what, err } => write!(f, "Could not create {}: {}", what, err),
            CommandBufferError{ err }  => write!(f, "Could not allocate pass command buffers: {}", err),

            MissingShader{ name }         => write!(f, "Internal shader '{}' is missing from the binary; was it compiled into shaders/spir-v?", name),
            ShaderParseError{ name, err } => write!(f, "Internal shader '{}' could not be parsed as SPIR-V: {}", name, err),
        }
    }
}

impl Error for RenderPipelineError {}
