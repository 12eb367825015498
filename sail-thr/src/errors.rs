//  ERRORS.rs
//    by Lut99
//
//  Created:
//    01 Oct 2022, 11:09:25
//  Last edited:
//    14 Jan 2023, 12:22:31
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the errors for the render thread crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};


/***** ERRORS *****/
/// Defines errors that occur when starting or driving the render thread.
#[derive(Debug)]
pub enum RenderThreadError {
    /// Could not create the Instance
    InstanceCreateError{ err: sail_vk::errors::InstanceError },
    /// Could not create the debug messenger
    DebugMessengerCreateError{ err: sail_vk::errors::DebugError },
    /// Could not create the Surface
    SurfaceCreateError{ err: sail_vk::errors::SurfaceError },
    /// Could not select or create the Device
    DeviceCreateError{ err: sail_vk::errors::DeviceError },
    /// Could not create the Swapchain
    SwapchainCreateError{ err: sail_vk::errors::SwapchainError },
    /// Could not create the memory allocator
    AllocatorCreateError{ err: gpu_allocator::AllocationError },

    /// Could not create one of the per-frame command pools
    CommandPoolCreateError{ err: ash::vk::Result },
    /// Could not allocate the pass command buffers
    CommandBufferAllocateError{ err: ash::vk::Result },
    /// Could not create one of the per-frame Vulkan semaphores
    SemaphoreCreateError{ err: sail_vk::errors::SyncError },
    /// Could not create one of the per-frame fences
    FenceCreateError{ err: sail_vk::errors::SyncError },
    /// Could not create one of the per-frame temporary GPU buffers
    TmpBufferCreateError{ err: ash::vk::Result },
    /// Could not allocate memory for one of the per-frame temporary GPU buffers
    TmpBufferAllocateError{ err: gpu_allocator::AllocationError },
    /// Could not bind the memory of one of the per-frame temporary GPU buffers
    TmpBufferBindError{ err: ash::vk::Result },

    /// Could not spawn the render thread itself
    SpawnError{ err: std::io::Error },
}

impl Display for RenderThreadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            RenderThreadError::InstanceCreateError{ err }       => write!(f, "Could not create Instance: {}", err),
            RenderThreadError::DebugMessengerCreateError{ err } => write!(f, "Could not create debug messenger: {}", err),
            RenderThreadError::SurfaceCreateError{ err }        => write!(f, "Could not create Surface: {}", err),
            RenderThreadError::DeviceCreateError{ err }         => write!(f, "Could not create Device: {}", err),
            RenderThreadError::SwapchainCreateError{ err }      => write!(f, "Could not create Swapchain: {}", err),
            RenderThreadError::AllocatorCreateError{ err }      => write!(f, "Could not create memory allocator: {}", err),

            RenderThreadError::CommandPoolCreateError{ err }     => write!(f, "Could not create per-frame command pool: {}", err),
            RenderThreadError::CommandBufferAllocateError{ err } => write!(f, "Could not allocate pass command buffers: {}", err),
            RenderThreadError::SemaphoreCreateError{ err }       => write!(f, "Could not create per-frame semaphore: {}", err),
            RenderThreadError::FenceCreateError{ err }           => write!(f, "Could not create per-frame fence: {}", err),
            RenderThreadError::TmpBufferCreateError{ err }       => write!(f, "Could not create per-frame temporary GPU buffer: {}", err),
            RenderThreadError::TmpBufferAllocateError{ err }     => write!(f, "Could not allocate memory for per-frame temporary GPU buffer: {}", err),
            RenderThreadError::TmpBufferBindError{ err }         => write!(f, "Could not bind memory of per-frame temporary GPU buffer: {}", err),

            RenderThreadError::SpawnError{ err } => write!(f, "Could not spawn render thread: {}", err),
        }
    }
}

impl Error for RenderThreadError {}
