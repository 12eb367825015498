/* ERRORS.rs
 *   by Lut99
 *
 * Created:
 *   08 Oct 2022, 10:24:31
 * Last edited:
 *   14 Jan 2023, 15:04:20
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Collects all errors for the crate.
**/

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};


/***** ERRORS *****/
/// Defines errors that occur in the render system.
#[derive(Debug)]
pub enum RenderSystemError {
    /// Could not create the memory allocator
    AllocatorCreateError{ err: gpu_allocator::AllocationError },
    /// Could not create the pipeline cache
    PipelineCacheCreateError{ err: ash::vk::Result },

    /// Could not create one of the temporary host buffers
    TmpHostBufferCreateError{ err: ash::vk::Result },
    /// The temporary host buffer has no room for the requested allocation
    TmpHostBufferExhausted{ requested: u64, capacity: u64 },

    /// Could not create a buffer
    BufferCreateError{ name: String, err: ash::vk::Result },
    /// Could not allocate memory for a buffer or image
    MemoryAllocateError{ name: String, err: gpu_allocator::AllocationError },
    /// Could not bind memory to a buffer or image
    MemoryBindError{ name: String, err: ash::vk::Result },
    /// The host buffer's memory could not be mapped
    MemoryMapError{ name: String },
    /// Could not create an image
    ImageCreateError{ name: String, err: ash::vk::Result },

    /// Could not create a sampler
    SamplerCreateError{ name: String, err: ash::vk::Result },
    /// Could not create an image view
    ImageViewCreateError{ name: String, err: ash::vk::Result },
    /// Could not create a descriptor set layout
    SetLayoutCreateError{ name: String, err: ash::vk::Result },
    /// Could not create a pipeline layout
    PipelineLayoutCreateError{ name: String, err: ash::vk::Result },
    /// Could not create a shader module
    ShaderCreateError{ name: String, err: ash::vk::Result },
    /// Could not create a descriptor pool
    DescriptorPoolCreateError{ name: String, err: ash::vk::Result },
    /// Could not create one or more graphics pipelines
    GraphicsPipelineCreateError{ name: String, err: ash::vk::Result },
    /// Could not allocate descriptor sets from a frame pool
    DescriptorSetAllocateError{ err: ash::vk::Result },
    /// The number of layouts does not match the number of requested sets
    LayoutCountMismatch{ layouts: usize, sets: u32 },
}

impl Display for RenderSystemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            RenderSystemError::AllocatorCreateError{ err }     => write!(f, "Could not create memory allocator: {}", err),
            RenderSystemError::PipelineCacheCreateError{ err } => write!(f, "Could not create pipeline cache: {}", err),

            RenderSystemError::TmpHostBufferCreateError{ err }             => write!(f, "Could not create temporary host buffer: {}", err),
            RenderSystemError::TmpHostBufferExhausted{ requested, capacity } => write!(f, "Temporary host buffer exhausted ({} bytes requested, {} bytes capacity); submit sooner or enlarge the buffer", requested, capacity),

            RenderSystemError::BufferCreateError{ name, err }   => write!(f, "Could not create buffer '{}': {}", name, err),
            RenderSystemError::MemoryAllocateError{ name, err } => write!(f, "Could not allocate memory for '{}': {}", name, err),
            RenderSystemError::MemoryBindError{ name, err }     => write!(f, "Could not bind memory of '{}': {}", name, err),
            RenderSystemError::MemoryMapError{ name }           => write!(f, "Memory of '{}' is not mapped even though it is host-visible", name),
            RenderSystemError::ImageCreateError{ name, err }    => write!(f, "Could not create image '{}': {}", name, err),

            RenderSystemError::SamplerCreateError{ name, err }          => write!(f, "Could not create sampler '{}': {}", name, err),
            RenderSystemError::ImageViewCreateError{ name, err }        => write!(f, "Could not create image view '{}': {}", name, err),
            RenderSystemError::SetLayoutCreateError{ name, err }        => write!(f, "Could not create descriptor set layout '{}': {}", name, err),
            RenderSystemError::PipelineLayoutCreateError{ name, err }   => write!(f, "Could not create pipeline layout '{}': {}", name, err),
            RenderSystemError::ShaderCreateError{ name, err }           => write!(f, "Could not create shader module '{}': {}", name, err),
            RenderSystemError::DescriptorPoolCreateError{ name, err }   => write!(f, "Could not create descriptor pool '{}': {}", name, err),
            RenderSystemError::GraphicsPipelineCreateError{ name, err } => write!(f, "Could not create graphics pipeline(s) '{}': {}", name, err),
            RenderSystemError::DescriptorSetAllocateError{ err }        => write!(f, "Could not allocate descriptor sets: {}", err),
            RenderSystemError::LayoutCountMismatch{ layouts, sets }     => write!(f, "Got {} descriptor set layouts for {} requested sets; need one layout per set", layouts, sets),
        }
    }
}

impl Error for RenderSystemError {}
