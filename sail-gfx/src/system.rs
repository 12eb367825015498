/* SYSTEM.rs
 *   by Lut99
 *
 * Created:
 *   08 Oct 2022, 11:15:42
 * Last edited:
 *   14 Jan 2023, 16:20:31
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Implements the base RenderSystem: the device-facing resource factory
 *   with per-frame staging, upload queues and the frame handoff to the
 *   render thread.
**/

use std::error::Error as StdError;
use std::fs;
use std::ptr;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{AllocationCreateDesc, Allocator, AllocatorCreateDesc};
use log::{debug, warn};

use sail_ecs::spec::{System, SystemId};
use sail_thr::RenderThread;
use sail_thr::spec::{BufferCopy, BufferImageCopy, MAX_FRAME_STATES, TMP_BUFFER_SIZE};

pub use crate::errors::RenderSystemError as Error;
use crate::RENDER_SYSTEM_ID;
use crate::descpool::FrameDescriptorPools;
use crate::spec::{GpuBuffer, GpuImage, HostBuffer, HostBufferSlice, UploadQueues};
use crate::staging::TmpHostBuffer;
use std::sync::Arc;


/***** CONSTANTS *****/
/// The location of the persisted pipeline cache.
const PIPELINE_CACHE_PATH: &str = "./pipeline.cache";





/***** HELPER STRUCTS *****/
/// The main-thread side of a single frame in flight.
struct RenderFrameState {
    /// The linear staging buffer for this frame
    tmp_host_buffer : TmpHostBuffer,
    /// The upload queues for this frame
    uploads         : UploadQueues,
}





/***** LIBRARY *****/
/// The RenderSystem is the device-facing resource factory of the engine.
///
/// It allocates buffers and images through the shared allocator, hands out slices of the per-frame temporary host buffer, queues uploads, and at the end of every tick hands the frame off to the render thread.
pub struct RenderSystem {
    /// The render thread that owns the device objects.
    thread : Arc<RenderThread>,

    /// The allocator for main-thread resource creation.
    allocator : Allocator,
    /// The pipeline cache, persisted to disk across runs.
    pipeline_cache : vk::PipelineCache,

    /// The main-thread frame states.
    frame_states : Vec<RenderFrameState>,
    /// The frame slot currently being prepared.
    frame_idx    : usize,
}

impl RenderSystem {
    /// Constructor for the RenderSystem.
    ///
    /// Creates the main-thread allocator, the per-frame temporary host buffers and the pipeline cache (loading the persisted cache from disk if there is one).
    ///
    /// # Arguments
    /// - `thread`: The RenderThread whose device we create resources on.
    ///
    /// # Returns
    /// A new instance of the RenderSystem on success.
    ///
    /// # Errors
    /// This function errors if any of the Vulkan resources could not be created.
    pub fn new(thread: Arc<RenderThread>) -> Result<Self, Error> {
        let device = thread.device().clone();

        // Create the allocator for this thread
        let mut allocator = match Allocator::new(&AllocatorCreateDesc {
            instance        : device.instance().vk().clone(),
            device          : device.device().clone(),
            physical_device : device.physical_device(),
            debug_settings  : Default::default(),
            buffer_device_address : false,
        }) {
            Ok(allocator) => allocator,
            Err(err)      => { return Err(Error::AllocatorCreateError{ err }); }
        };

        // Create the per-frame temporary host buffers
        let mut frame_states: Vec<RenderFrameState> = Vec::with_capacity(MAX_FRAME_STATES);
        for i in 0..MAX_FRAME_STATES {
            let name = format!("Frame {} Tmp Host Buffer", i);

            // The buffer itself
            let buffer_info = vk::BufferCreateInfo {
                s_type : vk::StructureType::BUFFER_CREATE_INFO,
                p_next : ptr::null(),
                flags  : vk::BufferCreateFlags::empty(),

                size  : TMP_BUFFER_SIZE,
                usage : vk::BufferUsageFlags::TRANSFER_SRC,

                sharing_mode             : vk::SharingMode::EXCLUSIVE,
                queue_family_index_count : 0,
                p_queue_family_indices   : ptr::null(),
            };
            let buffer = unsafe {
                match device.create_buffer(&buffer_info, None) {
                    Ok(buffer) => buffer,
                    Err(err)   => { return Err(Error::TmpHostBufferCreateError{ err }); }
                }
            };

            // Its mapped, host-visible memory
            let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
            let allocation = match allocator.allocate(&AllocationCreateDesc {
                name     : &name,
                requirements,
                location : MemoryLocation::CpuToGpu,
                linear   : true,
            }) {
                Ok(allocation) => allocation,
                Err(err)       => { return Err(Error::MemoryAllocateError{ name, err }); }
            };
            if let Err(err) = unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
                return Err(Error::MemoryBindError{ name, err });
            }
            let base: *mut u8 = match allocation.mapped_ptr() {
                Some(ptr) => ptr.as_ptr().cast::<u8>(),
                None      => { return Err(Error::MemoryMapError{ name }); }
            };
            device.set_debug_name(buffer, &name);

            frame_states.push(RenderFrameState {
                tmp_host_buffer : TmpHostBuffer::new(buffer, Some(allocation), base, TMP_BUFFER_SIZE),
                uploads         : UploadQueues::new(),
            });
        }

        // Load the pipeline cache from disk, if a previous run left one
        let cache_data: Vec<u8> = match fs::read(PIPELINE_CACHE_PATH) {
            Ok(data) => { debug!("Loaded pipeline cache ({} bytes)", data.len()); data },
            Err(_)   => { debug!("No pipeline cache found; starting cold"); vec![] },
        };
        let cache_info = vk::PipelineCacheCreateInfo {
            s_type : vk::StructureType::PIPELINE_CACHE_CREATE_INFO,
            p_next : ptr::null(),
            flags  : vk::PipelineCacheCreateFlags::empty(),

            initial_data_size : cache_data.len(),
            p_initial_data    : cache_data.as_ptr().cast(),
        };
        let pipeline_cache = unsafe {
            match device.create_pipeline_cache(&cache_info, None) {
                Ok(cache) => cache,
                Err(err)  => { return Err(Error::PipelineCacheCreateError{ err }); }
            }
        };
        device.set_debug_name(pipeline_cache, "Sail Pipeline Cache");

        debug!("Initialized RenderSystem v{}", env!("CARGO_PKG_VERSION"));
        Ok(Self {
            thread,

            allocator,
            pipeline_cache,

            frame_states,
            frame_idx : 0,
        })
    }



    /// Allocates a slice from the current frame's temporary host buffer.
    ///
    /// # Arguments
    /// - `size`: The size of the allocation, in bytes.
    /// - `align`: The required alignment of the allocation. Zero means none.
    ///
    /// # Errors
    /// This function errors if the temporary buffer's capacity would be exceeded.
    #[inline]
    pub fn alloc_tmp_host_buffer(&mut self, size: vk::DeviceSize, align: vk::DeviceSize) -> Result<HostBufferSlice, Error> {
        self.frame_states[self.frame_idx].tmp_host_buffer.alloc(size, align)
    }

    /// Allocates a persistent, CPU-visible (and mapped) buffer.
    ///
    /// # Arguments
    /// - `create_info`: The Vulkan create info for the buffer.
    /// - `name`: A debug name for the buffer.
    ///
    /// # Errors
    /// This function errors if the buffer could not be created, its memory not allocated or the memory not mapped.
    pub fn alloc_host_buffer(&mut self, create_info: &vk::BufferCreateInfo, name: &str) -> Result<HostBuffer, Error> {
        let device = self.thread.device();

        let buffer = unsafe {
            match device.create_buffer(create_info, None) {
                Ok(buffer) => buffer,
                Err(err)   => { return Err(Error::BufferCreateError{ name: name.into(), err }); }
            }
        };
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let allocation = match self.allocator.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location : MemoryLocation::CpuToGpu,
            linear   : true,
        }) {
            Ok(allocation) => allocation,
            Err(err)       => { return Err(Error::MemoryAllocateError{ name: name.into(), err }); }
        };
        if let Err(err) = unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
            return Err(Error::MemoryBindError{ name: name.into(), err });
        }
        let ptr: *mut u8 = match allocation.mapped_ptr() {
            Some(ptr) => ptr.as_ptr().cast::<u8>(),
            None      => { return Err(Error::MemoryMapError{ name: name.into() }); }
        };
        device.set_debug_name(buffer, name);

        Ok(HostBuffer {
            buffer,
            allocation : Some(allocation),
            ptr,
            capacity   : create_info.size,
        })
    }

    /// Allocates a persistent, device-local buffer.
    ///
    /// # Arguments
    /// - `create_info`: The Vulkan create info for the buffer.
    /// - `name`: A debug name for the buffer.
    ///
    /// # Errors
    /// This function errors if the buffer could not be created or its memory not allocated.
    pub fn alloc_gpu_buffer(&mut self, create_info: &vk::BufferCreateInfo, name: &str) -> Result<GpuBuffer, Error> {
        let device = self.thread.device();

        let buffer = unsafe {
            match device.create_buffer(create_info, None) {
                Ok(buffer) => buffer,
                Err(err)   => { return Err(Error::BufferCreateError{ name: name.into(), err }); }
            }
        };
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let allocation = match self.allocator.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location : MemoryLocation::GpuOnly,
            linear   : true,
        }) {
            Ok(allocation) => allocation,
            Err(err)       => { return Err(Error::MemoryAllocateError{ name: name.into(), err }); }
        };
        if let Err(err) = unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
            return Err(Error::MemoryBindError{ name: name.into(), err });
        }
        device.set_debug_name(buffer, name);

        Ok(GpuBuffer {
            buffer,
            allocation : Some(allocation),
        })
    }

    /// Allocates a persistent, device-local image.
    ///
    /// # Arguments
    /// - `create_info`: The Vulkan create info for the image.
    /// - `name`: A debug name for the image.
    ///
    /// # Errors
    /// This function errors if the image could not be created or its memory not allocated.
    pub fn alloc_gpu_image(&mut self, create_info: &vk::ImageCreateInfo, name: &str) -> Result<GpuImage, Error> {
        let device = self.thread.device();

        let image = unsafe {
            match device.create_image(create_info, None) {
                Ok(image) => image,
                Err(err)  => { return Err(Error::ImageCreateError{ name: name.into(), err }); }
            }
        };
        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let allocation = match self.allocator.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location : MemoryLocation::GpuOnly,
            linear   : false,
        }) {
            Ok(allocation) => allocation,
            Err(err)       => { return Err(Error::MemoryAllocateError{ name: name.into(), err }); }
        };
        if let Err(err) = unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) } {
            return Err(Error::MemoryBindError{ name: name.into(), err });
        }
        device.set_debug_name(image, name);

        Ok(GpuImage {
            image,
            allocation : Some(allocation),
        })
    }



    /// Creates a sampler with a debug name.
    pub fn create_sampler(&self, create_info: &vk::SamplerCreateInfo, name: &str) -> Result<vk::Sampler, Error> {
        let device = self.thread.device();
        let sampler = unsafe {
            match device.create_sampler(create_info, None) {
                Ok(sampler) => sampler,
                Err(err)    => { return Err(Error::SamplerCreateError{ name: name.into(), err }); }
            }
        };
        device.set_debug_name(sampler, name);
        Ok(sampler)
    }

    /// Creates an image view with a debug name.
    pub fn create_image_view(&self, create_info: &vk::ImageViewCreateInfo, name: &str) -> Result<vk::ImageView, Error> {
        let device = self.thread.device();
        let view = unsafe {
            match device.create_image_view(create_info, None) {
                Ok(view) => view,
                Err(err) => { return Err(Error::ImageViewCreateError{ name: name.into(), err }); }
            }
        };
        device.set_debug_name(view, name);
        Ok(view)
    }

    /// Creates a descriptor set layout with a debug name.
    pub fn create_set_layout(&self, create_info: &vk::DescriptorSetLayoutCreateInfo, name: &str) -> Result<vk::DescriptorSetLayout, Error> {
        let device = self.thread.device();
        let layout = unsafe {
            match device.create_descriptor_set_layout(create_info, None) {
                Ok(layout) => layout,
                Err(err)   => { return Err(Error::SetLayoutCreateError{ name: name.into(), err }); }
            }
        };
        device.set_debug_name(layout, name);
        Ok(layout)
    }

    /// Creates a pipeline layout with a debug name.
    pub fn create_pipeline_layout(&self, create_info: &vk::PipelineLayoutCreateInfo, name: &str) -> Result<vk::PipelineLayout, Error> {
        let device = self.thread.device();
        let layout = unsafe {
            match device.create_pipeline_layout(create_info, None) {
                Ok(layout) => layout,
                Err(err)   => { return Err(Error::PipelineLayoutCreateError{ name: name.into(), err }); }
            }
        };
        device.set_debug_name(layout, name);
        Ok(layout)
    }

    /// Creates a shader module with a debug name.
    pub fn create_shader(&self, create_info: &vk::ShaderModuleCreateInfo, name: &str) -> Result<vk::ShaderModule, Error> {
        let device = self.thread.device();
        let shader = unsafe {
            match device.create_shader_module(create_info, None) {
                Ok(shader) => shader,
                Err(err)   => { return Err(Error::ShaderCreateError{ name: name.into(), err }); }
            }
        };
        device.set_debug_name(shader, name);
        Ok(shader)
    }

    /// Creates a descriptor pool with a debug name.
    pub fn create_descriptor_pool(&self, create_info: &vk::DescriptorPoolCreateInfo, name: &str) -> Result<vk::DescriptorPool, Error> {
        let device = self.thread.device();
        let pool = unsafe {
            match device.create_descriptor_pool(create_info, None) {
                Ok(pool) => pool,
                Err(err) => { return Err(Error::DescriptorPoolCreateError{ name: name.into(), err }); }
            }
        };
        device.set_debug_name(pool, name);
        Ok(pool)
    }

    /// Creates graphics pipelines through the shared pipeline cache, with debug names.
    pub fn create_graphics_pipelines(&self, create_infos: &[vk::GraphicsPipelineCreateInfo], name: &str) -> Result<Vec<vk::Pipeline>, Error> {
        let device = self.thread.device();
        let pipelines = unsafe {
            match device.create_graphics_pipelines(self.pipeline_cache, create_infos, None) {
                Ok(pipelines)       => pipelines,
                Err((_, err))       => { return Err(Error::GraphicsPipelineCreateError{ name: name.into(), err }); }
            }
        };
        for pipeline in &pipelines {
            device.set_debug_name(*pipeline, name);
        }
        Ok(pipelines)
    }



    /// Appends buffer-to-buffer copies to the current frame's upload queue.
    #[inline]
    pub fn upload_buffers(&mut self, uploads: &[BufferCopy]) {
        self.frame_states[self.frame_idx].uploads.push_buffers(uploads);
    }

    /// Appends buffer-to-image copies to the current frame's upload queue.
    #[inline]
    pub fn upload_buffer_to_image(&mut self, uploads: &[BufferImageCopy]) {
        self.frame_states[self.frame_idx].uploads.push_images(uploads);
    }



    /// Makes sure the given frame descriptor pools have a pool for the current frame that holds `set_count` sets, and allocates those sets.
    ///
    /// If the current frame's pool is too small (or does not exist yet), it is destroyed and re-created from `pool_info`; otherwise it is simply reset.
    ///
    /// # Arguments
    /// - `pool_info`: The create info to (re)create the pool with when it is too small.
    /// - `layouts`: The layout for every allocated set; must have exactly `set_count` entries.
    /// - `pools`: The per-frame pool state to tick.
    /// - `set_count`: The number of sets to allocate.
    ///
    /// # Errors
    /// This function errors if the layout count does not match, or if the Vulkan backend fails.
    pub fn frame_desc_pool_tick(&self, pool_info: &vk::DescriptorPoolCreateInfo, layouts: &[vk::DescriptorSetLayout], pools: &mut FrameDescriptorPools, set_count: u32) -> Result<(), Error> {
        if layouts.len() != set_count as usize { return Err(Error::LayoutCountMismatch{ layouts: layouts.len(), sets: set_count }); }
        let device = self.thread.device();
        let pool = &mut pools.pools[self.frame_idx];

        // Resize the pool
        if pool.set_count < set_count {
            if pool.set_pool != vk::DescriptorPool::null() {
                unsafe { device.destroy_descriptor_pool(pool.set_pool, None); }
            }
            pool.set_pool  = self.create_descriptor_pool(pool_info, "Frame Descriptor Pool")?;
            pool.set_count = set_count;
        } else {
            if let Err(err) = unsafe { device.reset_descriptor_pool(pool.set_pool, vk::DescriptorPoolResetFlags::empty()) } {
                return Err(Error::DescriptorSetAllocateError{ err });
            }
            pool.set_count = set_count;
        }

        // (Re-)allocate the sets
        let alloc_info = vk::DescriptorSetAllocateInfo {
            s_type : vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            p_next : ptr::null(),

            descriptor_pool      : pool.set_pool,
            descriptor_set_count : set_count,
            p_set_layouts        : layouts.as_ptr(),
        };
        pool.sets = unsafe {
            match device.allocate_descriptor_sets(&alloc_info) {
                Ok(sets) => sets,
                Err(err) => { return Err(Error::DescriptorSetAllocateError{ err }); }
            }
        };

        Ok(())
    }

    /// Returns the given set from the current frame's descriptor pool.
    #[inline]
    pub fn frame_desc_pool_get_set(&self, pools: &FrameDescriptorPools, set_idx: usize) -> vk::DescriptorSet {
        pools.pools[self.frame_idx].sets[set_idx]
    }



    /// Destroys a sampler.
    #[inline]
    pub fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.thread.device().destroy_sampler(sampler, None); }
    }

    /// Destroys an image view.
    #[inline]
    pub fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.thread.device().destroy_image_view(view, None); }
    }

    /// Destroys a descriptor set layout.
    #[inline]
    pub fn destroy_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.thread.device().destroy_descriptor_set_layout(layout, None); }
    }

    /// Destroys a pipeline layout.
    #[inline]
    pub fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.thread.device().destroy_pipeline_layout(layout, None); }
    }

    /// Destroys a shader module.
    #[inline]
    pub fn destroy_shader(&self, shader: vk::ShaderModule) {
        unsafe { self.thread.device().destroy_shader_module(shader, None); }
    }

    /// Destroys a pipeline.
    #[inline]
    pub fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.thread.device().destroy_pipeline(pipeline, None); }
    }

    /// Destroys a descriptor pool.
    #[inline]
    pub fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.thread.device().destroy_descriptor_pool(pool, None); }
    }

    /// Frees a GPU buffer and its allocation.
    pub fn free_gpu_buffer(&mut self, mut buffer: GpuBuffer) {
        unsafe { self.thread.device().destroy_buffer(buffer.buffer, None); }
        if let Some(allocation) = buffer.allocation.take() {
            if let Err(err) = self.allocator.free(allocation) {
                warn!("Could not free GPU buffer allocation: {}", err);
            }
        }
    }

    /// Frees a GPU image and its allocation.
    pub fn free_gpu_image(&mut self, mut image: GpuImage) {
        unsafe { self.thread.device().destroy_image(image.image, None); }
        if let Some(allocation) = image.allocation.take() {
            if let Err(err) = self.allocator.free(allocation) {
                warn!("Could not free GPU image allocation: {}", err);
            }
        }
    }

    /// Frees a host buffer and its allocation.
    pub fn free_host_buffer(&mut self, mut buffer: HostBuffer) {
        unsafe { self.thread.device().destroy_buffer(buffer.buffer, None); }
        if let Some(allocation) = buffer.allocation.take() {
            if let Err(err) = self.allocator.free(allocation) {
                warn!("Could not free host buffer allocation: {}", err);
            }
        }
    }



    /// Resets the frame index to 0, as part of the resize handshake (both sides restart at frame 0).
    #[inline]
    pub fn reset_frame_idx(&mut self) {
        self.frame_idx = 0;
    }



    /// Returns the GPU-side mirror of the current frame's temporary host buffer.
    pub fn tmp_gpu_buffer(&self) -> vk::Buffer {
        self.thread.frame(self.frame_idx).state.lock().expect("Could not lock frame state").tmp_gpu_buffer
    }

    /// Returns the render thread.
    #[inline]
    pub fn thread(&self) -> &Arc<RenderThread> { &self.thread }

    /// Returns the frame slot currently being prepared by the main thread.
    #[inline]
    pub fn frame_idx(&self) -> usize { self.frame_idx }
}

impl System for RenderSystem {
    #[inline]
    fn id(&self) -> SystemId { RENDER_SYSTEM_ID }

    /// Hands the previous tick's frame to the render thread and claims the next slot for the systems that tick after this one.
    ///
    /// The render system is the first system in the tick order, so one call does the whole frame rotation: hand off the staging contents and upload queues of the frame the other systems just filled, post its wait semaphore, advance the frame index, then block until the render thread is done with the newly selected slot and reset that slot's staging buffer.
    ///
    /// The staging buffer of the handed-off frame is deliberately _not_ reset; its contents must stay intact for the render thread. Each slot's reset happens when it is next selected here.
    fn tick(&mut self, _delta_seconds: f32) -> Result<(), Box<dyn StdError>> {
        {
            let state = &mut self.frame_states[self.frame_idx];
            let mut thread_state = self.thread.frame(self.frame_idx).state.lock().expect("Could not lock frame state");

            // Make the frame's staging contents available on the GPU before anything else
            let staged = state.tmp_host_buffer.offset();
            if staged > 0 {
                state.uploads.push_buffers(&[ BufferCopy {
                    src    : state.tmp_host_buffer.buffer(),
                    dst    : thread_state.tmp_gpu_buffer,
                    region : vk::BufferCopy{ src_offset: 0, dst_offset: 0, size: staged },
                } ]);
            }

            // Hand the queues over, taking the drained storage back
            let sail_thr::frame::FrameState{ buf_copy_queue, buf_img_copy_queue, .. } = &mut *thread_state;
            state.uploads.hand_off(buf_copy_queue, buf_img_copy_queue);
        }

        // Wake the render thread for this frame and move on to the next slot
        self.thread.signal_render(self.frame_idx);
        self.frame_idx = (self.frame_idx + 1) % MAX_FRAME_STATES;

        // The new slot may still be in flight from a lap ago; nothing may touch it before this
        self.thread.wait_render(self.frame_idx);
        self.frame_states[self.frame_idx].tmp_host_buffer.reset();
        Ok(())
    }
}

impl RenderSystem {
    /// Persists the pipeline cache to disk, so the next run skips most pipeline compilation.
    ///
    /// Also invoked on drop; call explicitly at shutdown to not depend on destruction order.
    pub fn persist_pipeline_cache(&self) {
        match unsafe { self.thread.device().get_pipeline_cache_data(self.pipeline_cache) } {
            Ok(data) => {
                if let Err(err) = fs::write(PIPELINE_CACHE_PATH, &data) {
                    warn!("Could not write pipeline cache to '{}': {}", PIPELINE_CACHE_PATH, err);
                } else {
                    debug!("Persisted pipeline cache ({} bytes)", data.len());
                }
            },
            Err(err) => { warn!("Could not get pipeline cache data: {}", err); }
        }
    }
}

impl Drop for RenderSystem {
    fn drop(&mut self) {
        let device = self.thread.device().clone();

        // Persist the pipeline cache so the next run compiles faster
        self.persist_pipeline_cache();
        unsafe { device.destroy_pipeline_cache(self.pipeline_cache, None); }

        // Tear down the staging buffers
        for state in &mut self.frame_states {
            unsafe { device.destroy_buffer(state.tmp_host_buffer.buffer(), None); }
            if let Some(allocation) = state.tmp_host_buffer.take_allocation() {
                if let Err(err) = self.allocator.free(allocation) {
                    warn!("Could not free temporary host buffer allocation: {}", err);
                }
            }
        }
    }
}
