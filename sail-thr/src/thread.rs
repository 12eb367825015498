//  THREAD.rs
//    by Lut99
//
//  Created:
//    01 Oct 2022, 12:16:40
//  Last edited:
//    14 Jan 2023, 14:38:27
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the render thread: device object ownership, the GPU
//!   submission loop, the resize handshake and the shutdown path.
//

use std::ptr;
use std::sync::{Arc, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{AllocationCreateDesc, Allocator, AllocatorCreateDesc};
use log::{debug, error, info, warn};
use semver::Version;
use winit::window::Window as WWindow;

use sail_vk::debug::DebugMessenger;
use sail_vk::device::Device;
use sail_vk::instance::Instance;
use sail_vk::surface::Surface;
use sail_vk::swapchain::Swapchain;
use sail_vk::sync::{Fence, Semaphore as VkSemaphore};

pub use crate::errors::RenderThreadError as Error;
use crate::frame::{FrameSlot, FrameState};
use crate::semaphore::Semaphore;
use crate::spec::{BufferImageCopy, MAX_FRAME_STATES, TMP_BUFFER_SIZE};


/***** CONSTANTS *****/
/// The name of the engine as registered with the driver.
const ENGINE_NAME: &str = "Sail-Engine";





/***** HELPER MACROS *****/
/// Exits the process on errors we cannot recover from (device loss, mostly).
macro_rules! render_fatal {
    ($($arg:tt)+) => {
        {
            error!($($arg)+);
            std::process::exit(1);
        }
    };
}





/***** HELPER FUNCTIONS *****/
/// Populates an ImageMemoryBarrier for the given image and range.
#[inline]
fn populate_image_barrier(image: vk::Image, src_access: vk::AccessFlags, dst_access: vk::AccessFlags, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout, range: vk::ImageSubresourceRange) -> vk::ImageMemoryBarrier {
    vk::ImageMemoryBarrier {
        s_type : vk::StructureType::IMAGE_MEMORY_BARRIER,
        p_next : ptr::null(),

        src_access_mask : src_access,
        dst_access_mask : dst_access,
        old_layout,
        new_layout,

        src_queue_family_index : vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index : vk::QUEUE_FAMILY_IGNORED,

        image,
        subresource_range : range,
    }
}



/// Records the upload of a single buffer-to-image copy, including its layout transitions and possibly a mip blit cascade.
unsafe fn record_image_upload(device: &Device, buffer: vk::CommandBuffer, upload: &BufferImageCopy) {
    // Move the whole range into a transfer-writable layout
    let barrier = populate_image_barrier(upload.dst, vk::AccessFlags::empty(), vk::AccessFlags::TRANSFER_WRITE, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL, upload.range);
    device.cmd_pipeline_barrier(buffer, vk::PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags::TRANSFER, vk::DependencyFlags::empty(), &[], &[], &[ barrier ]);

    // Copy the base level in
    device.cmd_copy_buffer_to_image(buffer, upload.src, upload.dst, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[ upload.region ]);

    if upload.generate_mips && upload.range.level_count > 1 {
        // Blit every level from the one before it
        let mut mip_width: i32  = upload.region.image_extent.width as i32;
        let mut mip_height: i32 = upload.region.image_extent.height as i32;
        for level in 1..upload.range.level_count {
            // The previous level becomes a blit source
            let src_range = vk::ImageSubresourceRange {
                aspect_mask      : upload.range.aspect_mask,
                base_mip_level   : upload.range.base_mip_level + level - 1,
                level_count      : 1,
                base_array_layer : upload.range.base_array_layer,
                layer_count      : upload.range.layer_count,
            };
            let barrier = populate_image_barrier(upload.dst, vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_READ, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, src_range);
            device.cmd_pipeline_barrier(buffer, vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::TRANSFER, vk::DependencyFlags::empty(), &[], &[], &[ barrier ]);

            // Blit at half size
            let next_width: i32  = if mip_width > 1 { mip_width / 2 } else { 1 };
            let next_height: i32 = if mip_height > 1 { mip_height / 2 } else { 1 };
            let blit = vk::ImageBlit {
                src_subresource : vk::ImageSubresourceLayers {
                    aspect_mask      : upload.range.aspect_mask,
                    mip_level        : upload.range.base_mip_level + level - 1,
                    base_array_layer : upload.range.base_array_layer,
                    layer_count      : upload.range.layer_count,
                },
                src_offsets : [ vk::Offset3D{ x: 0, y: 0, z: 0 }, vk::Offset3D{ x: mip_width, y: mip_height, z: 1 } ],
                dst_subresource : vk::ImageSubresourceLayers {
                    aspect_mask      : upload.range.aspect_mask,
                    mip_level        : upload.range.base_mip_level + level,
                    base_array_layer : upload.range.base_array_layer,
                    layer_count      : upload.range.layer_count,
                },
                dst_offsets : [ vk::Offset3D{ x: 0, y: 0, z: 0 }, vk::Offset3D{ x: next_width, y: next_height, z: 1 } ],
            };
            device.cmd_blit_image(buffer, upload.dst, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, upload.dst, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[ blit ], vk::Filter::LINEAR);

            mip_width  = next_width;
            mip_height = next_height;
        }

        // All levels but the last are now blit sources; the last is still a transfer target
        let src_levels = vk::ImageSubresourceRange {
            aspect_mask      : upload.range.aspect_mask,
            base_mip_level   : upload.range.base_mip_level,
            level_count      : upload.range.level_count - 1,
            base_array_layer : upload.range.base_array_layer,
            layer_count      : upload.range.layer_count,
        };
        let last_level = vk::ImageSubresourceRange {
            aspect_mask      : upload.range.aspect_mask,
            base_mip_level   : upload.range.base_mip_level + upload.range.level_count - 1,
            level_count      : 1,
            base_array_layer : upload.range.base_array_layer,
            layer_count      : upload.range.layer_count,
        };
        let barriers = [
            populate_image_barrier(upload.dst, vk::AccessFlags::TRANSFER_READ, vk::AccessFlags::SHADER_READ, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, src_levels),
            populate_image_barrier(upload.dst, vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::SHADER_READ, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, last_level),
        ];
        device.cmd_pipeline_barrier(buffer, vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::FRAGMENT_SHADER, vk::DependencyFlags::empty(), &[], &[], &barriers);
    } else {
        // No mips to generate; just make the range shader-readable
        let barrier = populate_image_barrier(upload.dst, vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::SHADER_READ, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, upload.range);
        device.cmd_pipeline_barrier(buffer, vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::FRAGMENT_SHADER, vk::DependencyFlags::empty(), &[], &[], &[ barrier ]);
    }
}



/// Records all of a frame's command buffers: uploads into command buffer 0, then the passes into their assigned buffers.
///
/// # Returns
/// The number of command buffers that were recorded (and must thus be submitted).
unsafe fn record_frame(device: &Device, swapchain_image: vk::Image, state: &mut FrameState) -> Result<usize, vk::Result> {
    let vk_device = device.device();

    // The pool is reset wholesale; the buffers are re-recorded from scratch
    vk_device.reset_command_pool(state.command_pool, vk::CommandPoolResetFlags::empty())?;

    let begin_info = vk::CommandBufferBeginInfo {
        s_type             : vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
        p_next             : ptr::null(),
        flags              : vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
        p_inheritance_info : ptr::null(),
    };

    // Command buffer 0 carries the uploads, so that they complete before any pass that consumes them
    let upload_cb = state.command_buffers[0];
    vk_device.begin_command_buffer(upload_cb, &begin_info)?;
    for copy in &state.buf_copy_queue {
        vk_device.cmd_copy_buffer(upload_cb, copy.src, copy.dst, &[ copy.region ]);
    }
    for upload in &state.buf_img_copy_queue {
        record_image_upload(device, upload_cb, upload);
    }
    state.buf_copy_queue.clear();
    state.buf_img_copy_queue.clear();

    // The acquired swapchain image comes in undefined; make it renderable
    let acquire_barrier = populate_image_barrier(
        swapchain_image,
        vk::AccessFlags::empty(), vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        vk::ImageSubresourceRange{ aspect_mask: vk::ImageAspectFlags::COLOR, base_mip_level: 0, level_count: 1, base_array_layer: 0, layer_count: 1 },
    );
    vk_device.cmd_pipeline_barrier(upload_cb, vk::PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::DependencyFlags::empty(), &[], &[], &[ acquire_barrier ]);

    // Prepare the barrier that hands the image to the presentation engine; it goes at the end of whichever buffer records last
    let present_barrier = populate_image_barrier(
        swapchain_image,
        vk::AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::empty(),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR,
        vk::ImageSubresourceRange{ aspect_mask: vk::ImageAspectFlags::COLOR, base_mip_level: 0, level_count: 1, base_array_layer: 0, layer_count: 1 },
    );

    if state.pass_contexts.is_empty() {
        // Nothing to draw; present straight away
        vk_device.cmd_pipeline_barrier(upload_cb, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::PipelineStageFlags::BOTTOM_OF_PIPE, vk::DependencyFlags::empty(), &[], &[], &[ present_barrier ]);
        vk_device.end_command_buffer(upload_cb)?;
        return Ok(1);
    }
    vk_device.end_command_buffer(upload_cb)?;

    // Record the passes in execution order, opening a new command buffer at every assigned boundary
    let mut current: Option<usize> = None;
    for ctx in &state.pass_contexts {
        let cb_idx = 1 + ctx.command_buffer_index as usize;
        let cb = state.command_buffers[cb_idx];
        if current != Some(cb_idx) {
            if let Some(prev) = current {
                vk_device.end_command_buffer(state.command_buffers[prev])?;
            }
            vk_device.begin_command_buffer(cb, &begin_info)?;
            current = Some(cb_idx);
        }

        // The pre-pass barriers, with the per-frame patched image handles
        for transition in &ctx.barriers {
            let barrier = populate_image_barrier(transition.image, transition.src_access, transition.dst_access, transition.old_layout, transition.new_layout, transition.range);
            vk_device.cmd_pipeline_barrier(cb, transition.src_stage, transition.dst_stage, vk::DependencyFlags::empty(), &[], &[], &[ barrier ]);
        }

        // Resolve the attachments into a rendering info
        let mut color_attachments: Vec<vk::RenderingAttachmentInfo> = Vec::with_capacity(ctx.attachments.len());
        let mut depth_attachment: Option<vk::RenderingAttachmentInfo> = None;
        for att in &ctx.attachments {
            let info = vk::RenderingAttachmentInfo {
                s_type : vk::StructureType::RENDERING_ATTACHMENT_INFO,
                p_next : ptr::null(),

                image_view   : att.view,
                image_layout : att.layout,

                resolve_mode         : vk::ResolveModeFlags::NONE,
                resolve_image_view   : vk::ImageView::null(),
                resolve_image_layout : vk::ImageLayout::UNDEFINED,

                load_op     : att.load_op,
                store_op    : att.store_op,
                clear_value : att.clear_value,
            };
            if att.is_depth { depth_attachment = Some(info); }
            else { color_attachments.push(info); }
        }
        let rendering_info = vk::RenderingInfo {
            s_type : vk::StructureType::RENDERING_INFO,
            p_next : ptr::null(),
            flags  : vk::RenderingFlags::empty(),

            render_area : vk::Rect2D{ offset: vk::Offset2D{ x: 0, y: 0 }, extent: vk::Extent2D{ width: ctx.width, height: ctx.height } },
            layer_count : ctx.layer_count,
            view_mask   : ctx.view_mask,

            color_attachment_count : color_attachments.len() as u32,
            p_color_attachments    : color_attachments.as_ptr(),
            p_depth_attachment     : depth_attachment.as_ref().map(|a| a as *const vk::RenderingAttachmentInfo).unwrap_or(ptr::null()),
            p_stencil_attachment   : ptr::null(),
        };

        // Render the pass, letting every draw context registered against it record its batches
        vk_device.cmd_begin_rendering(cb, &rendering_info);
        for draw_ctx in &state.draw_contexts {
            if draw_ctx.pass_id == ctx.id && !draw_ctx.batches.is_empty() {
                (draw_ctx.record_fn)(vk_device, cb, &draw_ctx.batches, &draw_ctx.records);
            }
        }
        vk_device.cmd_end_rendering(cb);
    }

    // The last opened buffer also hands the swapchain image over for presenting
    let last = current.unwrap();
    vk_device.cmd_pipeline_barrier(state.command_buffers[last], vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::PipelineStageFlags::BOTTOM_OF_PIPE, vk::DependencyFlags::empty(), &[], &[], &[ present_barrier ]);
    vk_device.end_command_buffer(state.command_buffers[last])?;

    Ok(last + 1)
}



/// Submits the recorded command buffers with the chained wait semaphores, fencing the last submit.
unsafe fn submit_frame(device: &Device, state: &FrameState, cb_count: usize) -> Result<(), vk::Result> {
    let vk_device = device.device();

    for k in 0..cb_count {
        let wait_sem = if k == 0 { state.img_acquired_sem.vk() } else { state.chain_sems[k - 1].vk() };
        let wait_stage = if k == 0 { vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT } else { vk::PipelineStageFlags::TOP_OF_PIPE };
        let signal_sem = if k == cb_count - 1 { state.render_complete_sem.vk() } else { state.chain_sems[k].vk() };

        let submit_info = vk::SubmitInfo {
            s_type : vk::StructureType::SUBMIT_INFO,
            p_next : ptr::null(),

            wait_semaphore_count : 1,
            p_wait_semaphores    : &wait_sem,
            p_wait_dst_stage_mask : &wait_stage,

            command_buffer_count : 1,
            p_command_buffers    : &state.command_buffers[k],

            signal_semaphore_count : 1,
            p_signal_semaphores    : &signal_sem,
        };
        let fence = if k == cb_count - 1 { state.fence.vk() } else { vk::Fence::null() };
        vk_device.queue_submit(device.queues().graphics, &[ submit_info ], fence)?;
    }

    Ok(())
}



/// Performs the resize handshake with the main thread.
///
/// Rebuilds the swapchain, flushes the main thread out of any frame wait, signals it, waits for the acknowledgement, and then resets the frame protocol so both sides resume at frame 0.
///
/// # Returns
/// False if a stop was requested while waiting for the acknowledgement.
fn handle_resize(shared: &Shared) -> bool {
    info!("Swapchain out of date; performing resize handshake");

    // Nothing may use the old images while we swap them out
    if let Err(err) = unsafe { shared.device.device_wait_idle() } {
        render_fatal!("Could not wait for device idle during resize: {}", err);
    }

    // Rebuild the swapchain at the latest known window size, so the main thread reimports valid targets
    {
        let extent = *shared.window_extent.lock().expect("Could not lock window extent");
        let mut swapchain = shared.swapchain.write().expect("Could not lock swapchain");
        if let Err(err) = swapchain.rebuild(extent.width, extent.height) {
            render_fatal!("Could not rebuild swapchain: {}", err);
        }
    }

    // The main thread may be blocked waiting for a frame; poke every signal so it reaches its resize check
    for slot in &shared.frames {
        slot.signal.post();
    }

    // Tell the main thread, then wait for it to have reimported the render targets and pass contexts.
    // The acknowledgement also resets the frame semaphores (see `ack_resize()`), so that happens
    // while this thread is parked here and cannot race it.
    shared.resized.post();
    shared.resize_ack.wait();
    if shared.stop.load(Ordering::Relaxed) { return false; }

    // Both sides resume at frame 0; whatever was still fenced has retired by the wait-idle above
    for slot in &shared.frames {
        let mut state = slot.state.lock().expect("Could not lock frame state");
        if state.fence_in_flight {
            if let Err(err) = state.fence.wait_and_reset() {
                render_fatal!("Could not reset frame fence during resize: {}", err);
            }
            state.fence_in_flight = false;
        }
    }

    true
}



/// The body of the render thread itself.
fn render_loop(shared: Arc<Shared>) {
    debug!("Render thread up");
    let device = shared.device.clone();

    let mut frame_idx: usize = 0;
    'game: loop {
        if shared.stop.load(Ordering::Relaxed) { break; }
        let slot = &shared.frames[frame_idx];

        // Wait for the main thread to have prepared this frame
        slot.wait.wait();
        if shared.stop.load(Ordering::Relaxed) { break; }

        // Acquire the next swapchain image, recovering from out-of-date chains
        let (image_index, swapchain_image) = {
            let swapchain = shared.swapchain.read().expect("Could not lock swapchain");
            let acquire_sem = slot.state.lock().expect("Could not lock frame state").img_acquired_sem.vk();
            match swapchain.next_image(acquire_sem) {
                Ok(Some(index)) => (index, swapchain.images()[index as usize]),
                Ok(None)        => {
                    drop(swapchain);
                    if !handle_resize(&shared) { break 'game; }
                    frame_idx = 0;
                    continue 'game;
                },
                Err(err) => { render_fatal!("Could not acquire swapchain image: {}", err); },
            }
        };

        // This slot's previous submission must have fully retired before we touch its command buffers
        let mut state = slot.state.lock().expect("Could not lock frame state");
        if state.fence_in_flight {
            if let Err(err) = state.fence.wait_and_reset() {
                render_fatal!("Could not wait for frame fence: {}", err);
            }
            state.fence_in_flight = false;
        }
        state.swapchain_image_index = image_index;

        // Record and submit
        let cb_count = match unsafe { record_frame(&device, swapchain_image, &mut state) } {
            Ok(count) => count,
            Err(err)  => { render_fatal!("Could not record frame {}: {}", frame_idx, err); },
        };
        if let Err(err) = unsafe { submit_frame(&device, &state, cb_count) } {
            render_fatal!("Could not submit frame {}: {}", frame_idx, err);
        }
        state.fence_in_flight = true;

        // Present, waiting for the render to complete
        let needs_rebuild = {
            let swapchain = shared.swapchain.read().expect("Could not lock swapchain");
            match swapchain.present(device.queues().present, image_index, &[ state.render_complete_sem.vk() ]) {
                Ok(needs_rebuild) => needs_rebuild,
                Err(err)          => { render_fatal!("Could not present frame {}: {}", frame_idx, err); },
            }
        };
        drop(state);

        // The frame is done as far as the main thread is concerned
        slot.signal.post();

        // Advance (or restart after a resize)
        if needs_rebuild {
            if !handle_resize(&shared) { break 'game; }
            frame_idx = 0;
        } else {
            frame_idx = (frame_idx + 1) % MAX_FRAME_STATES;
        }
    }

    // Drain whatever is still in flight before we let the device objects go
    if let Err(err) = unsafe { device.device_wait_idle() } {
        warn!("Could not wait for device idle during shutdown: {}", err);
    }
    debug!("Render thread down");
}





/***** HELPER STRUCTS *****/
/// The state shared between the RenderThread handle (main thread) and the render loop.
struct Shared {
    /// The Device, shared read-only
    device : Arc<Device>,

    /// The swapchain; replaced by the render thread on resize, read by the main thread on reimport
    swapchain : RwLock<Swapchain>,
    /// The frame slots
    frames    : Vec<FrameSlot>,

    /// The stop flag, checked at the top of every loop iteration
    stop          : AtomicBool,
    /// Posted by the render thread when the swapchain was rebuilt and the main thread must reimport
    resized       : Semaphore,
    /// Posted by the main thread when it has finished reimporting
    resize_ack    : Semaphore,
    /// The latest known window size, fed by the main thread's event loop
    window_extent : Mutex<vk::Extent2D>,
}





/***** LIBRARY *****/
/// The RenderThread owns the Vulkan device objects and runs the GPU submission loop on its own OS thread.
///
/// Construction happens on the main thread; `spawn()` starts the loop once the systems have registered their passes. The other subsystems hold a shared handle to this struct and reach the device objects through it.
pub struct RenderThread {
    /// The Instance everything lives on
    instance : Arc<Instance>,
    /// The debug messenger, if validation is enabled
    _debug_messenger : Option<DebugMessenger>,
    /// The Surface we present to
    surface : Arc<Surface>,
    /// The Device all subsystems render with
    device : Arc<Device>,

    /// The allocator backing the per-frame temporary GPU buffers
    allocator : Mutex<Allocator>,
    /// The state shared with the loop
    shared : Arc<Shared>,
    /// The loop thread itself, once spawned
    handle : Mutex<Option<JoinHandle<()>>>,
}

impl RenderThread {
    /// Constructor for the RenderThread.
    ///
    /// Creates the instance, debug messenger, surface, device, swapchain, allocator and the per-frame states. Does _not_ start the loop yet; call `spawn()` for that once the passes are registered.
    ///
    /// # Arguments
    /// - `window`: The Window to present to.
    /// - `name`: The name of the application to register in the Vulkan driver.
    /// - `version`: The version of the application to register in the Vulkan driver.
    /// - `gpu`: The index of the GPU to use, or None to select the best one automatically.
    /// - `debug`: If true, enables the validation layers and debug object names.
    ///
    /// # Errors
    /// This function errors if any of the device objects could not be created.
    pub fn new<S: AsRef<str>>(window: &WWindow, name: S, version: Version, gpu: Option<usize>, debug: bool) -> Result<Arc<Self>, Error> {
        // Collect the extensions and layers for the instance
        let extensions: Vec<&str> = if debug { vec![ "VK_EXT_debug_utils" ] } else { vec![] };
        let layers: Vec<&str>     = if debug { vec![ "VK_LAYER_KHRONOS_validation" ] } else { vec![] };

        // Create the instance
        let instance = match Instance::new(name, version, ENGINE_NAME, Version::new(0, 1, 0), &extensions, &layers) {
            Ok(instance) => Arc::new(instance),
            Err(err)     => { return Err(Error::InstanceCreateError{ err }); }
        };

        // Hook the validation layers into the log
        let debug_messenger = if debug {
            match DebugMessenger::new(instance.clone()) {
                Ok(messenger) => Some(messenger),
                Err(err)      => { return Err(Error::DebugMessengerCreateError{ err }); }
            }
        } else {
            None
        };

        // Create the surface for the window
        let surface = match Surface::new(instance.clone(), window) {
            Ok(surface) => surface,
            Err(err)    => { return Err(Error::SurfaceCreateError{ err }); }
        };

        // Pick and create the device
        let gpu_index = match gpu {
            Some(index) => index,
            None        => match Device::auto_select(&instance) {
                Ok(index) => index,
                Err(err)  => { return Err(Error::DeviceCreateError{ err }); }
            },
        };
        let device = match Device::new(instance.clone(), &surface, gpu_index, debug) {
            Ok(device) => device,
            Err(err)   => { return Err(Error::DeviceCreateError{ err }); }
        };
        info!("Rendering on device {} '{}' ({})", gpu_index, device.name(), device.kind());

        // Create the swapchain at the window's current size
        let window_size = window.inner_size();
        let swapchain = match Swapchain::new(device.clone(), surface.clone(), window_size.width, window_size.height, MAX_FRAME_STATES as u32) {
            Ok(swapchain) => swapchain,
            Err(err)      => { return Err(Error::SwapchainCreateError{ err }); }
        };

        // Create the allocator for the per-frame temporary GPU buffers
        let mut allocator = match Allocator::new(&AllocatorCreateDesc {
            instance         : instance.vk().clone(),
            device           : device.device().clone(),
            physical_device  : device.physical_device(),
            debug_settings   : Default::default(),
            buffer_device_address : false,
        }) {
            Ok(allocator) => allocator,
            Err(err)      => { return Err(Error::AllocatorCreateError{ err }); }
        };

        // Create the frame slots
        let mut frames: Vec<FrameSlot> = Vec::with_capacity(MAX_FRAME_STATES);
        for i in 0..MAX_FRAME_STATES {
            frames.push(Self::create_frame_slot(&device, &mut allocator, i)?);
        }

        // Collect everything in the shared state and we're ready to spawn
        let shared = Arc::new(Shared {
            device : device.clone(),

            swapchain : RwLock::new(swapchain),
            frames,

            stop          : AtomicBool::new(false),
            resized       : Semaphore::new(0),
            resize_ack    : Semaphore::new(0),
            window_extent : Mutex::new(vk::Extent2D{ width: window_size.width, height: window_size.height }),
        });

        Ok(Arc::new(Self {
            instance,
            _debug_messenger : debug_messenger,
            surface,
            device,

            allocator : Mutex::new(allocator),
            shared,
            handle : Mutex::new(None),
        }))
    }

    /// Creates a single frame slot, with its semaphores, command pool, sync objects and temporary GPU buffer.
    fn create_frame_slot(device: &Arc<Device>, allocator: &mut Allocator, index: usize) -> Result<FrameSlot, Error> {
        // The command pool; its buffers get allocated when the passes register
        let pool_info = vk::CommandPoolCreateInfo {
            s_type : vk::StructureType::COMMAND_POOL_CREATE_INFO,
            p_next : ptr::null(),
            flags  : vk::CommandPoolCreateFlags::TRANSIENT,
            queue_family_index : device.families().graphics,
        };
        let command_pool = unsafe {
            match device.create_command_pool(&pool_info, None) {
                Ok(pool) => pool,
                Err(err) => { return Err(Error::CommandPoolCreateError{ err }); }
            }
        };
        device.set_debug_name(command_pool, &format!("Frame {} Command Pool", index));

        // The Vulkan-side sync objects
        let img_acquired_sem    = VkSemaphore::new(device.clone()).map_err(|err| Error::SemaphoreCreateError{ err })?;
        let render_complete_sem = VkSemaphore::new(device.clone()).map_err(|err| Error::SemaphoreCreateError{ err })?;
        let fence               = Fence::new(device.clone(), false).map_err(|err| Error::FenceCreateError{ err })?;

        // The GPU-side mirror of the temporary host buffer
        let buffer_info = vk::BufferCreateInfo {
            s_type : vk::StructureType::BUFFER_CREATE_INFO,
            p_next : ptr::null(),
            flags  : vk::BufferCreateFlags::empty(),

            size  : TMP_BUFFER_SIZE,
            usage : vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::STORAGE_BUFFER,

            sharing_mode             : vk::SharingMode::EXCLUSIVE,
            queue_family_index_count : 0,
            p_queue_family_indices   : ptr::null(),
        };
        let tmp_gpu_buffer = unsafe {
            match device.create_buffer(&buffer_info, None) {
                Ok(buffer) => buffer,
                Err(err)   => { return Err(Error::TmpBufferCreateError{ err }); }
            }
        };
        let requirements = unsafe { device.get_buffer_memory_requirements(tmp_gpu_buffer) };
        let tmp_gpu_alloc = match allocator.allocate(&AllocationCreateDesc {
            name         : &format!("Frame {} Tmp GPU Buffer", index),
            requirements,
            location     : MemoryLocation::GpuOnly,
            linear       : true,
        }) {
            Ok(alloc) => alloc,
            Err(err)  => { return Err(Error::TmpBufferAllocateError{ err }); }
        };
        if let Err(err) = unsafe { device.bind_buffer_memory(tmp_gpu_buffer, tmp_gpu_alloc.memory(), tmp_gpu_alloc.offset()) } {
            return Err(Error::TmpBufferBindError{ err });
        }
        device.set_debug_name(tmp_gpu_buffer, &format!("Frame {} Tmp GPU Buffer", index));

        Ok(FrameSlot {
            wait   : Semaphore::new(1),
            signal : Semaphore::new(0),
            state  : std::sync::Mutex::new(FrameState {
                command_pool,
                command_buffers : vec![],
                chain_sems      : vec![],

                img_acquired_sem,
                render_complete_sem,
                fence,
                fence_in_flight : false,

                swapchain_image_index : 0,

                tmp_gpu_buffer,
                tmp_gpu_alloc : Some(tmp_gpu_alloc),

                pass_contexts : vec![],
                draw_contexts : vec![],

                buf_copy_queue     : vec![],
                buf_img_copy_queue : vec![],
            }),
        })
    }



    /// (Re)allocates the pass command buffers (plus the upload buffer) and the chain semaphores for every frame.
    ///
    /// Called by the render pipeline once the pass graph has been sorted and split; must not be called while the loop is running a frame that uses the old buffers.
    ///
    /// # Arguments
    /// - `pass_cb_count`: The number of command buffers the passes were split over (the upload buffer comes on top of this).
    ///
    /// # Errors
    /// This function errors if the command buffers or semaphores could not be created.
    pub fn realloc_pass_command_buffers(&self, pass_cb_count: u32) -> Result<(), Error> {
        let total = (pass_cb_count + 1) as usize;
        for (i, slot) in self.shared.frames.iter().enumerate() {
            let mut state = slot.state.lock().expect("Could not lock frame state");

            // Free whatever was there
            if !state.command_buffers.is_empty() {
                unsafe { self.device.free_command_buffers(state.command_pool, &state.command_buffers); }
                state.command_buffers.clear();
            }
            state.chain_sems.clear();

            // Allocate the new buffers
            let alloc_info = vk::CommandBufferAllocateInfo {
                s_type : vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
                p_next : ptr::null(),
                level  : vk::CommandBufferLevel::PRIMARY,

                command_pool         : state.command_pool,
                command_buffer_count : total as u32,
            };
            state.command_buffers = unsafe {
                match self.device.allocate_command_buffers(&alloc_info) {
                    Ok(buffers) => buffers,
                    Err(err)    => { return Err(Error::CommandBufferAllocateError{ err }); }
                }
            };
            for (k, cb) in state.command_buffers.iter().enumerate() {
                self.device.set_debug_name(*cb, &format!("Frame {} Pass Command Buffer {}", i, k));
            }

            // And the semaphores that chain their submits
            for _ in 0..total {
                state.chain_sems.push(VkSemaphore::new(self.device.clone()).map_err(|err| Error::SemaphoreCreateError{ err })?);
            }
        }
        Ok(())
    }



    /// Starts the render loop. Call once, after the passes are registered.
    pub fn spawn(&self) -> Result<(), Error> {
        let shared = self.shared.clone();
        let handle = match thread::Builder::new().name("render".into()).spawn(move || render_loop(shared)) {
            Ok(handle) => handle,
            Err(err)   => { return Err(Error::SpawnError{ err }); }
        };
        *self.handle.lock().expect("Could not lock thread handle") = Some(handle);
        Ok(())
    }

    /// Signals the render thread that the given frame has been prepared by the main thread.
    #[inline]
    pub fn signal_render(&self, frame_idx: usize) {
        self.shared.frames[frame_idx].wait.post();
    }

    /// Blocks the main thread until the render thread has completed the given frame.
    #[inline]
    pub fn wait_render(&self, frame_idx: usize) {
        self.shared.frames[frame_idx].signal.wait();
    }

    /// Returns whether the render thread has posted a resize since the last check.
    ///
    /// When this returns true, the main thread must reimport the render targets and pass contexts and then call `ack_resize()`.
    #[inline]
    pub fn swapchain_resized(&self) -> bool {
        self.shared.resized.try_wait()
    }

    /// Acknowledges a resize, letting the render thread resume at frame 0.
    ///
    /// Also restarts the frame protocol: counting semaphores with outstanding posts cannot simply be re-used, so every slot's pair is reset to its initial counts (wait 1, signal 0). This happens here, on the main thread, while the render thread is still parked on the acknowledgement.
    pub fn ack_resize(&self) {
        for slot in &self.shared.frames {
            slot.wait.reset(1);
            slot.signal.reset(0);
        }
        self.shared.resize_ack.post();
    }

    /// Updates the window size the swapchain gets rebuilt at. Fed from the main thread's event loop.
    #[inline]
    pub fn set_window_extent(&self, width: u32, height: u32) {
        *self.shared.window_extent.lock().expect("Could not lock window extent") = vk::Extent2D{ width, height };
    }



    /// Stops the render loop and waits for it to exit.
    pub fn stop(&self) {
        let handle = self.handle.lock().expect("Could not lock thread handle").take();
        if let Some(handle) = handle {
            debug!("Stopping render thread...");
            self.shared.stop.store(true, Ordering::Relaxed);

            // Unblock it wherever it might be waiting
            for slot in &self.shared.frames {
                slot.wait.post();
            }
            self.shared.resize_ack.post();

            if handle.join().is_err() {
                warn!("Render thread panicked during shutdown");
            }
        }
    }



    /// Returns the Instance everything lives on.
    #[inline]
    pub fn instance(&self) -> &Arc<Instance> { &self.instance }

    /// Returns the Surface we present to.
    #[inline]
    pub fn surface(&self) -> &Arc<Surface> { &self.surface }

    /// Returns the Device all subsystems render with.
    #[inline]
    pub fn device(&self) -> &Arc<Device> { &self.device }

    /// Returns the swapchain lock. The render thread replaces the swapchain on resize; the main thread reads it while reimporting.
    #[inline]
    pub fn swapchain(&self) -> &RwLock<Swapchain> { &self.shared.swapchain }

    /// Returns the given frame slot.
    #[inline]
    pub fn frame(&self, frame_idx: usize) -> &FrameSlot { &self.shared.frames[frame_idx] }

    /// Returns all frame slots.
    #[inline]
    pub fn frames(&self) -> &[FrameSlot] { &self.shared.frames }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        // Make sure the loop is gone and the device is quiet
        self.stop();
        if let Err(err) = unsafe { self.device.device_wait_idle() } {
            warn!("Could not wait for device idle during teardown: {}", err);
        }

        // Tear the per-frame Vulkan objects down
        let mut allocator = self.allocator.lock().expect("Could not lock allocator");
        for slot in &self.shared.frames {
            let mut state = slot.state.lock().expect("Could not lock frame state");
            unsafe {
                if !state.command_buffers.is_empty() {
                    self.device.free_command_buffers(state.command_pool, &state.command_buffers);
                }
                self.device.destroy_command_pool(state.command_pool, None);
                self.device.destroy_buffer(state.tmp_gpu_buffer, None);
            }
            if let Some(alloc) = state.tmp_gpu_alloc.take() {
                if let Err(err) = allocator.free(alloc) {
                    warn!("Could not free temporary GPU buffer allocation: {}", err);
                }
            }
        }
    }
}
