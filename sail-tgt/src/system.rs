//  SYSTEM.rs
//    by Lut99
//
//  Created:
//    15 Oct 2022, 13:55:38
//  Last edited:
//    14 Jan 2023, 17:31:19
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the RenderTargetSystem, which owns the catalog of named
//!   render targets and keeps it in sync with the swapchain.
//

use std::cell::RefCell;
use std::error::Error as StdError;
use std::ptr;
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use log::debug;

use sail_ecs::spec::{System, SystemId};
use sail_gfx::RenderSystem;
use sail_gfx::spec::GpuImage;
use sail_thr::RenderThread;
use sail_thr::spec::MAX_FRAME_STATES;

pub use crate::errors::RenderTargetError as Error;
use crate::{CASCADE_COUNT, PREFILTER_MIP_COUNT, RENDER_TARGET_SYSTEM_ID};
use crate::spec::{RenderTargetId, TargetDescriptor, TargetSize};


/***** HELPER FUNCTIONS *****/
/// Resolves a target's size rule against the current swapchain extent.
fn resolve_extent(size: &TargetSize, swap_extent: vk::Extent2D) -> vk::Extent3D {
    match size {
        TargetSize::Absolute{ width, height }     => vk::Extent3D{ width: *width, height: *height, depth: 1 },
        TargetSize::SwapchainRelative{ divisor }  => vk::Extent3D{
            width  : std::cmp::max(swap_extent.width / divisor, 1),
            height : std::cmp::max(swap_extent.height / divisor, 1),
            depth  : 1,
        },
    }
}

/// Populates the create info for a target's image.
fn populate_image_info(desc: &TargetDescriptor, extent: vk::Extent3D) -> vk::ImageCreateInfo {
    vk::ImageCreateInfo {
        s_type : vk::StructureType::IMAGE_CREATE_INFO,
        p_next : ptr::null(),
        flags  : if desc.view_type == vk::ImageViewType::CUBE { vk::ImageCreateFlags::CUBE_COMPATIBLE } else { vk::ImageCreateFlags::empty() },

        image_type : vk::ImageType::TYPE_2D,
        format     : desc.format,
        extent,
        mip_levels   : desc.mip_count,
        array_layers : desc.layer_count,

        samples : vk::SampleCountFlags::TYPE_1,
        tiling  : vk::ImageTiling::OPTIMAL,
        usage   : desc.usage,

        sharing_mode             : vk::SharingMode::EXCLUSIVE,
        queue_family_index_count : 0,
        p_queue_family_indices   : ptr::null(),

        initial_layout : vk::ImageLayout::UNDEFINED,
    }
}

/// Populates the create info for a view on a target's image.
fn populate_view_info(image: vk::Image, desc: &TargetDescriptor, view_type: vk::ImageViewType, base_mip: u32, mip_count: u32) -> vk::ImageViewCreateInfo {
    vk::ImageViewCreateInfo {
        s_type : vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        p_next : ptr::null(),
        flags  : vk::ImageViewCreateFlags::empty(),

        image,
        view_type,
        format : desc.format,

        components : vk::ComponentMapping {
            r : vk::ComponentSwizzle::IDENTITY,
            g : vk::ComponentSwizzle::IDENTITY,
            b : vk::ComponentSwizzle::IDENTITY,
            a : vk::ComponentSwizzle::IDENTITY,
        },
        subresource_range : vk::ImageSubresourceRange {
            aspect_mask      : desc.aspect,
            base_mip_level   : base_mip,
            level_count      : mip_count,
            base_array_layer : 0,
            layer_count      : desc.layer_count,
        },
    }
}





/***** HELPER STRUCTS *****/
/// One frame-in-flight slice of a render target.
struct TargetFrame {
    /// The image handle (owned or imported)
    vk_image  : vk::Image,
    /// The owning allocation, if the catalog owns the image
    owned     : Option<GpuImage>,
    /// The default (full) view
    view      : vk::ImageView,
    /// One view per mip level
    mip_views : Vec<vk::ImageView>,
}

/// A named, format-typed image resource in the catalog.
struct RenderTarget {
    /// The descriptor the target was created from
    desc     : TargetDescriptor,
    /// The resolved extent of mip 0
    extent   : vk::Extent3D,
    /// Whether the images are imported (swapchain) rather than owned
    imported : bool,
    /// The per-frame-in-flight images and views
    frames   : Vec<TargetFrame>,
}





/***** LIBRARY *****/
/// The RenderTargetSystem owns the catalog of named render targets.
///
/// Every target has one image per frame in flight, so frame `i-1` may still be read while frame `i` records. The swapchain target is imported; its images belong to the presentation engine and are refreshed on resize.
pub struct RenderTargetSystem {
    /// The render system we create images and views through.
    render_system : Rc<RefCell<RenderSystem>>,
    /// The render thread whose swapchain we import.
    thread        : Arc<RenderThread>,

    /// The catalog itself, indexed by RenderTargetId.
    targets : Vec<RenderTarget>,

    /// The depth buffer
    pub depth_buffer          : RenderTargetId,
    /// The world-space normal buffer
    pub normal_buffer         : RenderTargetId,
    /// The HDR color buffer all scene passes render into
    pub hdr_color             : RenderTargetId,
    /// The environment capture cube (6 layers, rendered with multiview)
    pub env_cube              : RenderTargetId,
    /// The irradiance convolution cube
    pub irradiance_map        : RenderTargetId,
    /// The prefiltered environment cube (one mip per roughness bucket)
    pub prefiltered_cube      : RenderTargetId,
    /// The shadow map cascades
    pub shadow_maps           : [RenderTargetId; CASCADE_COUNT],
    /// The sampleable copy of the depth buffer
    pub depth_buffer_copy     : RenderTargetId,
    /// The sampleable copy of the HDR color buffer
    pub color_copy            : RenderTargetId,
    /// The half-resolution brightness downsample
    pub brightness_downsample : RenderTargetId,
    /// The swapchain (imported)
    pub swapchain             : RenderTargetId,
}

impl RenderTargetSystem {
    /// Constructor for the RenderTargetSystem, which populates the default catalog.
    ///
    /// # Arguments
    /// - `render_system`: The RenderSystem to create images and views through.
    /// - `thread`: The RenderThread whose swapchain we import.
    ///
    /// # Errors
    /// This function errors if any of the targets could not be created.
    pub fn new(render_system: Rc<RefCell<RenderSystem>>, thread: Arc<RenderThread>) -> Result<Self, Error> {
        let swap_extent: vk::Extent2D = thread.swapchain().read().expect("Could not lock swapchain").extent();

        let mut this = Self {
            render_system,
            thread,

            targets : Vec::with_capacity(16),

            depth_buffer          : RenderTargetId(0),
            normal_buffer         : RenderTargetId(0),
            hdr_color             : RenderTargetId(0),
            env_cube              : RenderTargetId(0),
            irradiance_map        : RenderTargetId(0),
            prefiltered_cube      : RenderTargetId(0),
            shadow_maps           : [RenderTargetId(0); CASCADE_COUNT],
            depth_buffer_copy     : RenderTargetId(0),
            color_copy            : RenderTargetId(0),
            brightness_downsample : RenderTargetId(0),
            swapchain             : RenderTargetId(0),
        };

        // The surface-sized scene targets
        this.depth_buffer = this.register(TargetDescriptor {
            name        : "Depth Buffer",
            format      : vk::Format::D32_SFLOAT,
            size        : TargetSize::SwapchainRelative{ divisor: 1 },
            mip_count   : 1,
            layer_count : 1,
            usage       : vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect      : vk::ImageAspectFlags::DEPTH,
            view_type   : vk::ImageViewType::TYPE_2D,
        }, swap_extent)?;
        this.normal_buffer = this.register(TargetDescriptor {
            name        : "Normal Buffer",
            format      : vk::Format::R8G8B8A8_UNORM,
            size        : TargetSize::SwapchainRelative{ divisor: 1 },
            mip_count   : 1,
            layer_count : 1,
            usage       : vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect      : vk::ImageAspectFlags::COLOR,
            view_type   : vk::ImageViewType::TYPE_2D,
        }, swap_extent)?;
        this.hdr_color = this.register(TargetDescriptor {
            name        : "HDR Color",
            format      : vk::Format::R16G16B16A16_SFLOAT,
            size        : TargetSize::SwapchainRelative{ divisor: 1 },
            mip_count   : 1,
            layer_count : 1,
            usage       : vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect      : vk::ImageAspectFlags::COLOR,
            view_type   : vk::ImageViewType::TYPE_2D,
        }, swap_extent)?;

        // The environment lighting cubes
        this.env_cube = this.register(TargetDescriptor {
            name        : "Environment Cube",
            format      : vk::Format::R16G16B16A16_SFLOAT,
            size        : TargetSize::Absolute{ width: 512, height: 512 },
            mip_count   : 1,
            layer_count : 6,
            usage       : vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect      : vk::ImageAspectFlags::COLOR,
            view_type   : vk::ImageViewType::CUBE,
        }, swap_extent)?;
        this.irradiance_map = this.register(TargetDescriptor {
            name        : "Irradiance Map",
            format      : vk::Format::R16G16B16A16_SFLOAT,
            size        : TargetSize::Absolute{ width: 64, height: 64 },
            mip_count   : 1,
            layer_count : 6,
            usage       : vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect      : vk::ImageAspectFlags::COLOR,
            view_type   : vk::ImageViewType::CUBE,
        }, swap_extent)?;
        this.prefiltered_cube = this.register(TargetDescriptor {
            name        : "Prefiltered Environment Cube",
            format      : vk::Format::R16G16B16A16_SFLOAT,
            size        : TargetSize::Absolute{ width: 512, height: 512 },
            mip_count   : PREFILTER_MIP_COUNT,
            layer_count : 6,
            usage       : vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect      : vk::ImageAspectFlags::COLOR,
            view_type   : vk::ImageViewType::CUBE,
        }, swap_extent)?;

        // The shadow cascades
        for i in 0..CASCADE_COUNT {
            this.shadow_maps[i] = this.register(TargetDescriptor {
                name        : "Shadow Map Cascade",
                format      : vk::Format::D32_SFLOAT,
                size        : TargetSize::Absolute{ width: 2048, height: 2048 },
                mip_count   : 1,
                layer_count : 1,
                usage       : vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                aspect      : vk::ImageAspectFlags::DEPTH,
                view_type   : vk::ImageViewType::TYPE_2D,
            }, swap_extent)?;
        }

        // The sampleable copies and the bloom chain input
        this.depth_buffer_copy = this.register(TargetDescriptor {
            name        : "Depth Buffer Copy",
            format      : vk::Format::R32_SFLOAT,
            size        : TargetSize::SwapchainRelative{ divisor: 1 },
            mip_count   : 1,
            layer_count : 1,
            usage       : vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect      : vk::ImageAspectFlags::COLOR,
            view_type   : vk::ImageViewType::TYPE_2D,
        }, swap_extent)?;
        this.color_copy = this.register(TargetDescriptor {
            name        : "Color Copy",
            format      : vk::Format::R16G16B16A16_SFLOAT,
            size        : TargetSize::SwapchainRelative{ divisor: 1 },
            mip_count   : 1,
            layer_count : 1,
            usage       : vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect      : vk::ImageAspectFlags::COLOR,
            view_type   : vk::ImageViewType::TYPE_2D,
        }, swap_extent)?;
        this.brightness_downsample = this.register(TargetDescriptor {
            name        : "Brightness Downsample",
            format      : vk::Format::R16G16B16A16_SFLOAT,
            size        : TargetSize::SwapchainRelative{ divisor: 2 },
            mip_count   : 1,
            layer_count : 1,
            usage       : vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect      : vk::ImageAspectFlags::COLOR,
            view_type   : vk::ImageViewType::TYPE_2D,
        }, swap_extent)?;

        // And finally the imported swapchain itself
        this.swapchain = this.import_swapchain()?;

        debug!("Initialized RenderTargetSystem v{} with {} targets", env!("CARGO_PKG_VERSION"), this.targets.len());
        Ok(this)
    }

    /// Registers a single owned target in the catalog, creating its per-frame images and views.
    fn register(&mut self, desc: TargetDescriptor, swap_extent: vk::Extent2D) -> Result<RenderTargetId, Error> {
        let extent = resolve_extent(&desc.size, swap_extent);
        let frames = self.create_frames(&desc, extent)?;

        let id = RenderTargetId(self.targets.len() as u32);
        self.targets.push(RenderTarget {
            desc,
            extent,
            imported : false,
            frames,
        });
        debug!("Registered render target '{}' as ID {}", self.targets[id.0 as usize].desc.name, id);
        Ok(id)
    }

    /// Creates the per-frame images and views for an owned target.
    fn create_frames(&self, desc: &TargetDescriptor, extent: vk::Extent3D) -> Result<Vec<TargetFrame>, Error> {
        let mut render_system = self.render_system.borrow_mut();

        let image_info = populate_image_info(desc, extent);
        let mut frames: Vec<TargetFrame> = Vec::with_capacity(MAX_FRAME_STATES);
        for _ in 0..MAX_FRAME_STATES {
            // The image itself
            let image = match render_system.alloc_gpu_image(&image_info, desc.name) {
                Ok(image) => image,
                Err(err)  => { return Err(Error::ImageCreateError{ name: desc.name, err }); }
            };

            // The default (full) view
            let view_info = populate_view_info(image.image, desc, desc.view_type, 0, desc.mip_count);
            let view = match render_system.create_image_view(&view_info, desc.name) {
                Ok(view) => view,
                Err(err) => { return Err(Error::ViewCreateError{ name: desc.name, err }); }
            };

            // One view per mip level; attachments render into these
            let mip_view_type = if desc.layer_count > 1 { vk::ImageViewType::TYPE_2D_ARRAY } else { vk::ImageViewType::TYPE_2D };
            let mut mip_views: Vec<vk::ImageView> = Vec::with_capacity(desc.mip_count as usize);
            for mip in 0..desc.mip_count {
                let mip_info = populate_view_info(image.image, desc, mip_view_type, mip, 1);
                match render_system.create_image_view(&mip_info, desc.name) {
                    Ok(view) => { mip_views.push(view); },
                    Err(err) => { return Err(Error::ViewCreateError{ name: desc.name, err }); }
                }
            }

            frames.push(TargetFrame {
                vk_image  : image.image,
                owned     : Some(image),
                view,
                mip_views,
            });
        }
        Ok(frames)
    }

    /// Imports the swapchain as a catalog target.
    fn import_swapchain(&mut self) -> Result<RenderTargetId, Error> {
        let (format, extent, images): (vk::Format, vk::Extent2D, Vec<vk::Image>) = {
            let swapchain = self.thread.swapchain().read().expect("Could not lock swapchain");
            (swapchain.format(), swapchain.extent(), swapchain.images().to_vec())
        };

        let desc = TargetDescriptor {
            name        : "Swapchain",
            format,
            size        : TargetSize::SwapchainRelative{ divisor: 1 },
            mip_count   : 1,
            layer_count : 1,
            usage       : vk::ImageUsageFlags::COLOR_ATTACHMENT,
            aspect      : vk::ImageAspectFlags::COLOR,
            view_type   : vk::ImageViewType::TYPE_2D,
        };

        let render_system = self.render_system.borrow();
        let mut frames: Vec<TargetFrame> = Vec::with_capacity(MAX_FRAME_STATES);
        for i in 0..MAX_FRAME_STATES {
            // The presentation engine owns the image; we just look at it
            let vk_image = images[std::cmp::min(i, images.len() - 1)];
            let view_info = populate_view_info(vk_image, &desc, desc.view_type, 0, 1);
            let view = match render_system.create_image_view(&view_info, desc.name) {
                Ok(view) => view,
                Err(err) => { return Err(Error::ViewCreateError{ name: desc.name, err }); }
            };
            frames.push(TargetFrame {
                vk_image,
                owned     : None,
                view,
                mip_views : vec![ view ],
            });
        }
        drop(render_system);

        let id = RenderTargetId(self.targets.len() as u32);
        self.targets.push(RenderTarget {
            desc,
            extent   : vk::Extent3D{ width: extent.width, height: extent.height, depth: 1 },
            imported : true,
            frames,
        });
        debug!("Imported swapchain as render target ID {}", id);
        Ok(id)
    }



    /// Re-imports the swapchain and re-creates every surface-relative target at the new size.
    ///
    /// Invoked by the main thread during the resize handshake, after the render thread has rebuilt the swapchain.
    ///
    /// # Errors
    /// This function errors if any image or view could not be re-created.
    pub fn reimport_swapchain(&mut self) -> Result<(), Error> {
        let (format, swap_extent, images): (vk::Format, vk::Extent2D, Vec<vk::Image>) = {
            let swapchain = self.thread.swapchain().read().expect("Could not lock swapchain");
            (swapchain.format(), swapchain.extent(), swapchain.images().to_vec())
        };
        debug!("Reimporting swapchain at {}x{}", swap_extent.width, swap_extent.height);

        for target_idx in 0..self.targets.len() {
            let imported = self.targets[target_idx].imported;
            let is_relative = matches!(self.targets[target_idx].desc.size, TargetSize::SwapchainRelative{ .. });
            if !imported && !is_relative { continue; }

            // Tear the old frames down
            let old_frames: Vec<TargetFrame> = self.targets[target_idx].frames.drain(..).collect();
            {
                let mut render_system = self.render_system.borrow_mut();
                for mut frame in old_frames {
                    // The swapchain target's default view doubles as its only mip view
                    render_system.destroy_image_view(frame.view);
                    if !imported {
                        for mip_view in frame.mip_views {
                            render_system.destroy_image_view(mip_view);
                        }
                    }
                    if let Some(image) = frame.owned.take() {
                        render_system.free_gpu_image(image);
                    }
                }
            }

            if imported {
                // Refresh the imported images and their views
                self.targets[target_idx].desc.format = format;
                self.targets[target_idx].extent      = vk::Extent3D{ width: swap_extent.width, height: swap_extent.height, depth: 1 };

                let desc = self.targets[target_idx].desc;
                let render_system = self.render_system.borrow();
                let mut frames: Vec<TargetFrame> = Vec::with_capacity(MAX_FRAME_STATES);
                for i in 0..MAX_FRAME_STATES {
                    let vk_image = images[std::cmp::min(i, images.len() - 1)];
                    let view_info = populate_view_info(vk_image, &desc, desc.view_type, 0, 1);
                    let view = match render_system.create_image_view(&view_info, desc.name) {
                        Ok(view) => view,
                        Err(err) => { return Err(Error::ViewCreateError{ name: desc.name, err }); }
                    };
                    frames.push(TargetFrame{ vk_image, owned: None, view, mip_views: vec![ view ] });
                }
                self.targets[target_idx].frames = frames;
            } else {
                // Re-create the surface-relative target at the new size
                let desc   = self.targets[target_idx].desc;
                let extent = resolve_extent(&desc.size, swap_extent);
                let frames = self.create_frames(&desc, extent)?;
                self.targets[target_idx].extent = extent;
                self.targets[target_idx].frames = frames;
            }
        }

        Ok(())
    }



    /// Returns the image of the given target for the given frame index.
    pub fn get_image(&self, frame_idx: usize, id: RenderTargetId) -> Result<vk::Image, Error> {
        Ok(self.target(id)?.frames[frame_idx].vk_image)
    }

    /// Returns the default (full) view of the given target for the given frame index.
    pub fn get_view(&self, frame_idx: usize, id: RenderTargetId) -> Result<vk::ImageView, Error> {
        Ok(self.target(id)?.frames[frame_idx].view)
    }

    /// Returns the view of a single mip of the given target for the given frame index.
    pub fn get_mip_view(&self, mip: u32, frame_idx: usize, id: RenderTargetId) -> Result<vk::ImageView, Error> {
        let target = self.target(id)?;
        if mip >= target.desc.mip_count { return Err(Error::UnknownMip{ id, mip, mip_count: target.desc.mip_count }); }
        Ok(target.frames[frame_idx].mip_views[mip as usize])
    }

    /// Returns the format of the given target.
    pub fn get_format(&self, id: RenderTargetId) -> Result<vk::Format, Error> {
        Ok(self.target(id)?.desc.format)
    }

    /// Returns the extent of the given mip of the given target.
    pub fn get_mip_extent(&self, mip: u32, id: RenderTargetId) -> Result<vk::Extent3D, Error> {
        let target = self.target(id)?;
        if mip >= target.desc.mip_count { return Err(Error::UnknownMip{ id, mip, mip_count: target.desc.mip_count }); }
        Ok(vk::Extent3D {
            width  : std::cmp::max(target.extent.width >> mip, 1),
            height : std::cmp::max(target.extent.height >> mip, 1),
            depth  : target.extent.depth,
        })
    }



    /// Looks a target up by ID.
    #[inline]
    fn target(&self, id: RenderTargetId) -> Result<&RenderTarget, Error> {
        match self.targets.get(id.0 as usize) {
            Some(target) => Ok(target),
            None         => Err(Error::UnknownTarget{ id }),
        }
    }
}

impl System for RenderTargetSystem {
    #[inline]
    fn id(&self) -> SystemId { RENDER_TARGET_SYSTEM_ID }

    /// The catalog has no per-frame work; it only reacts to resizes.
    #[inline]
    fn tick(&mut self, _delta_seconds: f32) -> Result<(), Box<dyn StdError>> {
        Ok(())
    }
}

impl Drop for RenderTargetSystem {
    fn drop(&mut self) {
        let mut render_system = self.render_system.borrow_mut();
        for target in &mut self.targets {
            for frame in &mut target.frames {
                render_system.destroy_image_view(frame.view);
                if !target.imported {
                    for mip_view in frame.mip_views.drain(..) {
                        render_system.destroy_image_view(mip_view);
                    }
                }
                if let Some(image) = frame.owned.take() {
                    render_system.free_gpu_image(image);
                }
            }
        }
    }
}
