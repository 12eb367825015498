/* SWAPCHAIN.rs
 *   by Lut99
 *
 * Created:
 *   24 Sep 2022, 16:11:32
 * Last edited:
 *   11 Jan 2023, 21:40:15
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Wraps around the SwapchainKHR to provide the Swapchain to the Game.
**/

use std::ptr;
use std::sync::Arc;

use ash::vk;
use ash::extensions::khr;
use log::{debug, warn};

pub use crate::errors::SwapchainError as Error;
use crate::device::Device;
use crate::surface::Surface;


/***** HELPER STRUCTS *****/
/// Collects what the surface supports for swapchain creation.
struct SwapchainSupport {
    /// The capabilities (extents, image counts, transforms)
    capabilities  : vk::SurfaceCapabilitiesKHR,
    /// The supported formats
    formats       : Vec<vk::SurfaceFormatKHR>,
    /// The supported present modes
    present_modes : Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Queries the support of the given surface on the given device.
    ///
    /// # Errors
    /// This function errors if any of the three queries errors.
    fn new(device: &Device, surface: &Surface) -> Result<Self, Error> {
        let capabilities = match unsafe { surface.ash().get_physical_device_surface_capabilities(device.physical_device(), surface.vk()) } {
            Ok(capabilities) => capabilities,
            Err(err)         => { return Err(Error::SurfaceCapabilitiesError{ err }); }
        };
        let formats = match unsafe { surface.ash().get_physical_device_surface_formats(device.physical_device(), surface.vk()) } {
            Ok(formats) => formats,
            Err(err)    => { return Err(Error::SurfaceFormatsError{ err }); }
        };
        let present_modes = match unsafe { surface.ash().get_physical_device_surface_present_modes(device.physical_device(), surface.vk()) } {
            Ok(modes) => modes,
            Err(err)  => { return Err(Error::SurfacePresentModesError{ err }); }
        };

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }
}



/***** HELPER FUNCTIONS *****/
/// Chooses an appropriate swapchain format from the available ones.
fn choose_format(swapchain_support: &SwapchainSupport) -> Result<(vk::Format, vk::ColorSpaceKHR), Error> {
    // Try to choose B8G8R8A8
    for avail_format in &swapchain_support.formats {
        if avail_format.format == vk::Format::B8G8R8A8_SRGB && avail_format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR {
            return Ok((avail_format.format, avail_format.color_space));
        }
    }

    // Otherwise, choose the first one
    warn!("Preferred Format not found; using first one");
    match swapchain_support.formats.first() {
        Some(format) => {
            debug!("Using unpreferred format: {:?}", format);
            Ok((format.format, format.color_space))
        },
        None => Err(Error::NoFormatFound),
    }
}

/// Chooses an appropriate swapchain present mode from the available ones.
fn choose_present_mode(_swapchain_support: &SwapchainSupport) -> Result<vk::PresentModeKHR, Error> {
    // The FIFO is always guaranteed to be present, so hit it
    Ok(vk::PresentModeKHR::FIFO)
}

/// Chooses an appropriate swapchain extent.
fn choose_extent(swapchain_support: &SwapchainSupport, width: u32, height: u32) -> Result<vk::Extent2D, Error> {
    // Get the supported width & height boundries by the swapchain
    let wmin = swapchain_support.capabilities.min_image_extent.width;
    let hmin = swapchain_support.capabilities.min_image_extent.height;
    let wmax = swapchain_support.capabilities.max_image_extent.width;
    let hmax = swapchain_support.capabilities.max_image_extent.height;

    // Clamp the width & height in between them
    let width = if width < wmin { warn!("Increasing width to {}", wmin); wmin }
    else if width > wmax { warn!("Decreasing width to {}", wmax); wmax }
    else { width };
    let height = if height < hmin { warn!("Increasing height to {}", hmin); hmin }
    else if height > hmax { warn!("Decreasing height to {}", hmax); hmax }
    else { height };

    // Return that as an extent
    Ok(vk::Extent2D{
        width,
        height,
    })
}

/// Chooses an appropriate image count for the swapchain.
fn choose_image_count(swapchain_support: &SwapchainSupport, image_count: u32) -> Result<u32, Error> {
    // Get the supported boundries by the swapchain
    let min = swapchain_support.capabilities.min_image_count;
    let max = swapchain_support.capabilities.max_image_count;

    // Clamp the image count in between that (max == 0 means unbounded)
    let image_count = if image_count < min { warn!("Increasing image_count to {}", min); min }
    else if max > 0 && image_count > max { warn!("Decreasing image_count to {}", max); max }
    else { image_count };

    // Return that as the count
    Ok(image_count)
}

/// Chooses an appropriate sharing mode for the swapchain.
fn choose_sharing_mode(device: &Device) -> Result<(vk::SharingMode, Vec<u32>), Error> {
    // If we present with the same family as we render, exclusive suffices
    let families = device.families();
    if families.graphics == families.present {
        Ok((vk::SharingMode::EXCLUSIVE, vec![]))
    } else {
        Ok((vk::SharingMode::CONCURRENT, vec![ families.graphics, families.present ]))
    }
}

/// Creates a raw swapchain (plus its properties) on the given device and surface.
///
/// # Arguments
/// - `device`: The Device to create the swapchain on.
/// - `surface`: The Surface to create the swapchain for.
/// - `loader`: The swapchain extension loader.
/// - `width`: The preferred width of the swapchain images.
/// - `height`: The preferred height of the swapchain images.
/// - `image_count`: The preferred number of swapchain images.
/// - `old_swapchain`: The swapchain to recycle resources from, if any.
///
/// # Errors
/// This function errors if the Vulkan API backend does.
fn create_swapchain(device: &Device, surface: &Surface, loader: &khr::Swapchain, width: u32, height: u32, image_count: u32, old_swapchain: vk::SwapchainKHR) -> Result<(vk::SwapchainKHR, Vec<vk::Image>, vk::Format, vk::ColorSpaceKHR, vk::PresentModeKHR, vk::Extent2D, u32), Error> {
    // First, query the device's support for this surface
    let swapchain_support = SwapchainSupport::new(device, surface)?;

    // Next, choose an appropriate swapchain format
    let (format, colour_space) = choose_format(&swapchain_support)?;
    // Next, choose an appropriate swapchain present mode
    let present_mode = choose_present_mode(&swapchain_support)?;
    // Then, choose the swapchain extent
    let extent = choose_extent(&swapchain_support, width, height)?;
    // Then, choose the image count
    let image_count = choose_image_count(&swapchain_support, image_count)?;
    // Finally, choose the sharing mode
    let (sharing_mode, queue_families) = choose_sharing_mode(device)?;

    // Use the collected info for the CreateInfo
    let swapchain_info = vk::SwapchainCreateInfoKHR {
        // Do the standard fields
        s_type : vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
        p_next : ptr::null(),
        flags  : vk::SwapchainCreateFlagsKHR::empty(),

        // Define the surface to use
        surface : surface.vk(),

        // Define the found properties
        image_format      : format,
        image_color_space : colour_space,
        present_mode,
        image_extent      : extent,
        min_image_count   : image_count,

        // Set the sharing mode, with potential queue families to share between if concurrent
        image_sharing_mode       : sharing_mode,
        queue_family_index_count : queue_families.len() as u32,
        p_queue_family_indices   : queue_families.as_ptr(),

        // Set some additional image properties
        image_usage        : vk::ImageUsageFlags::COLOR_ATTACHMENT,
        pre_transform      : swapchain_support.capabilities.current_transform,
        composite_alpha    : vk::CompositeAlphaFlagsKHR::OPAQUE,
        clipped            : vk::TRUE,
        image_array_layers : 1,

        // If we re-create the swapchain, we can use this to speed the process up
        old_swapchain,
    };

    // Create the swapchain with it
    let swapchain = unsafe {
        match loader.create_swapchain(&swapchain_info, None) {
            Ok(swapchain) => swapchain,
            Err(err)      => { return Err(Error::SwapchainCreateError{ err }); }
        }
    };

    // Get the images of the chain
    let images = unsafe {
        match loader.get_swapchain_images(swapchain) {
            Ok(images) => images,
            Err(err)   => { return Err(Error::SwapchainImagesError{ err }); }
        }
    };

    Ok((swapchain, images, format, colour_space, present_mode, extent, image_count))
}





/***** LIBRARY *****/
/// The Swapchain struct wraps the SwapchainKHR and the images we present to.
pub struct Swapchain {
    /// The Device where the Swapchain lives.
    device  : Arc<Device>,
    /// The Surface that the Swapchain presents to.
    surface : Arc<Surface>,

    /// The loader for the swapchain
    loader    : khr::Swapchain,
    /// The Swapchain itself
    swapchain : vk::SwapchainKHR,
    /// The images of the swapchain
    images    : Vec<vk::Image>,

    /// The format of the swapchain images
    format       : vk::Format,
    /// The colour space of the swapchain images
    colour_space : vk::ColorSpaceKHR,
    /// The present mode of the swapchain
    present_mode : vk::PresentModeKHR,
    /// The extent of the swapchain images
    extent       : vk::Extent2D,
    /// The number of images in the swapchain
    image_count  : u32,
}

impl Swapchain {
    /// Constructor for the Swapchain.
    ///
    /// Wraps a SwapchainKHR around the given Device and Surface.
    ///
    /// # Arguments
    /// - `device`: The Device to create the swapchain on.
    /// - `surface`: The Surface to create the swapchain for.
    /// - `width`: The preferred width of the swapchain images.
    /// - `height`: The preferred height of the swapchain images.
    /// - `image_count`: The preferred number of swapchain images.
    ///
    /// # Errors
    /// This function errors if the Vulkan API backend does.
    pub fn new(device: Arc<Device>, surface: Arc<Surface>, width: u32, height: u32, image_count: u32) -> Result<Self, Error> {
        // Create the loader, then the chain itself
        debug!("Initializing swapchain...");
        let loader = khr::Swapchain::new(device.instance().vk(), device.device());
        let (swapchain, images, format, colour_space, present_mode, extent, image_count) = create_swapchain(&device, &surface, &loader, width, height, image_count, vk::SwapchainKHR::null())?;

        // Store everything in a new Swapchain instance and return
        Ok(Self {
            device,
            surface,

            loader,
            swapchain,
            images,

            format,
            colour_space,
            present_mode,
            extent,
            image_count,
        })
    }



    /// Re-creates the Swapchain at the given size, recycling the old one.
    ///
    /// # Arguments
    /// - `width`: The new width of the swapchain images.
    /// - `height`: The new height of the swapchain images.
    ///
    /// # Errors
    /// This function errors if the Vulkan API backend does.
    pub fn rebuild(&mut self, width: u32, height: u32) -> Result<(), Error> {
        debug!("Rebuilding swapchain ({}x{})...", width, height);

        // Create the new chain while the old one still lives
        let (swapchain, images, format, colour_space, present_mode, extent, image_count) = create_swapchain(&self.device, &self.surface, &self.loader, width, height, self.image_count, self.swapchain)?;

        // Now get rid of the old one and swap the new one in place
        unsafe { self.loader.destroy_swapchain(self.swapchain, None); }
        self.swapchain    = swapchain;
        self.images       = images;
        self.format       = format;
        self.colour_space = colour_space;
        self.present_mode = present_mode;
        self.extent       = extent;
        self.image_count  = image_count;

        Ok(())
    }



    /// Acquires the next image from the swapchain.
    ///
    /// # Arguments
    /// - `semaphore`: The (binary, Vulkan) semaphore to signal when the image is actually available.
    ///
    /// # Returns
    /// The index of the acquired image, or None if the swapchain is out-of-date and must be rebuilt.
    ///
    /// # Errors
    /// This function errors if the surface is lost or the Vulkan backend errors otherwise.
    pub fn next_image(&self, semaphore: vk::Semaphore) -> Result<Option<u32>, Error> {
        match unsafe { self.loader.acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null()) } {
            Ok((index, suboptimal)) => {
                // A suboptimal chain is still usable; carry on until out-of-date
                if suboptimal { warn!("Acquired suboptimal swapchain image"); }
                Ok(Some(index))
            },
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(vk::Result::ERROR_SURFACE_LOST_KHR) => Err(Error::SurfaceLost),
            Err(err) => Err(Error::SwapchainAcquireError{ err }),
        }
    }

    /// Presents the image with the given index to the swapchain.
    ///
    /// # Arguments
    /// - `queue`: The present queue to present on.
    /// - `index`: The index of the swapchain image to present.
    /// - `wait_semaphores`: The (binary, Vulkan) semaphores to wait for before presenting.
    ///
    /// # Returns
    /// Whether the swapchain needs to be rebuilt (out-of-date or suboptimal).
    ///
    /// # Errors
    /// This function errors if the surface is lost or the Vulkan backend errors otherwise.
    pub fn present(&self, queue: vk::Queue, index: u32, wait_semaphores: &[vk::Semaphore]) -> Result<bool, Error> {
        // Populate the present info
        let present_info = vk::PresentInfoKHR {
            s_type : vk::StructureType::PRESENT_INFO_KHR,
            p_next : ptr::null(),

            // The semaphores to wait for before the image may actually be shown
            wait_semaphore_count : wait_semaphores.len() as u32,
            p_wait_semaphores    : wait_semaphores.as_ptr(),

            // The swapchain (and which of its images) to present
            swapchain_count : 1,
            p_swapchains    : &self.swapchain,
            p_image_indices : &index,

            p_results : ptr::null_mut(),
        };

        // Hit it
        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(suboptimal)                          => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR)  => Ok(true),
            Err(vk::Result::ERROR_SURFACE_LOST_KHR) => Err(Error::SurfaceLost),
            Err(err)                                => Err(Error::SwapchainPresentError{ err }),
        }
    }



    /// Returns the Vulkan swapchain.
    #[inline]
    pub fn vk(&self) -> vk::SwapchainKHR { self.swapchain }

    /// Returns the images for the swapchain.
    #[inline]
    pub fn images(&self) -> &[vk::Image] { &self.images }

    /// Returns the format of the swapchain images.
    #[inline]
    pub fn format(&self) -> vk::Format { self.format }

    /// Returns the extent of the swapchain images.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D { self.extent }

    /// Returns the number of images in the swapchain.
    #[inline]
    pub fn image_count(&self) -> u32 { self.image_count }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        debug!("Destroying Swapchain...");
        unsafe { self.loader.destroy_swapchain(self.swapchain, None); }
    }
}
