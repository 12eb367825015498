/* DEVICE.rs
 *   by Lut99
 *
 * Created:
 *   24 Sep 2022, 15:02:13
 * Last edited:
 *   11 Jan 2023, 21:31:56
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Implements the Device struct, which handles both physical and logical
 *   devices in the Vulkan backend.
**/

use std::ffi::{c_void, CStr};
use std::ops::Deref;
use std::ptr;
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr;
use log::{debug, info, warn};

pub use crate::errors::DeviceError as Error;
use crate::instance::Instance;
use crate::surface::Surface;


/***** HELPER FUNCTIONS *****/
/// Checks if the given list of extension properties contains the given extension name.
fn device_supports_ext(props: &[vk::ExtensionProperties], ext_name: &CStr) -> bool {
    for prop in props {
        let avail_ext: &CStr = unsafe { CStr::from_ptr(prop.extension_name.as_ptr()) };
        if avail_ext == ext_name { return true; }
    }
    false
}

/// Adds the given extension to the list of extensions to enable.
///
/// # Errors
/// This function errors if the device does not support the extension, since it is required.
fn required_device_ext(ext_names: &mut Vec<*const i8>, props: &[vk::ExtensionProperties], index: usize, name: &str, ext_name: &'static CStr) -> Result<(), Error> {
    if device_supports_ext(props, ext_name) {
        info!("Loading required extension: {:?}", ext_name);
        ext_names.push(ext_name.as_ptr());
        return Ok(());
    }
    Err(Error::UnsupportedDeviceExtension{ index, name: name.into(), extension: ext_name.to_owned() })
}

/// Adds the given extension to the list of extensions to enable if the device supports it.
///
/// # Returns
/// Whether the extension was supported (and thus added) or not.
fn optional_device_ext(ext_names: &mut Vec<*const i8>, props: &[vk::ExtensionProperties], ext_name: &'static CStr) -> bool {
    if device_supports_ext(props, ext_name) {
        info!("Loading optional extension: {:?}", ext_name);
        ext_names.push(ext_name.as_ptr());
        return true;
    }
    warn!("Optional extension not supported: {:?}", ext_name);
    false
}



/***** POPULATE FUNCTIONS *****/
/// Populates a DeviceQueueCreateInfo struct.
///
/// Uses the given parameters to describe a new set of queues from a single queue family.
///
/// The number of queues we will construct for this family depends on the length of the given queue_priorities list.
#[inline]
fn populate_queue_info(family_index: u32, queue_priorities: &[f32]) -> vk::DeviceQueueCreateInfo {
    vk::DeviceQueueCreateInfo {
        // Define the often-used fields on these structs
        s_type : vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        p_next : ptr::null(),
        flags  : vk::DeviceQueueCreateFlags::empty(),

        // Define to which queue family the new queues belong
        queue_family_index : family_index,
        // Define the queue priorities. The length of this list determines how many queues.
        p_queue_priorities : queue_priorities.as_ptr(),
        queue_count        : queue_priorities.len() as u32,
    }
}





/***** AUXILLARY STRUCTS *****/
/// Keeps track of which optional device extensions we managed to enable.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtensionSupport {
    /// Whether the portability subset is enabled (MoltenVK)
    pub portability           : bool,
    /// Whether the ray tracing extension chain is enabled
    pub raytracing            : bool,
    /// Whether calibrated timestamps are enabled
    pub calibrated_timestamps : bool,
}



/// Contains information about the queue families for an instantiated Device.
#[derive(Clone, Copy, Debug)]
pub struct QueueFamilyInfo {
    /// The index of the family we use for graphics operations
    pub graphics : u32,
    /// The index of the family we use for presenting
    pub present  : u32,
}

impl QueueFamilyInfo {
    /// Constructor for the QueueFamilyInfo.
    ///
    /// Searches the queue families of the given physical device for a graphics family and a present family, preferring a single family that can do both.
    ///
    /// # Errors
    /// This function errors if the device has no graphics family or no family that can present to the given surface.
    fn new(instance: &Instance, surface: &Surface, physical_device: vk::PhysicalDevice, physical_device_index: usize, physical_device_name: &str) -> Result<Self, Error> {
        let families = unsafe { instance.vk().get_physical_device_queue_family_properties(physical_device) };

        // Learn which families can present to the surface
        let mut supports_present: Vec<bool> = Vec::with_capacity(families.len());
        for i in 0..families.len() {
            match unsafe { surface.ash().get_physical_device_surface_support(physical_device, i as u32, surface.vk()) } {
                Ok(support) => { supports_present.push(support); },
                Err(err)    => { return Err(Error::SurfaceSupportError{ index: physical_device_index, name: physical_device_name.into(), err }); }
            }
        }

        // Search for a family that supports both graphics and presenting
        let mut graphics: Option<u32> = None;
        let mut present: Option<u32>  = None;
        for (i, family) in families.iter().enumerate() {
            if family.queue_count == 0 { continue; }
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                if graphics.is_none() { graphics = Some(i as u32); }
                if supports_present[i] {
                    // A combined family; done searching
                    graphics = Some(i as u32);
                    present  = Some(i as u32);
                    break;
                }
            }
        }

        // If no combined family was found, settle for any family that can present
        if present.is_none() {
            for (i, family) in families.iter().enumerate() {
                if family.queue_count > 0 && supports_present[i] {
                    present = Some(i as u32);
                    break;
                }
            }
        }

        // Both must exist for the device to be usable
        match (graphics, present) {
            (Some(graphics), Some(present)) => Ok(Self{ graphics, present }),
            _                               => Err(Error::QueueFamiliesNotFound{ index: physical_device_index, name: physical_device_name.into() }),
        }
    }



    /// Returns the **different** families in the QueueFamilyInfo.
    #[inline]
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present { vec![ self.graphics ] }
        else { vec![ self.graphics, self.present ] }
    }
}



/// Central place where we store the queues of the created logical device.
#[derive(Clone, Copy, Debug)]
pub struct Queues {
    /// The graphics queue
    pub graphics : vk::Queue,
    /// The present queue (possibly the same as the graphics queue)
    pub present  : vk::Queue,
}

impl Queues {
    /// Constructor for the Queues.
    ///
    /// Requests the queues from the queue families in the given QueueFamilyInfo on the given vk::Device.
    #[inline]
    fn new(device: &ash::Device, family_info: &QueueFamilyInfo) -> Self {
        Self {
            graphics : unsafe { device.get_device_queue(family_info.graphics, 0) },
            present  : unsafe { device.get_device_queue(family_info.present, 0) },
        }
    }
}





/***** LIBRARY *****/
/// The Device struct provides logic to work with both Vulkan's PhysicalDevices and Devices.
pub struct Device {
    /// The Instance on which this Device is based.
    instance : Arc<Instance>,

    /// The PhysicalDevice around which we wrap.
    physical_device : vk::PhysicalDevice,
    /// The logical Device around which we wrap.
    device          : ash::Device,
    /// The queues for the internal device.
    queues          : Queues,
    /// The loader for attaching debug names to objects, if validation is enabled.
    debug_utils     : Option<DebugUtils>,

    /// The name of the device
    name           : String,
    /// The type of the device (as a String as well)
    kind           : String,
    /// The QueueFamilyInfo that describes the queue families for this device.
    queue_families : QueueFamilyInfo,
    /// The optional extensions we managed to enable on this device.
    ext_support    : ExtensionSupport,
    /// The memory properties of the physical device.
    mem_props      : vk::PhysicalDeviceMemoryProperties,
}

impl Device {
    /// Constructor for the Device.
    ///
    /// This function builds a logical Device around the given physical device, checking if it supports the given surface.
    ///
    /// The swapchain extension is always enabled (and required); the ray tracing chain, calibrated timestamps and the portability subset are enabled when available. The multiview and dynamic rendering features are always enabled.
    ///
    /// # Arguments
    /// - `instance`: The Instance to create the Device on.
    /// - `surface`: The Surface that the Device must be able to present to.
    /// - `physical_device_index`: The index of the physical device to wrap (see `auto_select()`).
    /// - `debug`: Whether to attach debug names to created objects.
    ///
    /// # Errors
    /// This function errors whenever the backend Vulkan errors, or when the device does not support what we need.
    pub fn new(instance: Arc<Instance>, surface: &Surface, physical_device_index: usize, debug: bool) -> Result<Arc<Self>, Error> {
        // We enumerate through all the physical devices to find the appropriate one
        let physical_devices = match unsafe { instance.vk().enumerate_physical_devices() } {
            Ok(devices) => devices,
            Err(err)    => { return Err(Error::PhysicalDeviceEnumerateError{ err }); }
        };
        let physical_device: vk::PhysicalDevice = match physical_devices.get(physical_device_index) {
            Some(device) => *device,
            None         => { return Err(Error::PhysicalDeviceNotFound{ index: physical_device_index }); }
        };

        // Get the properties of this device
        let device_properties = unsafe { instance.vk().get_physical_device_properties(physical_device) };
        let device_name: String = match unsafe { CStr::from_ptr(device_properties.device_name.as_ptr()) }.to_str() {
            Ok(name) => name.to_string(),
            Err(err) => { return Err(Error::PhysicalDeviceNameError{ index: physical_device_index, err }); }
        };
        let device_type: String = match device_properties.device_type {
            vk::PhysicalDeviceType::CPU            => "CPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU    => "Virtual GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::DISCRETE_GPU   => "Discrete GPU",
            _                                      => "Unknown type",
        }.to_string();

        // Collect the queue families for this device
        let family_info = QueueFamilyInfo::new(&instance, surface, physical_device, physical_device_index, &device_name)?;

        // Do some debug prints about the selected device
        debug!("Using physical device {} '{}' ({})", physical_device_index, &device_name, &device_type);
        debug!("Selected queue families:");
        debug!(" - Graphics : {}", family_info.graphics);
        debug!(" - Present  : {}", family_info.present);

        // Collect the extensions to enable
        let avail_exts = match unsafe { instance.vk().enumerate_device_extension_properties(physical_device) } {
            Ok(props) => props,
            Err(err)  => { return Err(Error::DeviceExtensionEnumerateError{ err }); }
        };
        let mut ext_support = ExtensionSupport::default();
        let mut p_device_extensions: Vec<*const i8> = Vec::with_capacity(16);
        {
            // We cannot go without a swapchain
            required_device_ext(&mut p_device_extensions, &avail_exts, physical_device_index, &device_name, khr::Swapchain::name())?;

            // The portability subset must be enabled whenever the implementation advertises it (MoltenVK)
            ext_support.portability = optional_device_ext(&mut p_device_extensions, &avail_exts, vk::KhrPortabilitySubsetFn::name());

            // Ray tracing is optional, but brings a chain of requirements with it
            if optional_device_ext(&mut p_device_extensions, &avail_exts, vk::KhrRayTracingPipelineFn::name()) {
                ext_support.raytracing = true;

                // Required for Spirv 1.4
                optional_device_ext(&mut p_device_extensions, &avail_exts, vk::KhrShaderFloatControlsFn::name());
                // Required for VK_KHR_ray_tracing_pipeline
                optional_device_ext(&mut p_device_extensions, &avail_exts, vk::KhrSpirv14Fn::name());
                // Required for VK_KHR_acceleration_structure
                optional_device_ext(&mut p_device_extensions, &avail_exts, vk::KhrBufferDeviceAddressFn::name());
                optional_device_ext(&mut p_device_extensions, &avail_exts, vk::KhrDeferredHostOperationsFn::name());
                optional_device_ext(&mut p_device_extensions, &avail_exts, vk::ExtDescriptorIndexingFn::name());
                // Required for ray tracing itself
                optional_device_ext(&mut p_device_extensions, &avail_exts, vk::KhrAccelerationStructureFn::name());
                optional_device_ext(&mut p_device_extensions, &avail_exts, vk::KhrRayQueryFn::name());
            }

            // Calibrated timestamps make GPU profiling much nicer
            ext_support.calibrated_timestamps = optional_device_ext(&mut p_device_extensions, &avail_exts, vk::ExtCalibratedTimestampsFn::name());
        }

        // Prepare getting the queues from the device
        let queue_priorities = vec![ 1.0 ];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = family_info.unique().into_iter().map(|family| populate_queue_info(family, &queue_priorities)).collect();

        // Prepare the feature chain: ray tracing (when supported), then the promoted 1.1 and 1.3 features
        let mut rt_query_feature = vk::PhysicalDeviceRayQueryFeaturesKHR {
            s_type    : vk::StructureType::PHYSICAL_DEVICE_RAY_QUERY_FEATURES_KHR,
            p_next    : ptr::null_mut(),
            ray_query : if ext_support.raytracing { vk::TRUE } else { vk::FALSE },
        };
        let mut rt_pipe_feature = vk::PhysicalDeviceRayTracingPipelineFeaturesKHR {
            p_next               : (&mut rt_query_feature as *mut vk::PhysicalDeviceRayQueryFeaturesKHR).cast::<c_void>(),
            ray_tracing_pipeline : if ext_support.raytracing { vk::TRUE } else { vk::FALSE },
            ..Default::default()
        };
        let mut vk13_features = vk::PhysicalDeviceVulkan13Features {
            p_next            : (&mut rt_pipe_feature as *mut vk::PhysicalDeviceRayTracingPipelineFeaturesKHR).cast::<c_void>(),
            // The render passes are all dynamic-rendering based
            dynamic_rendering : vk::TRUE,
            ..Default::default()
        };
        let vk11_features = vk::PhysicalDeviceVulkan11Features {
            p_next    : (&mut vk13_features as *mut vk::PhysicalDeviceVulkan13Features).cast::<c_void>(),
            // The environment cube passes render all six faces at once
            multiview : vk::TRUE,
            ..Default::default()
        };

        // Create the DeviceCreateInfo with all this
        let device_info = vk::DeviceCreateInfo {
            s_type : vk::StructureType::DEVICE_CREATE_INFO,
            p_next : (&vk11_features as *const vk::PhysicalDeviceVulkan11Features).cast::<c_void>(),
            flags  : vk::DeviceCreateFlags::empty(),

            // Define the queue create infos
            p_queue_create_infos    : queue_infos.as_ptr(),
            queue_create_info_count : queue_infos.len() as u32,

            // Define the extensions
            pp_enabled_extension_names : p_device_extensions.as_ptr(),
            enabled_extension_count    : p_device_extensions.len() as u32,

            // Device layers are deprecated; features come in through the chain
            pp_enabled_layer_names : ptr::null(),
            enabled_layer_count    : 0,
            p_enabled_features     : ptr::null(),
        };

        // Use that to create the device
        debug!("Initializing device...");
        let device: ash::Device = unsafe {
            match instance.vk().create_device(physical_device, &device_info, None) {
                Ok(device) => device,
                Err(err)   => { return Err(Error::DeviceCreateError{ err }); }
            }
        };

        // Get the queues
        let queues = Queues::new(&device, &family_info);

        // Get the memory properties for the allocators
        let mem_props = unsafe { instance.vk().get_physical_device_memory_properties(physical_device) };

        // Prepare the debug naming loader, if asked for
        let debug_utils = if debug { Some(DebugUtils::new(instance.entry(), instance.vk())) } else { None };

        // Done! Return the new Device
        Ok(Arc::new(Self {
            instance,

            physical_device,
            device,
            queues,
            debug_utils,

            name           : device_name,
            kind           : device_type,
            queue_families : family_info,
            ext_support,
            mem_props,
        }))
    }



    /// Tries to automatically select the best GPU.
    ///
    /// Iterates through all the GPUs that can be found in the given instance, and ranks them on their 'CPU disconnectedness': discrete beats integrated beats virtual beats CPU.
    ///
    /// # Errors
    /// This function errors when we could not enumerate the physical devices or if no device is found at all.
    pub fn auto_select(instance: &Instance) -> Result<usize, Error> {
        // Iterate over all physical devices
        let physical_devices = match unsafe { instance.vk().enumerate_physical_devices() } {
            Ok(devices) => devices,
            Err(err)    => { return Err(Error::PhysicalDeviceEnumerateError{ err }); }
        };
        let mut best_device: Option<(usize, u32)> = None;
        for (i, physical_device) in physical_devices.iter().enumerate() {
            // Get the properties of this device
            let device_properties = unsafe { instance.vk().get_physical_device_properties(*physical_device) };

            // Base its ranking on its 'CPU disconnectedness'
            let device_ranking: u32 = match device_properties.device_type {
                vk::PhysicalDeviceType::CPU            => 1,
                vk::PhysicalDeviceType::VIRTUAL_GPU    => 2,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
                vk::PhysicalDeviceType::DISCRETE_GPU   => 4,
                _                                      => 0,
            };

            // Select it as best if first or higher ranking
            if best_device.is_none() || (device_ranking > best_device.as_ref().unwrap().1) {
                best_device = Some((i, device_ranking));
            }
        }

        // If there is none, error
        match best_device {
            Some((index, _)) => Ok(index),
            None             => Err(Error::NoSupportedPhysicalDevices),
        }
    }



    /// Attaches a debug name to the given Vulkan object, if validation is enabled.
    ///
    /// # Arguments
    /// - `handle`: The Vulkan object to name.
    /// - `name`: The name to attach to it.
    pub fn set_debug_name<H: Handle>(&self, handle: H, name: &str) {
        if let Some(debug_utils) = &self.debug_utils {
            let cname = sail_utl::to_cstring!(name);
            let name_info = vk::DebugUtilsObjectNameInfoEXT {
                s_type         : vk::StructureType::DEBUG_UTILS_OBJECT_NAME_INFO_EXT,
                p_next         : ptr::null(),
                object_type    : H::TYPE,
                object_handle  : handle.as_raw(),
                p_object_name  : cname.as_ptr(),
            };
            if let Err(err) = unsafe { debug_utils.debug_utils_set_object_name(self.device.handle(), &name_info) } {
                warn!("Could not set debug name '{}': {}", name, err);
            }
        }
    }



    /// Returns the Instance on which this Device lives.
    #[inline]
    pub fn instance(&self) -> &Arc<Instance> { &self.instance }

    /// Returns the name of this device.
    #[inline]
    pub fn name(&self) -> &str { &self.name }

    /// Returns the type of this device (as a String).
    #[inline]
    pub fn kind(&self) -> &str { &self.kind }

    /// Returns information about the QueueFamilies for this device.
    #[inline]
    pub fn families(&self) -> &QueueFamilyInfo { &self.queue_families }

    /// Returns the optional extensions that are enabled on this device.
    #[inline]
    pub fn ext_support(&self) -> &ExtensionSupport { &self.ext_support }

    /// Returns the memory properties of the physical device.
    #[inline]
    pub fn mem_props(&self) -> &vk::PhysicalDeviceMemoryProperties { &self.mem_props }

    /// Returns the internal device.
    #[inline]
    pub fn device(&self) -> &ash::Device { &self.device }

    /// Returns the internal physical device.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice { self.physical_device }

    /// Returns the internal Queues struct, which contains the queues used on this device.
    #[inline]
    pub fn queues(&self) -> &Queues { &self.queues }
}

impl Drop for Device {
    fn drop(&mut self) {
        debug!("Destroying Device...");
        unsafe { self.device.destroy_device(None); };
    }
}

impl Deref for Device {
    type Target = ash::Device;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
