/* INSTANCE.rs
 *   by Lut99
 *
 * Created:
 *   24 Sep 2022, 14:20:17
 * Last edited:
 *   09 Dec 2022, 17:31:02
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Contains the wrapper around the Vulkan instance.
**/

use std::ffi::CString;
use std::ptr;

use ash::vk;
#[cfg(all(windows))]
use ash::extensions::khr::Win32Surface;
#[cfg(target_os = "macos")]
use ash::extensions::mvk::MacOSSurface;
#[cfg(all(unix, not(target_os = "android"), not(target_os = "macos")))]
use ash::extensions::khr::{WaylandSurface, XlibSurface};
use log::debug;
use semver::Version;

use sail_utl::to_cstring;

pub use crate::errors::InstanceError as Error;


/***** HELPER FUNCTIONS *****/
/// Returns the proper extensions for the target OS' window system.
/// This overload is for Windows.
///
/// **Returns**
/// The list of required extensions, as a list of pointers.
#[cfg(all(windows))]
fn os_surface_extensions() -> Vec<*const i8> {
    vec![
        Win32Surface::name().as_ptr(),
    ]
}

/// Returns the proper extensions for the target OS' window system.
/// This overload is for macOS.
///
/// **Returns**
/// The list of required extensions, as a list of pointers.
#[cfg(target_os = "macos")]
fn os_surface_extensions() -> Vec<*const i8> {
    vec![
        MacOSSurface::name().as_ptr(),
        // Newer MoltenVK loaders require portability enumeration as well
        vk::KhrPortabilityEnumerationFn::name().as_ptr(),
    ]
}

/// Returns the proper extensions for the target OS' window system.
/// This overload is for Linux (X11 or Wayland).
///
/// **Returns**
/// The list of required extensions, as a list of pointers.
#[cfg(all(unix, not(target_os = "android"), not(target_os = "macos")))]
fn os_surface_extensions() -> Vec<*const i8> {
    vec![
        XlibSurface::name().as_ptr(),
        WaylandSurface::name().as_ptr(),
    ]
}

/// Returns the InstanceCreateFlags for the target OS.
#[inline]
fn os_instance_flags() -> vk::InstanceCreateFlags {
    #[cfg(target_os = "macos")]
    { vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR }
    #[cfg(not(target_os = "macos"))]
    { vk::InstanceCreateFlags::empty() }
}





/***** LIBRARY *****/
/// Represents the Instance in the wrapper, which is the application-global instantiation of Vulkan and other libraries.
pub struct Instance {
    /// The ash entry, that determines how we link to the underlying Vulkan library
    entry : ash::Entry,

    /// The instance object that this struct wraps.
    instance : ash::Instance,
}

impl Instance {
    /// Constructor for the Instance.
    ///
    /// **Generic types**
    ///  * `S1`: The String-like type of the name.
    ///  * `S2`: The String-like type of the engine name.
    ///
    /// **Arguments**
    ///  * `name`: The name of the calling application.
    ///  * `version`: The version of the calling application.
    ///  * `engine`: The name of the engine of the calling application.
    ///  * `engine_version`: The version of the engine of the calling application.
    ///  * `extensions`: Extra extensions to enable on top of the required ones for the current platform.
    ///  * `layers`: Vulkan validation layers to enable.
    ///
    /// **Returns**
    /// The new Instance on success, or else an Error.
    pub fn new<S1: AsRef<str>, S2: AsRef<str>>(name: S1, version: Version, engine: S2, engine_version: Version, extensions: &[&str], layers: &[&str]) -> Result<Self, Error> {
        // Convert the str-like into &str
        let name: &str   = name.as_ref();
        let engine: &str = engine.as_ref();

        // Create the entry
        let entry = unsafe {
            match ash::Entry::load() {
                Ok(entry) => entry,
                Err(err)  => { return Err(Error::LoadError{ err }); }
            }
        };

        // Get a CString from the String
        let cname   = to_cstring!(name);
        let cengine = to_cstring!(engine);

        // Construct the ApplicationInfo
        let app_info = vk::ApplicationInfo {
            s_type              : vk::StructureType::APPLICATION_INFO,
            p_next              : ptr::null(),
            p_application_name  : cname.as_ptr(),
            application_version : vk::make_api_version(0, version.major as u32, version.minor as u32, version.patch as u32),
            p_engine_name       : cengine.as_ptr(),
            engine_version      : vk::make_api_version(0, engine_version.major as u32, engine_version.minor as u32, engine_version.patch as u32),
            api_version         : vk::API_VERSION_1_3,
        };

        // Convert the extensions and layers into vectors of the appropriate type
        let cextensions: Vec<CString> = extensions.iter().map(|s| to_cstring!(s)).collect();
        let clayers: Vec<CString>     = layers.iter().map(|s| to_cstring!(s)).collect();
        let mut p_extensions: Vec<*const i8> = cextensions.iter().map(|s| s.as_ptr()).collect();
        let p_layers: Vec<*const i8>         = clayers.iter().map(|s| s.as_ptr()).collect();

        // Possibly extend the extensions based on the OS
        let mut required_extensions: Vec<*const i8> = os_surface_extensions();
        p_extensions.append(&mut required_extensions);

        // Prepare the create info for the Instance
        let create_info = vk::InstanceCreateInfo {
            s_type                     : vk::StructureType::INSTANCE_CREATE_INFO,
            p_next                     : ptr::null(),
            flags                      : os_instance_flags(),
            p_application_info         : &app_info,
            pp_enabled_extension_names : p_extensions.as_ptr(),
            enabled_extension_count    : p_extensions.len() as u32,
            pp_enabled_layer_names     : p_layers.as_ptr(),
            enabled_layer_count        : p_layers.len() as u32,
        };

        // Use that to create the instance
        debug!("Initializing instance...");
        let instance: ash::Instance = unsafe {
            match entry.create_instance(&create_info, None) {
                Ok(instance) => instance,
                Err(err)     => { return Err(Error::CreateError{ err }); }
            }
        };

        // Finally, create the struct!
        Ok(Self {
            entry,
            instance,
        })
    }



    /// Returns the internal ash Entry.
    #[inline]
    pub fn entry(&self) -> &ash::Entry { &self.entry }

    /// Returns (an immuteable reference to) the internal Vulkan instance.
    #[inline]
    pub fn vk(&self) -> &ash::Instance { &self.instance }
}

impl Drop for Instance {
    fn drop(&mut self) {
        debug!("Destroying Instance...");
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}
