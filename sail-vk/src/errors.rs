/* ERRORS.rs
 *   by Lut99
 *
 * Created:
 *   24 Sep 2022, 14:16:31
 * Last edited:
 *   11 Jan 2023, 21:16:50
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Collects all errors for the crate.
**/

use std::error::Error;
use std::ffi::CString;
use std::fmt::{Display, Formatter, Result as FResult};


/***** ERRORS *****/
/// Defines errors that occur when setting up an Instance.
#[derive(Debug)]
pub enum InstanceError {
    /// Could not load the Vulkan library at runtime
    LoadError{ err: ash::LoadingError },
    /// Could not create the Instance
    CreateError{ err: ash::vk::Result },
}

impl Display for InstanceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            InstanceError::LoadError{ err }   => write!(f, "Could not load the Vulkan library: {}", err),
            InstanceError::CreateError{ err } => write!(f, "Could not create Vulkan instance: {}", err),
        }
    }
}

impl Error for InstanceError {}



/// Defines errors that occur when setting up the debug messenger.
#[derive(Debug)]
pub enum DebugError {
    /// Could not create the debug messenger
    CreateError{ err: ash::vk::Result },
}

impl Display for DebugError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            DebugError::CreateError{ err } => write!(f, "Could not create Vulkan debug messenger: {}", err),
        }
    }
}

impl Error for DebugError {}



/// Defines errors that occur when setting up a Device.
#[derive(Debug)]
pub enum DeviceError {
    /// Could not get the iterator over the physical devices
    PhysicalDeviceEnumerateError{ err: ash::vk::Result },
    /// Did not find the given physical device
    PhysicalDeviceNotFound{ index: usize },
    /// Could not convert the raw name of the device to a String
    PhysicalDeviceNameError{ index: usize, err: std::str::Utf8Error },
    /// None of the found devices support this application
    NoSupportedPhysicalDevices,

    /// Could not enumerate over the available device extensions
    DeviceExtensionEnumerateError{ err: ash::vk::Result },
    /// A required device extension was not supported by the given device
    UnsupportedDeviceExtension{ index: usize, name: String, extension: CString },
    /// Could not query whether the given queue family supports presenting
    SurfaceSupportError{ index: usize, name: String, err: ash::vk::Result },
    /// Did not find a graphics or a present queue family on the given device
    QueueFamiliesNotFound{ index: usize, name: String },

    /// Could not create the new logical device
    DeviceCreateError{ err: ash::vk::Result },
}

impl Display for DeviceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            DeviceError::PhysicalDeviceEnumerateError{ err } => write!(f, "Could not enumerate physical devices: {}", err),
            DeviceError::PhysicalDeviceNotFound{ index }     => write!(f, "Could not find physical device '{}'; see the list of available devices by running with '--gpu list'", index),
            DeviceError::PhysicalDeviceNameError{ index, err } => write!(f, "Could not parse name of device {} as UTF-8: {}", index, err),
            DeviceError::NoSupportedPhysicalDevices          => write!(f, "No GPU found that supports this application"),

            DeviceError::DeviceExtensionEnumerateError{ err }              => write!(f, "Could not enumerate device extension properties: {}", err),
            DeviceError::UnsupportedDeviceExtension{ index, name, extension } => write!(f, "Physical device {} ({}) does not support extension '{:?}'; choose another device", index, name, extension),
            DeviceError::SurfaceSupportError{ index, name, err }           => write!(f, "Could not query physical device {} ({}) for surface support: {}", index, name, err),
            DeviceError::QueueFamiliesNotFound{ index, name }              => write!(f, "Physical device {} ({}) does not have queue families for both graphics and presenting; choose another device", index, name),

            DeviceError::DeviceCreateError{ err } => write!(f, "Could not create logical device: {}", err),
        }
    }
}

impl Error for DeviceError {}



/// Defines errors that occur when setting up a Surface.
#[derive(Debug)]
pub enum SurfaceError {
    /// Could not create a new Windows surface
    WindowsSurfaceKHRCreateError{ err: ash::vk::Result },
    /// Could not create a new macOS surface
    MacOSSurfaceKHRCreateError{ err: ash::vk::Result },
    /// This linux installation does not use X11 or Wayland
    UnsupportedWindowSystem,
    /// Could not create a new X11 surface
    X11SurfaceKHRCreateError{ err: ash::vk::Result },
    /// Could not create a new Wayland surface
    WaylandSurfaceCreateError{ err: ash::vk::Result },
}

impl Display for SurfaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            SurfaceError::WindowsSurfaceKHRCreateError{ err } => write!(f, "Could not create new Windows SurfaceKHR: {}", err),
            SurfaceError::MacOSSurfaceKHRCreateError{ err }   => write!(f, "Could not create new macOS SurfaceKHR: {}", err),
            SurfaceError::UnsupportedWindowSystem             => write!(f, "Target window is not an X11 or Wayland window; other window systems are not supported"),
            SurfaceError::X11SurfaceKHRCreateError{ err }     => write!(f, "Could not create new X11 SurfaceKHR: {}", err),
            SurfaceError::WaylandSurfaceCreateError{ err }    => write!(f, "Could not create new Wayland SurfaceKHR: {}", err),
        }
    }
}

impl Error for SurfaceError {}



/// Defines errors that occur when setting up or using a Swapchain.
#[derive(Debug)]
pub enum SwapchainError {
    /// Could not query the surface capabilities
    SurfaceCapabilitiesError{ err: ash::vk::Result },
    /// Could not query the surface formats
    SurfaceFormatsError{ err: ash::vk::Result },
    /// Could not query the surface present modes
    SurfacePresentModesError{ err: ash::vk::Result },
    /// The surface does not support any formats
    NoFormatFound,

    /// Could not create the swapchain
    SwapchainCreateError{ err: ash::vk::Result },
    /// Could not get the images of the swapchain
    SwapchainImagesError{ err: ash::vk::Result },
    /// Could not acquire a new image from the swapchain
    SwapchainAcquireError{ err: ash::vk::Result },
    /// Could not present the given image
    SwapchainPresentError{ err: ash::vk::Result },

    /// The surface is gone; there is nothing to present to anymore
    SurfaceLost,
}

impl Display for SwapchainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            SwapchainError::SurfaceCapabilitiesError{ err } => write!(f, "Could not query surface capabilities: {}", err),
            SwapchainError::SurfaceFormatsError{ err }      => write!(f, "Could not query surface formats: {}", err),
            SwapchainError::SurfacePresentModesError{ err } => write!(f, "Could not query surface present modes: {}", err),
            SwapchainError::NoFormatFound                   => write!(f, "The surface does not support any formats"),

            SwapchainError::SwapchainCreateError{ err }  => write!(f, "Could not create swapchain: {}", err),
            SwapchainError::SwapchainImagesError{ err }  => write!(f, "Could not get swapchain images: {}", err),
            SwapchainError::SwapchainAcquireError{ err } => write!(f, "Could not acquire next swapchain image: {}", err),
            SwapchainError::SwapchainPresentError{ err } => write!(f, "Could not present swapchain image: {}", err),

            SwapchainError::SurfaceLost => write!(f, "The surface backing the swapchain is lost"),
        }
    }
}

impl Error for SwapchainError {}



/// Defines errors that relate to the synchronization primitives.
#[derive(Debug)]
pub enum SyncError {
    /// Could not create a new semaphore
    SemaphoreCreateError{ err: ash::vk::Result },
    /// Could not create a new fence
    FenceCreateError{ err: ash::vk::Result },
    /// Could not wait for a fence
    FenceWaitError{ err: ash::vk::Result },
    /// Could not reset a fence
    FenceResetError{ err: ash::vk::Result },
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            SyncError::SemaphoreCreateError{ err } => write!(f, "Could not create Semaphore: {}", err),
            SyncError::FenceCreateError{ err }     => write!(f, "Could not create Fence: {}", err),
            SyncError::FenceWaitError{ err }       => write!(f, "Could not wait for Fence: {}", err),
            SyncError::FenceResetError{ err }      => write!(f, "Could not reset Fence: {}", err),
        }
    }
}

impl Error for SyncError {}
