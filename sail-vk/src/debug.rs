/* DEBUG.rs
 *   by Lut99
 *
 * Created:
 *   24 Sep 2022, 14:33:40
 * Last edited:
 *   09 Dec 2022, 17:35:19
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Implements the debug messenger that pipes validation layer messages
 *   to the log.
**/

use std::ffi::{c_void, CStr};
use std::ptr;
use std::sync::Arc;

use ash::vk;
use ash::extensions::ext::DebugUtils;
use log::{debug, error, info, warn};

pub use crate::errors::DebugError as Error;
use crate::instance::Instance;


/***** HELPER FUNCTIONS *****/
/// The callback the Vulkan validation layers call to get their messages into our log.
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    // Fetch the message itself
    let message: &CStr = CStr::from_ptr((*p_callback_data).p_message);
    let message: &str  = message.to_str().unwrap_or("<non-UTF-8 validation message>");

    // Map the severity to a log level
    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("{}", message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("{}", message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        info!("{}", message);
    } else {
        debug!("{}", message);
    }

    // The spec mandates we always return false from the callback
    vk::FALSE
}



/***** POPULATE FUNCTIONS *****/
/// Populates a new VkDebugUtilsMessengerCreateInfoEXT struct.
#[inline]
fn populate_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT {
        // Do the standard stuff
        s_type : vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        p_next : ptr::null(),
        flags  : vk::DebugUtilsMessengerCreateFlagsEXT::empty(),

        // Define which messages we want to receive
        message_severity : vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type : vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,

        // And where they go
        pfn_user_callback : Some(vk_debug_callback),
        p_user_data       : ptr::null_mut(),
    }
}





/***** LIBRARY *****/
/// Wraps the VkDebugUtilsMessengerEXT that makes the validation layers speak up.
pub struct DebugMessenger {
    /// The Instance the messenger lives on.
    _instance : Arc<Instance>,

    /// The loader for the debug utils extension.
    loader    : DebugUtils,
    /// The messenger itself.
    messenger : vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// Constructor for the DebugMessenger.
    ///
    /// # Arguments
    /// - `instance`: The Instance to register the messenger on. The VK_EXT_debug_utils extension must have been enabled on it.
    ///
    /// # Errors
    /// This function errors if the underlying Vulkan backend could not create the messenger.
    pub fn new(instance: Arc<Instance>) -> Result<Self, Error> {
        // Create the loader and then the messenger itself
        let loader = DebugUtils::new(instance.entry(), instance.vk());
        let messenger_info = populate_messenger_info();
        let messenger = unsafe {
            match loader.create_debug_utils_messenger(&messenger_info, None) {
                Ok(messenger) => messenger,
                Err(err)      => { return Err(Error::CreateError{ err }); }
            }
        };

        debug!("Initialized debug messenger");
        Ok(Self {
            _instance : instance,

            loader,
            messenger,
        })
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        debug!("Destroying DebugMessenger...");
        unsafe { self.loader.destroy_debug_utils_messenger(self.messenger, None); }
    }
}
