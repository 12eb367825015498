/* LIB.rs
 *   by Lut99
 *
 * Created:
 *   17 Sep 2022, 10:41:18
 * Last edited:
 *   12 Nov 2022, 13:02:55
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Contains the cross-crate utilities and functions for Sail-Rust.
**/

/// Module that contains the common traits.
pub mod traits;


/***** MACROS *****/
/// Translates a Rust String(-like) to a CString.
#[macro_export]
macro_rules! to_cstring {
    ($s:expr) => {
        std::ffi::CString::new($s.as_bytes()).unwrap_or_else(|_| panic!("Given string '{}' contains NULL-byte; cannot convert to CString", $s))
    };
}

/// Translates a Rust str(-like) to a CStr.
#[macro_export]
macro_rules! to_cstr {
    ($s:expr) => {
        std::ffi::CStr::from_bytes_with_nul(concat!($s, "\0").as_bytes()).unwrap_or_else(|_| panic!("Given str '{}' contains NULL-byte; cannot convert to CStr", $s))
    };
}
