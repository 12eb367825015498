/* LIB.rs
 *   by Lut99
 *
 * Created:
 *   17 Sep 2022, 11:58:40
 * Last edited:
 *   09 Dec 2022, 17:10:23
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Entrypoint for the crate that handles loading the game's
 *   configuration from disk and the command-line interface.
**/

/// The module for the errors of this crate.
pub mod errors;
/// The module with common structs and enums that get a value in the config.
pub mod spec;
/// The module that parses the command-line interface.
mod cli;
/// The module that loads the settings file.
pub mod file;
/// The module that merges the settings file with the CLI overrides.
pub mod config;

// Bring some components into the general package namespace
pub use spec::{Resolution, WindowMode};
pub use config::Config;
