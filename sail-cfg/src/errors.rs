/* ERRORS.rs
 *   by Lut99
 *
 * Created:
 *   17 Sep 2022, 12:01:12
 * Last edited:
 *   09 Dec 2022, 17:12:50
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Collects all errors for the crate.
**/

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;


/***** ERRORS *****/
/// Defines errors that occur when resolving paths or merging the configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Could not get the path of the current executable
    ExecutablePathError{ err: std::io::Error },
    /// The given path has no parent directory
    PathParentError{ path: PathBuf },
    /// Could not convert the given path to a string
    PathToStringError{ path: PathBuf },
    /// The given relative path escapes the executable's directory
    RelativeEscape{ base: PathBuf, path: PathBuf },
    /// Could not create the log directory
    LogDirCreateError{ path: PathBuf, err: std::io::Error },

    /// Could not load the settings file
    SettingsLoadError{ err: SettingsError },
    /// Could not write the default settings file
    SettingsWriteError{ err: SettingsError },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            ConfigError::ExecutablePathError{ err }    => write!(f, "Could not get the path of the executable: {}", err),
            ConfigError::PathParentError{ path }       => write!(f, "Path '{}' has no parent directory", path.display()),
            ConfigError::PathToStringError{ path }     => write!(f, "Could not convert path '{}' to a string", path.display()),
            ConfigError::RelativeEscape{ base, path }  => write!(f, "Path '{}' escapes base directory '{}'", path.display(), base.display()),
            ConfigError::LogDirCreateError{ path, err} => write!(f, "Could not create log directory '{}': {}", path.display(), err),

            ConfigError::SettingsLoadError{ err }  => write!(f, "Could not load settings file: {}", err),
            ConfigError::SettingsWriteError{ err } => write!(f, "Could not write default settings file: {}", err),
        }
    }
}

impl Error for ConfigError {}



/// Defines errors that occur when loading or parsing the settings file.
#[derive(Debug)]
pub enum SettingsError {
    /// Could not open the settings file
    OpenError{ path: PathBuf, err: std::io::Error },
    /// Could not parse the settings file
    ParseError{ path: PathBuf, err: serde_json::Error },
    /// Could not write the settings file
    WriteError{ path: PathBuf, err: serde_json::Error },

    /// The given resolution string has no 'x' separator
    MissingX{ raw: String },
    /// The given resolution string has a non-numeric width or height
    IllegalUnsignedInteger{ raw: String, err: std::num::ParseIntError },
    /// The given window mode is unknown
    UnknownWindowMode{ raw: String },
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            SettingsError::OpenError{ path, err }  => write!(f, "Could not open settings file '{}': {}", path.display(), err),
            SettingsError::ParseError{ path, err } => write!(f, "Could not parse settings file '{}': {}", path.display(), err),
            SettingsError::WriteError{ path, err } => write!(f, "Could not write settings file '{}': {}", path.display(), err),

            SettingsError::MissingX{ raw }                    => write!(f, "Resolution '{}' is missing an 'x' between the width and the height", raw),
            SettingsError::IllegalUnsignedInteger{ raw, err } => write!(f, "Resolution '{}' has an illegal unsigned integer: {}", raw, err),
            SettingsError::UnknownWindowMode{ raw }           => write!(f, "Unknown window mode '{}'; expected 'windowed', 'windowed_fullscreen' or 'fullscreen'", raw),
        }
    }
}

impl Error for SettingsError {}
