/* ERRORS.rs
 *   by Lut99
 *
 * Created:
 *   17 Sep 2022, 11:25:56
 * Last edited:
 *   09 Dec 2022, 16:52:20
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Collects all errors for the crate.
**/

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};

use crate::spec::SystemId;


/***** ERRORS *****/
/// Defines errors that occur when registering or ticking systems in the World.
#[derive(Debug)]
pub enum WorldError {
    /// A system with this ID was already registered
    DuplicateSystem{ id: SystemId, name: &'static str },
    /// A system was registered before one of its dependencies
    MissingDependency{ id: SystemId, name: &'static str, dep: SystemId },

    /// A system failed its tick
    SystemTickError{ id: SystemId, name: &'static str, err: Box<dyn Error> },
}

impl Display for WorldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            WorldError::DuplicateSystem{ id, name }        => write!(f, "A system with ID {} is already registered (while registering '{}')", id, name),
            WorldError::MissingDependency{ id, name, dep } => write!(f, "System '{}' (ID {}) depends on system {}, which is not registered yet; did you register the systems in the right order?", name, id, dep),

            WorldError::SystemTickError{ id, name, err } => write!(f, "System '{}' (ID {}) failed its tick: {}", name, id, err),
        }
    }
}

impl Error for WorldError {}
