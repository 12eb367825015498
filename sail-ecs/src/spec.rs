/* SPEC.rs
 *   by Lut99
 *
 * Created:
 *   17 Sep 2022, 11:22:48
 * Last edited:
 *   09 Dec 2022, 16:51:33
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Defines the interfaces to the library: common types, structs, etc.
**/

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};

use sail_utl::traits::AsAny;


/***** CUSTOM TYPES *****/
/// Defines the type used to identify systems in the World.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SystemId(u32);

impl SystemId {
    /// Constant constructor for the SystemId, so crates can define their ID as a constant.
    #[inline]
    pub const fn new(id: u32) -> Self { Self(id) }
}

impl Display for SystemId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{}", self.0)
    }
}



/***** LIBRARY *****/
/// Describes a System before it is registered in the World.
#[derive(Clone, Debug)]
pub struct SystemDescriptor {
    /// The unique identifier for this system.
    pub id   : SystemId,
    /// The display name for this system.
    pub name : &'static str,
    /// The systems that must have been registered (and thus constructed) before this one.
    pub deps : Vec<SystemId>,
}



/// Defines the base System trait.
///
/// A system is constructed with (shared handles to) its dependencies, ticked once per frame by the World in registration order, and destroyed by its Drop implementation.
pub trait System: 'static + AsAny {
    /// Returns the identifier of this system.
    fn id(&self) -> SystemId;

    /// Runs a single tick for this system.
    ///
    /// # Arguments
    /// - `delta_seconds`: The time (in seconds) that passed since the last tick.
    ///
    /// # Errors
    /// This function may error however the system likes; the World will stop ticking and propagate it.
    fn tick(&mut self, delta_seconds: f32) -> Result<(), Box<dyn Error>>;
}
