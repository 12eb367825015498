/* LIB.rs
 *   by Lut99
 *
 * Created:
 *   17 Sep 2022, 11:20:31
 * Last edited:
 *   09 Dec 2022, 16:44:10
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Entrypoint for the ECS package of the game. This package implements
 *   the system scheduler and the interfaces the engine systems plug
 *   into.
**/

/// The module that contains common specifications.
pub mod spec;
/// The module for the errors of this crate.
pub mod errors;
/// The module for the world and its systems.
pub mod system;

// Bring some components into the general package namespace
pub use spec::{System, SystemDescriptor, SystemId};
pub use system::World;
