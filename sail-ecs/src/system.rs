/* SYSTEM.rs
 *   by Lut99
 *
 * Created:
 *   17 Sep 2022, 11:31:09
 * Last edited:
 *   11 Jan 2023, 21:07:44
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Implements the World, which owns the registered systems and ticks
 *   them.
**/

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

pub use crate::errors::WorldError as Error;
use crate::spec::{System, SystemDescriptor, SystemId};


/***** LIBRARY *****/
/// The World manages all systems that exist in the engine and ticks them in registration order.
///
/// Registration order doubles as tick order, which is why a system's dependencies must be registered before the system itself.
pub struct World {
    /// The systems in this World, in registration (and thus tick) order.
    ///
    /// # Layout
    /// - `.0`: The descriptor the system was registered with.
    /// - `.1`: The system itself, shared so that dependent systems may hold on to it too.
    systems : Vec<(SystemDescriptor, Rc<RefCell<dyn System>>)>,
}

impl World {
    /// Constructor for the World.
    pub fn new() -> Self {
        debug!("Initialized World v{}", env!("CARGO_PKG_VERSION"));
        Self {
            systems : Vec::with_capacity(16),
        }
    }



    /// Registers a new system in the World.
    ///
    /// The system must already have been constructed; registration only makes it known to the World so that it is ticked and so that other systems may look it up by ID.
    ///
    /// # Arguments
    /// - `desc`: The SystemDescriptor with the system's ID, name and dependencies.
    /// - `system`: The (shared handle to the) system itself.
    ///
    /// # Errors
    /// This function errors if a system with the same ID already exists, or if one of the descriptor's dependencies has not been registered yet.
    pub fn register(&mut self, desc: SystemDescriptor, system: Rc<RefCell<dyn System>>) -> Result<(), Error> {
        // Make sure the ID is unique
        if self.systems.iter().any(|(d, _)| d.id == desc.id) {
            return Err(Error::DuplicateSystem{ id: desc.id, name: desc.name });
        }

        // Make sure all dependencies precede this system
        for dep in &desc.deps {
            if !self.systems.iter().any(|(d, _)| d.id == *dep) {
                return Err(Error::MissingDependency{ id: desc.id, name: desc.name, dep: *dep });
            }
        }

        // It checks out; append it
        debug!("Registered system '{}' with ID {}", desc.name, desc.id);
        self.systems.push((desc, system));
        Ok(())
    }

    /// Returns the system with the given ID.
    ///
    /// The returned handle is still the generic System trait; use `AsAny` on a borrow to downcast it to the concrete type.
    ///
    /// # Arguments
    /// - `id`: The ID of the system to return.
    ///
    /// # Returns
    /// A shared handle to the system, or None if no system with this ID is registered.
    #[inline]
    pub fn get(&self, id: SystemId) -> Option<Rc<RefCell<dyn System>>> {
        self.systems.iter().find(|(d, _)| d.id == id).map(|(_, s)| s.clone())
    }



    /// Runs a single tick over all registered systems, in registration order.
    ///
    /// # Arguments
    /// - `delta_seconds`: The time (in seconds) that passed since the last tick.
    ///
    /// # Errors
    /// This function errors as soon as any system's tick errors; remaining systems are not ticked this frame.
    pub fn tick(&mut self, delta_seconds: f32) -> Result<(), Error> {
        for (desc, system) in &self.systems {
            if let Err(err) = system.borrow_mut().tick(delta_seconds) {
                return Err(Error::SystemTickError{ id: desc.id, name: desc.name, err });
            }
        }
        Ok(())
    }
}

impl Default for World {
    /// Default constructor for the World.
    fn default() -> Self {
        World::new()
    }
}





/***** TESTS *****/
#[cfg(test)]
mod test {
    use std::error::Error as StdError;

    use super::*;

    /// A system that appends its ID to a shared trace when ticked.
    struct TraceSystem {
        id    : SystemId,
        trace : Rc<RefCell<Vec<SystemId>>>,
    }

    impl System for TraceSystem {
        fn id(&self) -> SystemId { self.id }

        fn tick(&mut self, _delta_seconds: f32) -> Result<(), Box<dyn StdError>> {
            self.trace.borrow_mut().push(self.id);
            Ok(())
        }
    }

    /// Registers a TraceSystem with the given ID and dependencies.
    fn register_trace(world: &mut World, trace: &Rc<RefCell<Vec<SystemId>>>, id: u32, deps: &[u32]) -> Result<(), Error> {
        world.register(
            SystemDescriptor {
                id   : SystemId::new(id),
                name : "trace",
                deps : deps.iter().map(|d| SystemId::new(*d)).collect(),
            },
            Rc::new(RefCell::new(TraceSystem{ id: SystemId::new(id), trace: trace.clone() })),
        )
    }


    /// Tests that systems tick in registration order.
    #[test]
    fn test_tick_order() {
        let trace = Rc::new(RefCell::new(vec![]));
        let mut world = World::new();
        register_trace(&mut world, &trace, 0, &[]).unwrap();
        register_trace(&mut world, &trace, 1, &[0]).unwrap();
        register_trace(&mut world, &trace, 2, &[0, 1]).unwrap();

        world.tick(0.016).unwrap();
        assert_eq!(*trace.borrow(), vec![ SystemId::new(0), SystemId::new(1), SystemId::new(2) ]);
    }

    /// Tests that duplicate IDs and missing dependencies are rejected.
    #[test]
    fn test_register_errors() {
        let trace = Rc::new(RefCell::new(vec![]));
        let mut world = World::new();
        register_trace(&mut world, &trace, 0, &[]).unwrap();

        // Same ID again
        assert!(matches!(register_trace(&mut world, &trace, 0, &[]), Err(Error::DuplicateSystem{ .. })));
        // Dependency that is not registered
        assert!(matches!(register_trace(&mut world, &trace, 1, &[42]), Err(Error::MissingDependency{ .. })));
    }

    /// Tests the lookup-by-ID that dependent systems use.
    #[test]
    fn test_get() {
        let trace = Rc::new(RefCell::new(vec![]));
        let mut world = World::new();
        register_trace(&mut world, &trace, 7, &[]).unwrap();

        assert!(world.get(SystemId::new(7)).is_some());
        assert!(world.get(SystemId::new(8)).is_none());
        assert_eq!(world.get(SystemId::new(7)).unwrap().borrow().id(), SystemId::new(7));
    }
}
