//! Defines the Bootstrap trait through which scenarios seed a controller.

use kairos_core::entity::Failure;
use kairos_core::Sim;

/// Creates the initial entities and schedules the first events. Runs before
/// the dispatch loop starts, so blocking calls are not available here.
pub trait Bootstrap {
    fn name(&self) -> &str;

    fn seed(&self, sim: &Sim) -> Result<(), Failure>;
}

impl<B: Bootstrap + ?Sized> Bootstrap for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn seed(&self, sim: &Sim) -> Result<(), Failure> {
        (**self).seed(sim)
    }
}
