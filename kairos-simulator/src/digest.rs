//! Event-trace hashing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use blake3::Hasher;

use kairos_core::controller::EventObserver;
use kairos_core::entity::EntityRef;
use kairos_core::time::Time;

/// Observer folding every dispatched event into a BLAKE3 hash. Clones share
/// the same state, so one clone can be handed to the controller and another
/// kept to read the result.
///
/// Only the entity index is hashed, not the controller identity, so runs on
/// different controllers are comparable.
#[derive(Clone, Default)]
pub struct RunDigest {
    hasher: Rc<RefCell<Hasher>>,
    events: Rc<Cell<u64>>,
}

impl RunDigest {
    pub fn events(&self) -> u64 {
        self.events.get()
    }

    pub fn hex(&self) -> String {
        hex::encode(self.hasher.borrow().finalize().as_bytes())
    }
}

impl EventObserver for RunDigest {
    fn on_dispatch(&mut self, time: Time, target: EntityRef, operation: &'static str) {
        let mut hasher = self.hasher.borrow_mut();
        hasher.update(&time.to_le_bytes());
        hasher.update(&target.index().to_le_bytes());
        hasher.update(operation.as_bytes());
        hasher.update(&[0]);
        self.events.set(self.events.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(trace: &[(Time, &'static str)]) -> String {
        let mut digest = RunDigest::default();
        for (time, op) in trace {
            digest.on_dispatch(*time, EntityRef::NULL, op);
        }
        digest.hex()
    }

    #[test]
    fn identical_traces_hash_identically() {
        let trace = [(0, "a"), (3, "b")];
        assert_eq!(digest_of(&trace), digest_of(&trace));
        assert_ne!(digest_of(&trace), digest_of(&[(0, "a"), (4, "b")]));
        assert_ne!(digest_of(&trace), digest_of(&[(3, "b"), (0, "a")]));
    }

    #[test]
    fn clones_share_state() {
        let digest = RunDigest::default();
        let mut handle = digest.clone();
        handle.on_dispatch(1, EntityRef::NULL, "x");
        assert_eq!(digest.events(), 1);
        assert_eq!(digest.hex().len(), 64);
    }
}
