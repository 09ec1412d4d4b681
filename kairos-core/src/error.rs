use kairos_config::ConfigError;
use thiserror::Error;

use crate::controller::RunState;
use crate::entity::{EntityRef, Failure};
use crate::time::Time;

/// Why a simulation run stopped other than by reaching its end.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// A failure escaped an operation with no blocking caller to receive it.
    #[error("{operation} on {target} failed at t={time}: {failure:#}")]
    Application {
        time: Time,
        target: EntityRef,
        operation: String,
        failure: Failure,
        /// Most recently dispatched events, oldest first.
        trail: Vec<String>,
    },

    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    /// Internal invariant violation; the queue has been released.
    #[error("Fatal engine error: {0}")]
    Fatal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SimulationError {
    /// The application failure, if this is one.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            SimulationError::Application { failure, .. } => Some(failure),
            _ => None,
        }
    }

    pub fn trail(&self) -> &[String] {
        match self {
            SimulationError::Application { trail, .. } => trail,
            _ => &[],
        }
    }
}

/// Programming mistakes, rejected synchronously at the call site.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("cannot schedule at t={time}, simulation is already at t={now}")]
    ScheduleInPast { time: Time, now: Time },

    #[error("blocking call made outside a blocking operation")]
    NotInProcess,

    #[error("process already has a blocking call outstanding")]
    ConcurrentCall,

    #[error("no entity registered at {0}")]
    UnknownEntity(EntityRef),

    #[error("{0} belongs to another controller")]
    ForeignEntity(EntityRef),

    #[error("{entity} is a {actual}, not a {expected}")]
    TypeMismatch {
        entity: EntityRef,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{0} is already in use by the running operation")]
    EntityBusy(EntityRef),

    #[error("controller is {0:?}; runs start from Idle")]
    NotIdle(RunState),
}
