//! Demo scenarios.
//!
//! Each scenario is a [`Bootstrap`] and can also be described in YAML
//! through [`ScenarioSpec`]:
//!
//! ```yaml
//! kind: random_workload
//! seed: 42
//! entities: 64
//! events: 100000
//! ```

mod bank;
mod greeting;
mod ping_pong;
mod workload;

pub use bank::{Bank, BankLedger, InsufficientFunds};
pub use greeting::Greeting;
pub use ping_pong::PingPong;
pub use workload::RandomWorkload;

use serde::{Deserialize, Serialize};

use crate::driver::Bootstrap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioSpec {
    Greeting {
        rounds: u32,
    },
    PingPong {
        volleys: u32,
        #[serde(default = "default_swing")]
        swing: u64,
    },
    Bank {
        customers: u32,
        opening_balance: i64,
    },
    RandomWorkload {
        seed: u64,
        entities: u32,
        events: u64,
    },
}

fn default_swing() -> u64 {
    1
}

impl ScenarioSpec {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn bootstrap(&self) -> Box<dyn Bootstrap> {
        match *self {
            ScenarioSpec::Greeting { rounds } => Box::new(Greeting::new(rounds)),
            ScenarioSpec::PingPong { volleys, swing } => Box::new(PingPong::new(volleys, swing)),
            ScenarioSpec::Bank {
                customers,
                opening_balance,
            } => Box::new(Bank::new(customers, opening_balance)),
            ScenarioSpec::RandomWorkload {
                seed,
                entities,
                events,
            } => Box::new(RandomWorkload::new(seed, entities, events)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specs_parse_from_yaml() {
        let spec = ScenarioSpec::from_yaml("kind: ping_pong\nvolleys: 4\n").unwrap();
        assert_eq!(spec, ScenarioSpec::PingPong { volleys: 4, swing: 1 });
        assert_eq!(spec.bootstrap().name(), "ping-pong");

        let spec = ScenarioSpec::from_yaml(
            "kind: random_workload\nseed: 9\nentities: 3\nevents: 10\n",
        )
        .unwrap();
        assert_eq!(spec.bootstrap().name(), "random-workload");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(ScenarioSpec::from_yaml("kind: chaos\n").is_err());
    }
}
