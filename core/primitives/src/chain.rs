// tessera/core/primitives/src/chain.rs

use serde::{Deserialize, Serialize};

/// Fork activation heights. `None` keeps a fork disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainRules {
    pub chain_id: u64,
    pub berlin_block: Option<u64>,
    pub london_block: Option<u64>,
    pub shanghai_block: Option<u64>,
}

impl Default for ChainRules {
    fn default() -> Self {
        Self {
            chain_id: 9000,
            berlin_block: Some(0),
            london_block: Some(0),
            shanghai_block: None,
        }
    }
}

/// Forks active at one height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Forks {
    pub berlin: bool,
    pub london: bool,
    pub shanghai: bool,
}

fn active(activation: Option<u64>, height: u64) -> bool {
    activation.is_some_and(|at| height >= at)
}

impl ChainRules {
    pub fn is_berlin(&self, height: u64) -> bool {
        active(self.berlin_block, height)
    }

    pub fn is_london(&self, height: u64) -> bool {
        active(self.london_block, height)
    }

    pub fn is_shanghai(&self, height: u64) -> bool {
        active(self.shanghai_block, height)
    }

    pub fn forks_at(&self, height: u64) -> Forks {
        Forks {
            berlin: self.is_berlin(height),
            london: self.is_london(height),
            shanghai: self.is_shanghai(height),
        }
    }
}
