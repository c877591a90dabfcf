// tessera/core/execution/src/state/mod.rs

pub mod journal;
pub mod view;

pub use journal::Checkpoint;
pub use view::{BlockHashContext, StateError, StateView};
