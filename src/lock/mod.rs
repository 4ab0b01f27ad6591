mod arbiter;
mod handle;
mod queue;
mod request;
mod sequencer;
mod table;
mod timer;

pub use arbiter::{KeyState, LockArbiter};
pub use handle::LockHandle;
