pub mod mod_locks;
pub mod worker;

pub use mod_locks::{BatchGuard, ModGuard, ModLocks, LOCK_TIMEOUT};
pub use worker::ModWorker;
