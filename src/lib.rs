//! MOD import and lifecycle engine.
//!
//! Archives are unwrapped (nested archives included) into scratch space, payload groups
//! are detected, copied into the game's active MOD directory and backed up. Enable and
//! disable move MODs between the backup store and the active directory.

pub mod services;
pub mod types;
#[cfg(test)]
pub mod test_utils;
