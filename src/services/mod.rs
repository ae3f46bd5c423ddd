pub mod archive;
pub mod categories;
pub mod config;
pub mod core;
pub mod fs_utils;
pub mod mods;
