//! Image folder engine: load a folder into a collection, derive sorted and
//! filtered views, play them sequentially or in non-repeating random order,
//! batch rename with rollback, and remember state between runs.

pub mod app;
pub mod collection;
pub mod config;
pub mod error;
pub mod event;
pub mod fs;
pub mod ordering;
pub mod rename;
pub mod sequencer;
pub mod session;
