pub mod operations;
pub mod scan;
pub mod watcher;
