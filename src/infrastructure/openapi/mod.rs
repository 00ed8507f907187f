//! Service description loading

pub mod file_loader;

pub use file_loader::FileSpecLoader;
