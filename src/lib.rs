pub mod config;
pub mod entry;
pub mod error;
pub mod events;
pub mod filelist;
pub mod list;
pub mod loader;
pub mod navigation;
pub mod position;
pub mod render;
pub mod sort;
pub mod tasks {
    pub mod controller;
    pub mod input;
    pub mod signals;
    pub mod watch;
}

pub use error::{Error, LoadError};
