pub mod config;
pub mod error;
pub mod events;
pub mod gesture;
pub mod platform;
pub mod playlist;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod transition;
pub mod zoom;
pub mod tasks {
    pub mod catalog;
    pub mod console;
    pub mod loader;
    pub mod slideshow;
}
