//! Camera-app UI mapping: drives a physical Android device through its
//! stock camera app, detects and labels clickable regions, measures
//! menu animation timings, and persists a command catalogue a playback
//! system can replay blindly.

pub mod annotate;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod overlay;
pub mod session;

pub use annotate::{Annotator, ConsoleAnnotator};
pub use config::MapperConfig;
pub use engine::{Explorer, State};
pub use error::MapperError;
pub use session::SessionContext;
