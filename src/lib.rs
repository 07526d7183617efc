// Library surface for headless/integration tests and the binary.
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod playback;
pub mod random;
pub mod recorder;
pub mod runtime;
pub mod sampler;
pub mod store;
pub mod studio;
pub mod trace;
pub mod ui;
pub mod util;

pub use error::{AuraError, Result};
