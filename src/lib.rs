pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod prompt;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod tools;
pub mod translate;
pub mod vendor;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use logging::SharedLogger;
pub use server::{build_router, AppState};
pub use vendor::{Vendor, VendorInput};
