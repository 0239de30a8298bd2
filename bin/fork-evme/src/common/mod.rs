mod error;
mod fork;
mod hex;
mod logging;
mod state;

pub use error::*;
pub use fork::*;
pub use hex::*;
pub use logging::*;
pub use state::*;
