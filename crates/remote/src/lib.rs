#![forbid(unsafe_code)]

pub mod error;
pub mod http;
pub mod memory;
pub mod session;

pub use error::RemoteError;
pub use http::{HttpRemote, RemoteConfig};
pub use memory::{InMemoryRemote, RemoteOp};
pub use session::{RoundSubmission, SessionRemote};
