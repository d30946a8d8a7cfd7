//! Reference bookmaker: snapshot types, the driver boundary and session ownership.

pub mod bridge;
pub mod driver;
pub mod mock;
pub mod session;
pub mod types;

pub use bridge::{BridgeDriver, BridgeSession};
pub use driver::ReferenceDriver;
pub use session::SessionManager;
pub use types::{FixtureMeta, Horizon, ReferenceQuote, ReferenceQuoteSnapshot};
