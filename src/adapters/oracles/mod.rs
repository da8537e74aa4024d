//! Complexity oracle adapters.

pub mod command;
pub mod mock;
pub mod offline;

pub use command::CommandOracle;
pub use mock::{MockOracle, MockReply};
pub use offline::OfflineOracle;
