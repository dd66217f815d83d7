//! Module synchronization (push, inbound merge, scheduled pull)

mod hub;
mod locations;
mod page_reader;
mod synchronizer;

pub use hub::{SynchronizerFor, Synchronizers};
pub use page_reader::{Page, PageReader};
pub use synchronizer::{ModuleSynchronizer, SyncReport};
