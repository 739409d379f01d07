pub mod channels;
pub mod repository;

pub use channels::{ChannelRegistry, Subscription};
pub use repository::{ApplyStats, Repository, StoreCounts, StoreSnapshot};
