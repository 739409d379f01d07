pub mod connection;

pub use connection::FeedConnection;
