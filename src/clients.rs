pub mod discord;
pub mod feed;

pub use discord::DiscordClient;
pub use feed::FeedClient;
