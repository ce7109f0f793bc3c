// src/ingest/providers/mod.rs
pub mod news;
pub mod twitter;
pub mod youtube;

pub use news::NewsFetcher;
pub use twitter::TwitterFetcher;
pub use youtube::YoutubeFetcher;
