pub mod avatar_cache;
pub mod avatar_feed;
pub mod avatar_fetch;
pub mod config;
pub mod http_client;
pub mod rankings;
pub mod roster;
pub mod state;
