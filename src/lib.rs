pub mod campaigns;
pub mod config;
pub mod core;
pub mod integrations;
pub mod jobs;
pub mod server;
pub mod shared;
pub mod sync;
pub mod vendors;
