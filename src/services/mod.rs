pub mod api;
pub mod persistence;
pub mod poller;
pub mod projector;
