pub mod config;
pub mod mode;
pub mod record;
pub mod registry;
pub mod view;
