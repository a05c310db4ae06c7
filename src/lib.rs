pub mod aggregator;
pub mod candidates;
pub mod config;
pub mod fetch;
pub mod instance;
pub mod lint;
pub mod nodeinfo;
pub mod scheduler;
pub mod version;
