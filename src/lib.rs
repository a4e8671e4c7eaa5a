// Library for the binary and tests to access modules

pub mod aggregator;
pub mod config;
pub mod control;
pub mod error;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod sink;
pub mod supervisor;
pub mod transport;
pub mod worker;
