// Library for tests to access modules

pub mod aggregator;
pub mod config;
pub mod fetch;
pub mod health;
pub mod models;
pub mod routes;
pub mod scan;
pub mod scheduler;
pub mod series;
pub mod stream;
