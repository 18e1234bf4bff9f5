pub mod auth;
pub mod availability;
pub mod booking;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod routes;
pub mod schedule;
pub mod state;
pub mod store;
