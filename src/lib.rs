//! Menu creation pipeline
//!
//! Turns photographed restaurant menus into structured, enriched food and
//! wine menus. Jobs run in the background through a bounded dispatcher;
//! clients poll their status over HTTP.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
