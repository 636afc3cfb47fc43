//! Authors Haven - A community publishing platform backend
//!
//! This library provides the REST API, services and storage for Authors Haven.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
