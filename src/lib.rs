//! Paperdesk - PDF and image tools with a small CMS
//!
//! This library provides the core functionality for the Paperdesk service:
//! the file tools, the blog/CMS content services, the settings stores and
//! the HTTP API that exposes them.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod tools;
