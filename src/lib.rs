//! tripdesk - Back-office content service for a travel agency website
//!
//! This library provides the content schemas, storage, services and HTTP API
//! behind the `tripdesk` binary.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
