//! Core library for exporting a Pocket reading list as Org-mode TODO entries.

pub mod api;
pub mod auth;
pub mod config;
pub mod consumer_key;
pub mod export;
mod http;
