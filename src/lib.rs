//! Feed fanout, bounded per-user feed caching and cursor pagination over a
//! relational store and a sorted wide-column store.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod wide;
