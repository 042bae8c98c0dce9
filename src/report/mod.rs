// src/report/mod.rs

pub mod binding;
pub mod catalog;
pub mod config;
pub mod group;
pub mod leaf;
pub mod registry;
pub mod traits;
