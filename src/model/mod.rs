// src/model/mod.rs

pub mod farm;
pub mod state;
