// src/io/mod.rs

pub mod graphics;
pub mod reader;
pub mod writer;
