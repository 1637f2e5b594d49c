// src/ports/mod.rs

pub mod generator;
pub mod packer;

pub use generator::ImageGenerator;
pub use packer::AtlasPacker;
