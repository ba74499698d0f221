// src/blocks/mod.rs
pub mod common;
pub mod file_definition_block;
pub mod directory_block;
pub mod label_block;
pub mod data_block;
