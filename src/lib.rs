// ==============================================================================
// lib.rs - GPSeer Library
// ==============================================================================
// Description: Library interface for genotype-phenotype map modeling
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 0.1.0
// ==============================================================================

pub mod gpmap;
pub mod parsers;
pub mod epistasis;
pub mod validator;
pub mod models;
pub mod processor;
pub mod output;

pub use epistasis::{construct_model, EpistasisPipeline};
pub use gpmap::{gpmap_from_gpmap, GenotypePhenotypeMap};
pub use parsers::{read_file_to_gpmap, read_genotype_file};
