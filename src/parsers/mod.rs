// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for phenotype tables and genotype lists
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

pub mod phenotypes;
pub mod genotypes;

pub use phenotypes::{read_file_to_gpmap, open_maybe_gzip, PhenotypeFileError};
pub use genotypes::{read_genotype_file, GenotypeFileError};
