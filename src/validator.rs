// ==============================================================================
// validator.rs - Input File Validation
// ==============================================================================
// Description: Validates phenotype tables and genotype lists before parsing
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// Checks: size limit, allowlisted extension, gzip magic number, SHA-256
// Genotype lists skip the extension allowlist
// ==============================================================================

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const MAX_FILE_SIZE: u64 = 500 * 1024 * 1024; // 500 MB

#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub file_name: String,
    /// Empty when the file has no extension
    pub extension: String,
    pub size: u64,
    pub hash_sha256: String,
}

pub struct InputValidator {
    max_file_size: u64,
    allowed_types: HashMap<String, Vec<u8>>,
    any_extension: bool,
}

impl InputValidator {
    pub fn new() -> Self {
        let mut allowed_types = HashMap::new();

        // Plain text tables and genotype lists (no magic number)
        allowed_types.insert("csv".to_string(), vec![]);
        allowed_types.insert("txt".to_string(), vec![]);

        // Gzip compressed tables
        allowed_types.insert("csv.gz".to_string(), vec![0x1f, 0x8b, 0x08]);

        Self {
            max_file_size: MAX_FILE_SIZE,
            allowed_types,
            any_extension: false,
        }
    }

    /// Policy for lists of genotypes to predict: any file name is accepted,
    /// known extensions are still checked for their magic number.
    pub fn genotype_list() -> Self {
        Self {
            any_extension: true,
            ..Self::new()
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn validate(&self, file_path: &Path) -> Result<ValidatedFile> {
        let file_name = file_path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Invalid file path: {:?}", file_path))?
            .to_string_lossy()
            .to_string();

        info!("Validating file: {}", file_name);

        // 1. Size check
        let metadata = std::fs::metadata(file_path)
            .with_context(|| format!("Failed to get file metadata for {:?}", file_path))?;
        if !metadata.is_file() {
            anyhow::bail!("Not a regular file: {:?}", file_path);
        }
        let size = metadata.len();

        if size > self.max_file_size {
            anyhow::bail!(
                "File too large: {} bytes (max: {} bytes)",
                size,
                self.max_file_size
            );
        }
        debug!("Size check passed: {} bytes", size);

        // 2. Extension check (allowlist)
        let ext = match self.get_extension(&file_name) {
            Ok(ext) => ext,
            Err(_) if self.any_extension => String::new(),
            Err(e) => return Err(e),
        };
        if !self.any_extension && !self.allowed_types.contains_key(&ext) {
            anyhow::bail!("Invalid file type: {}", ext);
        }
        debug!("Extension check passed: {:?}", ext);

        // 3. Magic number verification
        if let Some(expected_magic) = self.allowed_types.get(&ext) {
            if !expected_magic.is_empty() {
                let actual_magic = self.read_magic_number(file_path)?;
                if !self.verify_magic_number(expected_magic, &actual_magic) {
                    anyhow::bail!("Magic number mismatch for .{} file", ext);
                }
                debug!("Magic number check passed");
            }
        }

        // 4. Compute SHA-256 hash
        let hash = self.compute_sha256(file_path)?;
        debug!("SHA-256: {}", hash);

        Ok(ValidatedFile {
            file_name,
            extension: ext,
            size,
            hash_sha256: hash,
        })
    }

    fn get_extension(&self, filename: &str) -> Result<String> {
        let lower = filename.to_lowercase();

        // Handle compound extensions like .csv.gz
        if lower.ends_with(".csv.gz") {
            return Ok("csv.gz".to_string());
        }

        match lower.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => Ok(ext.to_string()),
            _ => anyhow::bail!("No file extension found: {}", filename),
        }
    }

    fn read_magic_number(&self, path: &Path) -> Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::with_capacity(4);
        file.by_ref().take(4).read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn verify_magic_number(&self, expected: &[u8], actual: &[u8]) -> bool {
        expected.len() <= actual.len()
            && expected.iter().zip(actual.iter()).all(|(e, a)| e == a)
    }

    fn compute_sha256(&self, path: &Path) -> Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 8192];

        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}
