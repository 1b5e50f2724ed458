// ==============================================================================
// genotypes.rs - Genotype List Parser
// ==============================================================================
// Description: Reads the list of genotypes to predict
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Format: One genotype per line, '#' comments and blank lines skipped
// Example:
//   # genotypes to predict
//   AAT
//   TTA
// ==============================================================================

use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use super::phenotypes::open_maybe_gzip;

/// Errors that can occur while reading a genotype list
#[derive(Error, Debug)]
pub enum GenotypeFileError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("\n\n{reason}\n\nLine {line_number}:\n\n{line}\n\n")]
    MangledLine {
        line_number: usize,
        line: String,
        reason: String,
    },
}

impl GenotypeFileError {
    fn mangled(reason: impl Into<String>, line: &str, line_number: usize) -> Self {
        GenotypeFileError::MangledLine {
            line_number,
            line: line.trim().to_string(),
            reason: reason.into(),
        }
    }
}

/// Read a file with a list of genotypes to predict
///
/// # Arguments
/// * `wildtype` - Reference genotype; every listed genotype must match its length
/// * `path` - Text file with one genotype per line, plain or gzip-compressed
///
/// # Returns
/// * `Ok(Vec<String>)` - Genotypes in file order
/// * `Err(GenotypeFileError)` - A line holds several tokens or has the wrong length
pub fn read_genotype_file(
    wildtype: &str,
    path: impl AsRef<Path>,
) -> Result<Vec<String>, GenotypeFileError> {
    let genotype_size = wildtype.chars().count();
    let reader = BufReader::new(open_maybe_gzip(path.as_ref())?);

    let mut genotypes = Vec::new();
    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let genotype = line.trim();

        if genotype.is_empty() || genotype.starts_with('#') {
            continue;
        }

        if genotype.split_whitespace().count() > 1 {
            return Err(GenotypeFileError::mangled(
                "Mangled line. More than one genotype?",
                &line,
                idx + 1,
            ));
        }

        if genotype.chars().count() != genotype_size {
            return Err(GenotypeFileError::mangled(
                format!("Mangled line. Genotype length does not match {}", wildtype),
                &line,
                idx + 1,
            ));
        }

        genotypes.push(genotype.to_string());
    }

    info!("Read {} genotypes from {:?}", genotypes.len(), path.as_ref());
    Ok(genotypes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_genotypes_skipping_comments() {
        let contents = "\
# genotypes to predict
AAT

  TTA
# trailing comment
";
        let file = create_test_file(contents);
        let genotypes = read_genotype_file("AAA", file.path()).unwrap();
        assert_eq!(genotypes, vec!["AAT".to_string(), "TTA".to_string()]);
    }

    #[test]
    fn test_more_than_one_genotype() {
        let file = create_test_file("AAT\nAAA TTT\n");
        match read_genotype_file("AAA", file.path()).unwrap_err() {
            GenotypeFileError::MangledLine {
                line_number,
                line,
                reason,
            } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "AAA TTT");
                assert_eq!(reason, "Mangled line. More than one genotype?");
            }
            other => panic!("Expected MangledLine error, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_length() {
        let file = create_test_file("AATT\n");
        let err = read_genotype_file("AAA", file.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Mangled line. Genotype length does not match AAA"));
        assert!(message.contains("AATT"));
    }

    #[test]
    fn test_empty_file() {
        let file = create_test_file("# nothing here\n\n");
        assert!(read_genotype_file("AAA", file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_gzipped_list() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"TTA\nAAT\n").unwrap();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
        file.flush().unwrap();

        let genotypes = read_genotype_file("AAA", file.path()).unwrap();
        assert_eq!(genotypes, vec!["TTA".to_string(), "AAT".to_string()]);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read_genotype_file("AAA", "/nonexistent/genotypes.txt"),
            Err(GenotypeFileError::IoError(_))
        ));
    }
}
