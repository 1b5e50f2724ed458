// ==============================================================================
// phenotypes.rs - Genotype-Phenotype Table Parser
// ==============================================================================
// Description: Reads measured phenotypes into a genotype-phenotype map
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Format: CSV with header, plain or gzip-compressed
// Example:
//   genotypes,phenotypes,stdeviations,n_replicates
//   AAA,0.10,0.01,2
//   TAA,0.42,,1
//   ATA,0.37,0.02,
// Required columns: genotypes, phenotypes. Column order is free and extra
// columns are ignored.
// ==============================================================================

use csv::{ReaderBuilder, StringRecord, Trim};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::gpmap::{GenotypePhenotypeMap, GenotypeRecord, GpmapError};

pub const REQUIRED_COLUMNS: [&str; 2] = ["genotypes", "phenotypes"];
pub const OPTIONAL_COLUMNS: [&str; 2] = ["stdeviations", "n_replicates"];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors that can occur while reading a phenotype table
#[derive(Error, Debug)]
pub enum PhenotypeFileError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("input file ({path}) must contain a column labeled '{column}'")]
    MissingColumn { path: String, column: &'static str },

    #[error("input file ({0}) contains no genotypes")]
    EmptyFile(String),

    #[error("Invalid {column} value at row {row}: '{value}'")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("Invalid genotype-phenotype map: {0}")]
    Gpmap(#[from] GpmapError),
}

/// Column positions resolved from the header row
struct ColumnIndex {
    genotypes: usize,
    phenotypes: usize,
    stdeviations: Option<usize>,
    n_replicates: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord, path: &Path) -> Result<Self, PhenotypeFileError> {
        let find = |name: &str| headers.iter().position(|h| h.trim_matches('"') == name);
        let require = |name: &'static str| {
            find(name).ok_or_else(|| PhenotypeFileError::MissingColumn {
                path: path.display().to_string(),
                column: name,
            })
        };

        Ok(Self {
            genotypes: require(REQUIRED_COLUMNS[0])?,
            phenotypes: require(REQUIRED_COLUMNS[1])?,
            stdeviations: find(OPTIONAL_COLUMNS[0]),
            n_replicates: find(OPTIONAL_COLUMNS[1]),
        })
    }
}

/// Open a file for reading, transparently decompressing gzip content
pub fn open_maybe_gzip(path: &Path) -> std::io::Result<Box<dyn Read>> {
    let mut reader = BufReader::new(File::open(path)?);
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);

    if is_gzip {
        debug!("Detected gzip input: {:?}", path);
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Read the input table into a genotype-phenotype map
///
/// # Arguments
/// * `path` - CSV file (optionally gzip-compressed)
/// * `wildtype` - Reference genotype; the first genotype in the file when `None` or blank
///
/// # Returns
/// * `Ok(GenotypePhenotypeMap)` - Map with mutations inferred from the file
/// * `Err(PhenotypeFileError)` - Missing column, bad value, or inconsistent genotypes
///
/// Optional columns that are absent (or blank cells within them) are treated
/// as missing: no standard deviation, and a single replicate.
pub fn read_file_to_gpmap(
    path: impl AsRef<Path>,
    wildtype: Option<&str>,
) -> Result<GenotypePhenotypeMap, PhenotypeFileError> {
    let path = path.as_ref();
    info!("Reading genotype-phenotype table: {:?}", path);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(open_maybe_gzip(path)?);

    let headers = reader.headers()?.clone();
    let columns = ColumnIndex::from_headers(&headers, path)?;

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let row = result?;
        // Header is row 1
        records.push(parse_row(&row, &columns, idx + 2)?);
    }

    if records.is_empty() {
        return Err(PhenotypeFileError::EmptyFile(path.display().to_string()));
    }

    let wildtype = match wildtype.map(str::trim).filter(|wt| !wt.is_empty()) {
        Some(wt) => wt.to_string(),
        None => records[0].genotype.clone(),
    };
    debug!("Using wildtype {}", wildtype);

    let gpm = GenotypePhenotypeMap::from_records(records, wildtype)?;
    info!(
        "Loaded {} genotypes of length {}",
        gpm.len(),
        gpm.length()
    );
    Ok(gpm)
}

fn parse_row(
    row: &StringRecord,
    columns: &ColumnIndex,
    row_number: usize,
) -> Result<GenotypeRecord, PhenotypeFileError> {
    let genotype = row
        .get(columns.genotypes)
        .map(|g| g.trim_matches('"').to_string())
        .filter(|g| !g.is_empty())
        .ok_or_else(|| PhenotypeFileError::InvalidValue {
            row: row_number,
            column: "genotypes",
            value: String::new(),
        })?;

    let phenotype_str = row.get(columns.phenotypes).unwrap_or("");
    let phenotype = phenotype_str
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PhenotypeFileError::InvalidValue {
            row: row_number,
            column: "phenotypes",
            value: phenotype_str.to_string(),
        })?;

    let stdeviation = optional_field::<f64>(row, columns.stdeviations, row_number, "stdeviations")?;
    let n_replicates = optional_field::<u32>(row, columns.n_replicates, row_number, "n_replicates")?;

    Ok(GenotypeRecord {
        genotype,
        phenotype,
        stdeviation,
        n_replicates,
    })
}

/// Parse an optional column; blank, `NA` and `nan` cells are missing
fn optional_field<T: std::str::FromStr>(
    row: &StringRecord,
    column: Option<usize>,
    row_number: usize,
    name: &'static str,
) -> Result<Option<T>, PhenotypeFileError> {
    let value = match column.and_then(|c| row.get(c)) {
        Some(v) => v,
        None => return Ok(None),
    };

    if value.is_empty() || value.eq_ignore_ascii_case("na") || value.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }

    value
        .parse::<T>()
        .map(Some)
        .map_err(|_| PhenotypeFileError::InvalidValue {
            row: row_number,
            column: name,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_full_table() {
        let contents = "\
genotypes,phenotypes,stdeviations,n_replicates
AA,0.1,0.01,2
TA,0.4,,3
AG,0.3,0.02,
";
        let file = create_test_file(contents);
        let gpm = read_file_to_gpmap(file.path(), None).unwrap();

        assert_eq!(gpm.wildtype(), "AA");
        assert_eq!(gpm.len(), 3);
        assert_eq!(gpm.phenotypes(), &[0.1, 0.4, 0.3]);
        assert_eq!(gpm.stdeviations(), &[Some(0.01), None, Some(0.02)]);
        assert_eq!(gpm.n_replicates(), &[2, 3, 1]);
        assert_eq!(gpm.mutations()[0], Some(vec!['A', 'T']));
        assert_eq!(gpm.mutations()[1], Some(vec!['A', 'G']));
    }

    #[test]
    fn test_optional_columns_absent() {
        let contents = "\
phenotypes,genotypes,notes
1.0,AAA,first
2.0,TAA,second
";
        let file = create_test_file(contents);
        let gpm = read_file_to_gpmap(file.path(), None).unwrap();

        assert_eq!(gpm.genotypes(), &["AAA".to_string(), "TAA".to_string()]);
        assert_eq!(gpm.stdeviations(), &[None::<f64>, None]);
        assert_eq!(gpm.n_replicates(), &[1, 1]);
    }

    #[test]
    fn test_explicit_wildtype() {
        let contents = "\
genotypes,phenotypes
TA,0.4
AA,0.1
";
        let file = create_test_file(contents);
        let gpm = read_file_to_gpmap(file.path(), Some("AA")).unwrap();
        assert_eq!(gpm.wildtype(), "AA");
        assert_eq!(gpm.binary("TA").unwrap(), vec![1]);
    }

    #[test]
    fn test_blank_wildtype_falls_back_to_first_genotype() {
        let contents = "\
genotypes,phenotypes
TA,0.4
AA,0.1
";
        let file = create_test_file(contents);
        for wildtype in ["", "   "] {
            let gpm = read_file_to_gpmap(file.path(), Some(wildtype)).unwrap();
            assert_eq!(gpm.wildtype(), "TA");
        }
    }

    #[test]
    fn test_missing_required_column() {
        let contents = "\
genotypes,fitness
AA,0.1
";
        let file = create_test_file(contents);
        let err = read_file_to_gpmap(file.path(), None).unwrap_err();

        match err {
            PhenotypeFileError::MissingColumn { column, .. } => assert_eq!(column, "phenotypes"),
            other => panic!("Expected MissingColumn error, got {:?}", other),
        }
        let message = read_file_to_gpmap(file.path(), None).unwrap_err().to_string();
        assert!(message.contains("must contain a column labeled 'phenotypes'"));
    }

    #[test]
    fn test_invalid_phenotype() {
        let contents = "\
genotypes,phenotypes
AA,0.1
TA,not_a_number
";
        let file = create_test_file(contents);
        match read_file_to_gpmap(file.path(), None).unwrap_err() {
            PhenotypeFileError::InvalidValue { row, column, value } => {
                assert_eq!(row, 3);
                assert_eq!(column, "phenotypes");
                assert_eq!(value, "not_a_number");
            }
            other => panic!("Expected InvalidValue error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_table() {
        let file = create_test_file("genotypes,phenotypes\n");
        assert!(matches!(
            read_file_to_gpmap(file.path(), None),
            Err(PhenotypeFileError::EmptyFile(_))
        ));
    }

    #[test]
    fn test_inconsistent_genotype_length() {
        let contents = "\
genotypes,phenotypes
AA,0.1
TAA,0.4
";
        let file = create_test_file(contents);
        assert!(matches!(
            read_file_to_gpmap(file.path(), None),
            Err(PhenotypeFileError::Gpmap(GpmapError::LengthMismatch { .. }))
        ));
    }

    #[test]
    fn test_gzip_input() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(b"genotypes,phenotypes\nAA,0.1\nTT,0.8\n")
            .unwrap();
        let compressed = encoder.finish().unwrap();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&compressed).unwrap();
        file.flush().unwrap();

        let gpm = read_file_to_gpmap(file.path(), None).unwrap();
        assert_eq!(gpm.len(), 2);
        assert_eq!(gpm.phenotypes(), &[0.1, 0.8]);
    }
}
