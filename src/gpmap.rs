// ==============================================================================
// gpmap.rs - Genotype-Phenotype Map
// ==============================================================================
// Description: Genotype-phenotype map data structure and mutation encoding
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Encoding:
//   Every variable site contributes one binary feature per non-wildtype letter.
//   wildtype "AA", mutations [["A","T"], ["A","C","G"]]
//   - features: A0T, A1C, A1G
//   - "TG" -> [1, 0, 1]
// ==============================================================================

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Allowed letters at one site. `None` marks an invariant site.
pub type SiteMutations = Option<Vec<char>>;

/// Errors raised while building or querying a genotype-phenotype map
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpmapError {
    #[error("Wildtype genotype is empty")]
    EmptyWildtype,

    #[error("Genotype '{genotype}' has {length} sites but wildtype '{wildtype}' has {expected}")]
    LengthMismatch {
        genotype: String,
        length: usize,
        expected: usize,
        wildtype: String,
    },

    #[error("Column '{column}' has {actual} entries, expected {expected}")]
    ColumnLength {
        column: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Mutations cover {actual} sites but wildtype has {expected}")]
    MutationSites { expected: usize, actual: usize },

    #[error("Wildtype letter '{letter}' is not listed in the mutations for site {site}")]
    WildtypeNotInMutations { site: usize, letter: char },

    #[error("Letter '{letter}' at site {site} of genotype '{genotype}' is not an allowed mutation")]
    UnknownLetter {
        genotype: String,
        site: usize,
        letter: char,
    },

    #[error("Genotype space exceeds the limit of {limit} genotypes")]
    GenotypeSpaceTooLarge { limit: usize },
}

/// One parsed row of a phenotype table
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeRecord {
    pub genotype: String,
    pub phenotype: f64,
    pub stdeviation: Option<f64>,
    pub n_replicates: Option<u32>,
}

/// Measured phenotypes for a set of genotypes, all relative to one wildtype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenotypePhenotypeMap {
    wildtype: String,
    mutations: Vec<SiteMutations>,
    genotypes: Vec<String>,
    phenotypes: Vec<f64>,
    stdeviations: Vec<Option<f64>>,
    n_replicates: Vec<u32>,
}

impl GenotypePhenotypeMap {
    /// Build a map, checking every genotype against the wildtype and mutations.
    ///
    /// `stdeviations` of `None` means no genotype has a measured error.
    pub fn new(
        wildtype: impl Into<String>,
        mutations: Vec<SiteMutations>,
        genotypes: Vec<String>,
        phenotypes: Vec<f64>,
        stdeviations: Option<Vec<Option<f64>>>,
        n_replicates: Vec<u32>,
    ) -> Result<Self, GpmapError> {
        let wildtype = wildtype.into();
        if wildtype.is_empty() {
            return Err(GpmapError::EmptyWildtype);
        }

        let wt: Vec<char> = wildtype.chars().collect();
        if mutations.len() != wt.len() {
            return Err(GpmapError::MutationSites {
                expected: wt.len(),
                actual: mutations.len(),
            });
        }
        for (site, (letter, allowed)) in wt.iter().zip(mutations.iter()).enumerate() {
            if let Some(letters) = allowed {
                if !letters.contains(letter) {
                    return Err(GpmapError::WildtypeNotInMutations {
                        site,
                        letter: *letter,
                    });
                }
            }
        }

        let n = genotypes.len();
        check_column("phenotypes", n, phenotypes.len())?;
        check_column("n_replicates", n, n_replicates.len())?;
        let stdeviations = match stdeviations {
            Some(values) => {
                check_column("stdeviations", n, values.len())?;
                values
            }
            None => vec![None; n],
        };

        for genotype in &genotypes {
            check_genotype(&wildtype, &wt, &mutations, genotype)?;
        }

        Ok(Self {
            wildtype,
            mutations,
            genotypes,
            phenotypes,
            stdeviations,
            n_replicates,
        })
    }

    /// Build a map from parsed rows, inferring the mutations from the genotypes.
    ///
    /// Missing `n_replicates` default to 1.
    pub fn from_records(
        records: Vec<GenotypeRecord>,
        wildtype: impl Into<String>,
    ) -> Result<Self, GpmapError> {
        let wildtype = wildtype.into();
        let mut genotypes = Vec::with_capacity(records.len());
        let mut phenotypes = Vec::with_capacity(records.len());
        let mut stdeviations = Vec::with_capacity(records.len());
        let mut n_replicates = Vec::with_capacity(records.len());

        for record in records {
            genotypes.push(record.genotype);
            phenotypes.push(record.phenotype);
            stdeviations.push(record.stdeviation);
            n_replicates.push(record.n_replicates.unwrap_or(1));
        }

        let mutations = mutations_from_genotypes(&wildtype, &genotypes)?;
        Self::new(
            wildtype,
            mutations,
            genotypes,
            phenotypes,
            Some(stdeviations),
            n_replicates,
        )
    }

    pub fn wildtype(&self) -> &str {
        &self.wildtype
    }

    pub fn mutations(&self) -> &[SiteMutations] {
        &self.mutations
    }

    pub fn genotypes(&self) -> &[String] {
        &self.genotypes
    }

    pub fn phenotypes(&self) -> &[f64] {
        &self.phenotypes
    }

    pub fn stdeviations(&self) -> &[Option<f64>] {
        &self.stdeviations
    }

    pub fn n_replicates(&self) -> &[u32] {
        &self.n_replicates
    }

    pub fn len(&self) -> usize {
        self.genotypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genotypes.is_empty()
    }

    /// Number of sites in every genotype
    pub fn length(&self) -> usize {
        self.mutations.len()
    }

    /// Mutation encoding derived from the wildtype and mutations
    pub fn encoding(&self) -> MutationEncoding {
        MutationEncoding::new(&self.wildtype, &self.mutations)
    }

    /// Binary representation of a genotype under this map's encoding
    pub fn binary(&self, genotype: &str) -> Result<Vec<u8>, GpmapError> {
        self.encoding().encode(genotype)
    }

    /// Enumerate every genotype the mutations allow, wildtype first.
    ///
    /// Fails instead of allocating when the space holds more than `limit` genotypes.
    pub fn all_possible_genotypes(&self, limit: usize) -> Result<Vec<String>, GpmapError> {
        let wt: Vec<char> = self.wildtype.chars().collect();
        let choices: Vec<Vec<char>> = self
            .mutations
            .iter()
            .zip(wt.iter())
            .map(|(allowed, letter)| match allowed {
                Some(letters) => letters.clone(),
                None => vec![*letter],
            })
            .collect();

        let size = choices
            .iter()
            .try_fold(1usize, |acc, c| acc.checked_mul(c.len()))
            .filter(|size| *size <= limit)
            .ok_or(GpmapError::GenotypeSpaceTooLarge { limit })?;

        let mut genotypes = Vec::with_capacity(size);
        let mut counters = vec![0usize; choices.len()];
        for _ in 0..size {
            genotypes.push(
                counters
                    .iter()
                    .zip(choices.iter())
                    .map(|(&i, letters)| letters[i])
                    .collect(),
            );

            // Odometer increment, last site fastest
            for site in (0..counters.len()).rev() {
                counters[site] += 1;
                if counters[site] < choices[site].len() {
                    break;
                }
                counters[site] = 0;
            }
        }

        Ok(genotypes)
    }
}

fn check_column(column: &'static str, expected: usize, actual: usize) -> Result<(), GpmapError> {
    if expected != actual {
        return Err(GpmapError::ColumnLength {
            column,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_genotype(
    wildtype: &str,
    wt: &[char],
    mutations: &[SiteMutations],
    genotype: &str,
) -> Result<(), GpmapError> {
    let length = genotype.chars().count();
    if length != wt.len() {
        return Err(GpmapError::LengthMismatch {
            genotype: genotype.to_string(),
            length,
            expected: wt.len(),
            wildtype: wildtype.to_string(),
        });
    }

    for (site, letter) in genotype.chars().enumerate() {
        let allowed = match &mutations[site] {
            Some(letters) => letters.contains(&letter),
            None => letter == wt[site],
        };
        if !allowed {
            return Err(GpmapError::UnknownLetter {
                genotype: genotype.to_string(),
                site,
                letter,
            });
        }
    }

    Ok(())
}

/// Infer the allowed letters at each site from a set of genotypes.
///
/// Sites where every genotype carries the wildtype letter are invariant (`None`).
/// Otherwise the wildtype letter comes first, followed by the other observed
/// letters in sorted order.
pub fn mutations_from_genotypes(
    wildtype: &str,
    genotypes: &[String],
) -> Result<Vec<SiteMutations>, GpmapError> {
    if wildtype.is_empty() {
        return Err(GpmapError::EmptyWildtype);
    }

    let wt: Vec<char> = wildtype.chars().collect();
    let mut observed: Vec<BTreeSet<char>> = vec![BTreeSet::new(); wt.len()];

    for genotype in genotypes {
        let length = genotype.chars().count();
        if length != wt.len() {
            return Err(GpmapError::LengthMismatch {
                genotype: genotype.clone(),
                length,
                expected: wt.len(),
                wildtype: wildtype.to_string(),
            });
        }
        for (site, letter) in genotype.chars().enumerate() {
            observed[site].insert(letter);
        }
    }

    Ok(wt
        .iter()
        .zip(observed)
        .map(|(&wt_letter, letters)| {
            let others: Vec<char> = letters.into_iter().filter(|&l| l != wt_letter).collect();
            if others.is_empty() {
                None
            } else {
                let mut site = Vec::with_capacity(others.len() + 1);
                site.push(wt_letter);
                site.extend(others);
                Some(site)
            }
        })
        .collect())
}

/// Generate a new map sharing `original`'s wildtype and mutations, with new data.
///
/// `new_n_replicates` applies to every genotype; `new_stdeviations` of `None`
/// leaves all errors missing.
pub fn gpmap_from_gpmap(
    original: &GenotypePhenotypeMap,
    new_genotypes: Vec<String>,
    new_phenotypes: Vec<f64>,
    new_n_replicates: u32,
    new_stdeviations: Option<Vec<f64>>,
) -> Result<GenotypePhenotypeMap, GpmapError> {
    let n = new_genotypes.len();
    GenotypePhenotypeMap::new(
        original.wildtype(),
        original.mutations().to_vec(),
        new_genotypes,
        new_phenotypes,
        new_stdeviations.map(|values| values.into_iter().map(Some).collect()),
        vec![new_n_replicates; n],
    )
}

/// Maps genotypes onto binary mutation features
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEncoding {
    wildtype: Vec<char>,
    /// (site, letter) of each feature, in feature order
    features: Vec<(usize, char)>,
    index: HashMap<(usize, char), usize>,
}

impl MutationEncoding {
    pub fn new(wildtype: &str, mutations: &[SiteMutations]) -> Self {
        let wildtype: Vec<char> = wildtype.chars().collect();
        let mut features = Vec::new();

        for (site, allowed) in mutations.iter().enumerate() {
            if let Some(letters) = allowed {
                for &letter in letters {
                    if wildtype.get(site) != Some(&letter) {
                        features.push((site, letter));
                    }
                }
            }
        }

        let index = features
            .iter()
            .enumerate()
            .map(|(i, &key)| (key, i))
            .collect();

        Self {
            wildtype,
            features,
            index,
        }
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Site of each feature
    pub fn sites(&self) -> Vec<usize> {
        self.features.iter().map(|&(site, _)| site).collect()
    }

    /// Feature labels such as `A0T` (wildtype letter, 0-based site, mutant letter)
    pub fn labels(&self) -> Vec<String> {
        self.features
            .iter()
            .map(|&(site, letter)| format!("{}{}{}", self.wildtype[site], site, letter))
            .collect()
    }

    pub fn encode(&self, genotype: &str) -> Result<Vec<u8>, GpmapError> {
        let length = genotype.chars().count();
        if length != self.wildtype.len() {
            return Err(GpmapError::LengthMismatch {
                genotype: genotype.to_string(),
                length,
                expected: self.wildtype.len(),
                wildtype: self.wildtype.iter().collect(),
            });
        }

        let mut bits = vec![0u8; self.features.len()];
        for (site, letter) in genotype.chars().enumerate() {
            if letter == self.wildtype[site] {
                continue;
            }
            let feature = self.index.get(&(site, letter)).ok_or_else(|| {
                GpmapError::UnknownLetter {
                    genotype: genotype.to_string(),
                    site,
                    letter,
                }
            })?;
            bits[*feature] = 1;
        }

        Ok(bits)
    }

    /// Encode many genotypes into an `n_genotypes x n_features` 0/1 matrix
    pub fn encode_all(&self, genotypes: &[String]) -> Result<Array2<f64>, GpmapError> {
        let mut matrix = Array2::zeros((genotypes.len(), self.features.len()));
        for (row, genotype) in genotypes.iter().enumerate() {
            for (col, bit) in self.encode(genotype)?.into_iter().enumerate() {
                matrix[[row, col]] = f64::from(bit);
            }
        }
        Ok(matrix)
    }
}
