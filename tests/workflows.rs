// ==============================================================================
// tests/workflows.rs - End-to-End Workflow Tests
// ==============================================================================
// Description: Runs estimate-ml and goodness-of-fit on small generated tables
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use std::io::Write;
use std::path::{Path, PathBuf};

use gpseer::models::{GoodnessOfFitParams, ModelParams};
use gpseer::processor::{GpseerProcessor, DEFAULT_MAX_GENOTYPES};
use tempfile::TempDir;

const WILDTYPE: &str = "AAAA";
const EFFECTS: [f64; 4] = [0.1, 0.2, 0.4, 0.8];

/// Every genotype over "A"/"T" at four sites with additive phenotypes
fn additive_library() -> Vec<(String, f64)> {
    (0..16u32)
        .map(|bits| {
            let genotype: String = (0..4)
                .map(|site| if bits & (1 << site) != 0 { 'T' } else { 'A' })
                .collect();
            let phenotype = 0.1
                + (0..4)
                    .filter(|site| bits & (1 << site) != 0)
                    .map(|site| EFFECTS[site])
                    .sum::<f64>();
            (genotype, phenotype)
        })
        .collect()
}

fn create_test_file(dir: &Path, name: &str, rows: &[(String, f64)]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "genotypes,phenotypes,stdeviations,n_replicates").unwrap();
    for (genotype, phenotype) in rows {
        writeln!(file, "{},{},0.01,2", genotype, phenotype).unwrap();
    }
    path
}

fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.records().map(|r| r.unwrap()).collect()
}

#[test]
fn test_estimate_ml_predicts_unmeasured_genotype() {
    let dir = TempDir::new().unwrap();
    let library = additive_library();
    let held_out = library[15].clone();
    let input = create_test_file(dir.path(), "library.csv", &library[..15]);

    let processor = GpseerProcessor::new(
        input,
        Some(WILDTYPE.to_string()),
        dir.path().join("out"),
        ModelParams::default(),
    );
    let outputs = processor.estimate_ml(None, DEFAULT_MAX_GENOTYPES).unwrap();

    assert_eq!(outputs.table, dir.path().join("out/library_predictions.csv"));
    let rows = read_rows(&outputs.table);
    assert_eq!(rows.len(), 16);
    assert_eq!(&rows[0][0], WILDTYPE);

    let missing = rows.iter().find(|r| &r[0] == held_out.0.as_str()).unwrap();
    let predicted: f64 = missing[1].parse().unwrap();
    assert!((predicted - held_out.1).abs() < 1e-6, "predicted {}", predicted);
    // Not measured, so no measured columns
    assert_eq!(&missing[2], "");
    assert_eq!(&missing[4], "");

    let wildtype_row = &rows[0];
    assert_eq!(&wildtype_row[3], "0.01");
    assert_eq!(&wildtype_row[4], "2");

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&outputs.summary).unwrap()).unwrap();
    assert_eq!(summary["metadata"]["command"], "estimate-ml");
    assert_eq!(summary["metadata"]["wildtype"], WILDTYPE);
    assert_eq!(summary["metadata"]["n_genotypes"], 15);
    assert_eq!(summary["n_predicted"], 16);
    assert!(summary["training_r2"].as_f64().unwrap() > 0.999);
    assert_eq!(summary["coefficients"].as_array().unwrap().len(), 5);
    assert_eq!(summary["coefficients"][0]["term"], "w.t.");
}

#[test]
fn test_estimate_ml_with_genotype_file_and_classifier() {
    let dir = TempDir::new().unwrap();
    let input = create_test_file(dir.path(), "library.csv", &additive_library());
    let genotype_file = dir.path().join("wanted.txt");
    std::fs::write(&genotype_file, "TTAA\nATAT\n").unwrap();

    let params = ModelParams {
        threshold: Some(0.05),
        ..ModelParams::default()
    };
    let processor = GpseerProcessor::new(input, None, dir.path().to_path_buf(), params);
    let outputs = processor
        .estimate_ml(Some(&genotype_file), DEFAULT_MAX_GENOTYPES)
        .unwrap();

    let rows = read_rows(&outputs.table);
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "TTAA");
    assert_eq!(&rows[1][0], "ATAT");
    for row in &rows {
        let probability: f64 = row[5].parse().unwrap();
        assert!((0.0..=1.0).contains(&probability));
    }

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&outputs.summary).unwrap()).unwrap();
    assert_eq!(
        summary["stages"],
        serde_json::json!(["EpistasisLogisticRegression", "EpistasisLinearRegression"])
    );
}

#[test]
fn test_estimate_ml_accepts_extensionless_genotype_file() {
    let dir = TempDir::new().unwrap();
    let input = create_test_file(dir.path(), "library.csv", &additive_library());
    let genotype_file = dir.path().join("genotypes_to_predict");
    std::fs::write(&genotype_file, "TTTT\nAAAA\n").unwrap();

    let processor = GpseerProcessor::new(
        input,
        Some(String::new()),
        dir.path().to_path_buf(),
        ModelParams::default(),
    );
    let outputs = processor
        .estimate_ml(Some(&genotype_file), DEFAULT_MAX_GENOTYPES)
        .unwrap();

    let rows = read_rows(&outputs.table);
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "TTTT");
    assert_eq!(&rows[1][0], WILDTYPE);
}

#[test]
fn test_estimate_ml_rejects_mangled_genotype_file() {
    let dir = TempDir::new().unwrap();
    let input = create_test_file(dir.path(), "library.csv", &additive_library());
    let genotype_file = dir.path().join("wanted.txt");
    std::fs::write(&genotype_file, "TTAA ATAT\n").unwrap();

    let processor = GpseerProcessor::new(
        input,
        None,
        dir.path().to_path_buf(),
        ModelParams::default(),
    );
    let err = processor
        .estimate_ml(Some(&genotype_file), DEFAULT_MAX_GENOTYPES)
        .unwrap_err();
    assert!(format!("{:#}", err).contains("More than one genotype"));
}

#[test]
fn test_goodness_of_fit_on_additive_map() {
    let dir = TempDir::new().unwrap();
    let input = create_test_file(dir.path(), "library.csv", &additive_library());

    let processor = GpseerProcessor::new(
        input,
        None,
        dir.path().to_path_buf(),
        ModelParams::default(),
    );
    let params = GoodnessOfFitParams {
        n_samples: 5,
        train_fraction: 0.75,
        seed: 7,
    };
    let outputs = processor.goodness_of_fit(&params).unwrap();

    let rows = read_rows(&outputs.table);
    assert_eq!(rows.len(), 5);
    for row in &rows {
        assert_eq!(&row[1], "12");
        assert_eq!(&row[2], "4");
        let r2: f64 = row[3].parse().unwrap();
        assert!(r2 > 0.999, "held-out r2 {}", r2);
    }

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&outputs.summary).unwrap()).unwrap();
    assert_eq!(summary["goodness_of_fit"]["params"]["n_samples"], 5);
    assert!(summary["goodness_of_fit"]["r2_mean"].as_f64().unwrap() > 0.999);
}

#[test]
fn test_goodness_of_fit_is_reproducible() {
    let dir = TempDir::new().unwrap();
    let library: Vec<(String, f64)> = additive_library()
        .into_iter()
        .enumerate()
        .map(|(i, (g, p))| (g, p + if i % 2 == 0 { 0.03 } else { -0.03 }))
        .collect();
    let input = create_test_file(dir.path(), "noisy.csv", &library);
    let params = GoodnessOfFitParams::default();

    let run = |out: &str| {
        let processor = GpseerProcessor::new(
            input.clone(),
            None,
            dir.path().join(out),
            ModelParams::default(),
        );
        let outputs = processor.goodness_of_fit(&params).unwrap();
        std::fs::read_to_string(outputs.table).unwrap()
    };

    assert_eq!(run("first"), run("second"));
}
