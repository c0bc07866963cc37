//! End-to-end tests for the netpharm binary
//!
//! These tests validate:
//! - `init` template creation and overwrite protection
//! - A full `run` against mocked PubChem, Reactome, STRING and g:Profiler
//! - `status` on finished and missing run directories
//! - The standalone `dock` gate
//! - `structures` downloads against mocked UniProt and AlphaFold DB
//! - Error reporting and exit codes

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use netpharm_ingest::endpoints::PUBCHEM_PROPERTIES;
use predicates::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const SWISS_EXPORT: &str = "Target,Common name,Uniprot ID,Probability*\n\
Epidermal growth factor receptor,EGFR,P00533,0.95\n\
RAC-alpha serine/threonine-protein kinase,AKT1,P31749,0.60\n\
Cellular tumor antigen p53,TP53,P04637,0.42\n";

fn netpharm() -> Command {
    let mut cmd = Command::cargo_bin("netpharm").unwrap();
    cmd.env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env_remove("LOG_LEVEL")
        .env_remove("LOG_OUTPUT");
    cmd
}

fn participant(gene: &str, uniprot: &str) -> serde_json::Value {
    json!({
        "displayName": format!("{} [cytosol]", gene),
        "refEntities": [{
            "stId": format!("uniprot:{}", uniprot),
            "identifier": uniprot,
            "databaseName": "UniProt",
            "schemaClass": "ReferenceGeneProduct",
            "displayName": format!("UniProt:{} {}", uniprot, gene),
            "geneName": [gene]
        }]
    })
}

/// Mount every endpoint a run touches on one mock server
async fn mock_services() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/compound/cid/5280343/property/{}/JSON",
            PUBCHEM_PROPERTIES
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "PropertyTable": {"Properties": [{
                "CID": 5280343,
                "MolecularFormula": "C15H10O7",
                "MolecularWeight": "302.23",
                "CanonicalSMILES": "C1=CC(=C(C=C1C2=C(C(=O)C3=C(C=C(C=C3O2)O)O)O)O)O"
            }]}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/query"))
        .and(query_param("query", "apoptosis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "typeName": "Pathway",
                "entries": [
                    {"stId": "R-HSA-109581", "name": "Apoptosis", "exactType": "Pathway"}
                ]
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/participants/R-HSA-109581"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            participant("AKT1", "P31749"),
            participant("TP53", "P04637"),
            participant("EGFR", "P00533"),
            participant("CASP3", "P42574")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/tsv/network"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "stringId_A\tstringId_B\tpreferredName_A\tpreferredName_B\tncbiTaxonId\tscore\n\
9606.ENSP00000275493\t9606.ENSP00000344818\tEGFR\tAKT1\t9606\t0.999\n\
9606.ENSP00000344818\t9606.ENSP00000269305\tAKT1\tTP53\t9606\t0.950\n",
        ))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/gost/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{
                "source": "KEGG", "native": "KEGG:04151", "name": "PI3K-Akt signaling pathway",
                "p_value": 1.2e-4, "significant": true, "intersection_size": 2,
                "precision": 0.6667, "intersections": [["IEA"], ["TAS"], []]
            }]
        })))
        .mount(&server)
        .await;

    server
}

fn write_config(dir: &Path, server: &MockServer) -> PathBuf {
    let swiss = dir.join("swiss.csv");
    std::fs::write(&swiss, SWISS_EXPORT).unwrap();

    let config = dir.join("netpharm.yml");
    std::fs::write(
        &config,
        format!(
            "compound:\n  cid: 5280343\n  name: quercetin\n\
             targets:\n  swiss:\n    file: {swiss}\n    threshold: 0.0\n\
             pathways:\n  search_terms: [apoptosis]\n\
             services:\n  pubchem_url: {uri}\n  reactome_url: {uri}\n  string_url: {uri}\n  gprofiler_url: {uri}\n  \
             timeout_secs: 5\n  max_attempts: 1\n",
            swiss = swiss.display(),
            uri = server.uri()
        ),
    )
    .unwrap();
    config
}

fn only_run_dir(output: &Path) -> PathBuf {
    let entries: Vec<PathBuf> = std::fs::read_dir(output)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1, "expected one run directory: {:?}", entries);
    entries.into_iter().next().unwrap()
}

// ============================================================================
// init
// ============================================================================

#[test]
fn test_init_writes_template() {
    let dir = tempfile::tempdir().unwrap();

    netpharm()
        .arg("init")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("netpharm.yml"));

    let content = std::fs::read_to_string(dir.path().join("netpharm.yml")).unwrap();
    assert!(content.contains("search_terms"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("netpharm.yml"), "compound: {cid: 1}\n").unwrap();

    netpharm()
        .arg("init")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--force"));

    netpharm().arg("init").arg(dir.path()).arg("--force").assert().success();
}

// ============================================================================
// run / status
// ============================================================================

#[tokio::test]
async fn test_run_completes_against_mocked_services() {
    let server = mock_services().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &server);
    let output = dir.path().join("results");

    netpharm()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline complete"));

    let run_dir = only_run_dir(&output);
    assert!(run_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("compound_quercetin_"));
    assert!(run_dir.join("run_state.json").exists());
    assert!(run_dir.join("pipeline.log").exists());
    assert!(run_dir.join("netpharm.yml").exists());
    assert!(run_dir.join("step4_network").join("network_metrics.csv").exists());
    assert!(run_dir
        .join("step7_visualization")
        .join("network_interactive.html")
        .exists());

    netpharm()
        .arg("status")
        .arg(&run_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Visualized"))
        .stdout(predicate::str::contains("enrichment"));

    // a second invocation reuses everything from the run's config snapshot
    netpharm()
        .arg("run")
        .arg("--resume")
        .arg(&run_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline complete"));
}

#[tokio::test]
async fn test_resume_with_changed_config_reruns_targets() {
    let server = mock_services().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &server);
    let output = dir.path().join("results");

    netpharm()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();
    let run_dir = only_run_dir(&output);
    let combined = run_dir.join("step2_targets").join("targets_combined.csv");
    assert_eq!(std::fs::read_to_string(&combined).unwrap().lines().count(), 4);

    let stricter = std::fs::read_to_string(&config)
        .unwrap()
        .replace("threshold: 0.0", "threshold: 0.5");
    std::fs::write(&config, stricter).unwrap();

    netpharm()
        .arg("run")
        .arg("--resume")
        .arg(&run_dir)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline complete"));

    // TP53 (0.42) no longer clears the cutoff
    let targets = std::fs::read_to_string(&combined).unwrap();
    assert_eq!(targets.lines().count(), 3);
    assert!(!targets.contains("TP53"));
    let snapshot = std::fs::read_to_string(run_dir.join("netpharm.yml")).unwrap();
    assert!(snapshot.contains("0.5"));
}

#[tokio::test]
async fn test_run_pauses_without_target_exports() {
    let server = mock_services().await;
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("netpharm.yml");
    std::fs::write(
        &config,
        format!(
            "compound:\n  cid: 5280343\npathways:\n  search_terms: [apoptosis]\nservices:\n  pubchem_url: {}\n",
            server.uri()
        ),
    )
    .unwrap();
    let output = dir.path().join("results");

    netpharm()
        .arg("run")
        .arg("-c")
        .arg(&config)
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Paused at the targets stage"))
        .stdout(predicate::str::contains("swiss_results.csv"))
        .stdout(predicate::str::contains("--resume"));

    let run_dir = only_run_dir(&output);
    assert!(run_dir.join("data").join("INSTRUCTIONS_targets.md").exists());

    netpharm()
        .arg("status")
        .arg(&run_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("paused"));
}

#[test]
fn test_run_without_config_suggests_init() {
    let dir = tempfile::tempdir().unwrap();

    netpharm()
        .current_dir(dir.path())
        .arg("run")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("netpharm init"));
}

#[test]
fn test_status_of_missing_run_fails() {
    let dir = tempfile::tempdir().unwrap();

    netpharm()
        .arg("status")
        .arg(dir.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a netpharm run directory"));
}

// ============================================================================
// dock
// ============================================================================

#[test]
fn test_dock_gates_scores() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scores.tsv");
    std::fs::write(
        &input,
        "gene_name\tdocking_score\tstructure_id\nREF\t-100\tS1\nA\t-120\tS2\nB\t-80\tS3\n",
    )
    .unwrap();
    let out = dir.path().join("out");

    netpharm()
        .arg("dock")
        .arg("--input")
        .arg(&input)
        .arg("--reference")
        .arg("REF")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 of 2 targets"));

    let high = std::fs::read_to_string(out.join("high_affinity_targets.csv")).unwrap();
    assert!(high.contains("A,S2,-120"));
    assert!(!high.contains("B,"));
    assert!(out.join("docking_delta.svg").exists());
}

#[test]
fn test_dock_missing_reference_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scores.csv");
    std::fs::write(&input, "gene_name,docking_score,structure_id\nA,-120,S2\n").unwrap();

    netpharm()
        .arg("dock")
        .arg("-i")
        .arg(&input)
        .arg("-r")
        .arg("REF")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("REF"));
}

// ============================================================================
// structures
// ============================================================================

#[tokio::test]
async fn test_structures_downloads_models_and_logs_misses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/uniprotkb/search"))
        .and(query_param("query", "gene_exact:EGFR AND organism_id:9606 AND reviewed:true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"primaryAccession": "P00533"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/uniprotkb/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/AF-P00533-F1-model_v4.pdb"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "HEADER    EGFR MODEL\nATOM      1  N   MET A   1      -8.360  11.047  24.129  1.00 35.61           N\nEND\n",
        ))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("pdbs");

    netpharm()
        .env("NETPHARM_UNIPROT_URL", server.uri())
        .env("NETPHARM_ALPHAFOLD_URL", server.uri())
        .arg("structures")
        .arg("--genes")
        .arg("egfr,NOTAGENE")
        .arg("--output")
        .arg(&out)
        .arg("--delay-ms")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 of 2 models available"));

    let model = std::fs::read_to_string(out.join("AF-P00533-F1-model_v4.pdb")).unwrap();
    assert!(model.contains("ATOM"));
    let log = std::fs::read_to_string(out.join("fetch_log.csv")).unwrap();
    assert!(log.contains("EGFR,P00533,AF-P00533-F1-model_v4.pdb,downloaded"));
    assert!(log.contains("NOTAGENE,,,no_accession"));
}

#[test]
fn test_structures_without_genes_fails() {
    netpharm()
        .arg("structures")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--genes"));
}

#[test]
fn test_markdown_help() {
    netpharm()
        .arg("--markdown-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("netpharm run"));
}
