//! Black-box tests for the `adaptive-plan` binary: exercises the CLI
//! surface the way a caller would, through `assert_cmd`, rather than
//! calling library functions directly.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

const SAMPLE_FIXTURE: &str = r#"<AdaptiveFixture>
<AdaptiveIntent intentId="urn:intent:hero-001" compositionRef="urn:comp:hero" contextProfileRef="urn:ctx:hero" objectiveProfileRef="urn:obj:hero" optimizationProfileRef="urn:opt:hero" policySetRef="urn:policyset:hero" targetFoundry="$paperhat"/>
<AdaptiveContextProfile profileId="urn:ctx:hero" viewportWidthPx="1600" viewportHeightPx="900" deviceClass="$desktop" motionPreference="$reduce"/>
<AdaptiveObjectiveProfile profileId="urn:obj:hero" primaryObjective="$readability" readabilityPriority="$must"/>
<AdaptiveOptimizationProfile profileId="urn:opt:hero"/>
</AdaptiveFixture>
"#;

#[test]
fn compile_emits_a_compiled_request_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let fixture_path = dir.path().join("fixture.cdx");
    let output_path = dir.path().join("compiled.cdx");
    fs::write(&fixture_path, SAMPLE_FIXTURE).unwrap();

    Command::cargo_bin("adaptive-plan")
        .unwrap()
        .arg("compile")
        .arg(&fixture_path)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    let output = fs::read_to_string(&output_path).unwrap();
    assert!(output.starts_with("<CompiledAdaptiveRequest"));
    assert!(output.contains("value=\"1.777778\""));
    assert!(output.ends_with('\n'));
}

#[test]
fn compile_rejects_an_unreadable_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.cdx");
    let output_path = dir.path().join("compiled.cdx");

    Command::cargo_bin("adaptive-plan")
        .unwrap()
        .arg("compile")
        .arg(&missing)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn run_policy_vectors_reports_failure_on_an_empty_directory() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("adaptive-plan")
        .unwrap()
        .arg("run-policy-vectors")
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No policy vector files found"));
}
