//! # Workflow Document Tests
//!
//! End-to-end decode/encode coverage for workflow documents:
//! - whole-document parsing with job order preserved
//! - shorthand normalization (permissions, concurrency, environment, needs)
//! - annotation recovery on `uses:` steps
//! - parse failure surfacing as a single wrapped error

use gha_models::{parse_workflow, Needs, Permissions};
use pretty_assertions::assert_eq;

const CI_WORKFLOW: &str = r#"
name: CI
run-name: CI for ${{ github.ref }}
permissions:
  contents: read
  id-token: write
concurrency:
  group: ci-${{ github.ref }}
  cancel-in-progress: true
env:
  CARGO_TERM_COLOR: always
jobs:
  lint:
    steps:
      - uses: actions/checkout@8f4b7f84864484a7bf31766abe9204da3cbe65b3 # v4.2.0
      - run: make lint
  test:
    needs: lint
    timeout-minutes: 30
    environment:
      name: staging
      url: https://staging.example.com
    services:
      redis:
        image: redis:7
        ports:
          - 6379
    steps:
      - uses: actions/checkout@8f4b7f84864484a7bf31766abe9204da3cbe65b3 # v4.2.0
      - name: Test
        run: make test
        env:
          RUST_BACKTRACE: 1
  release:
    needs: [lint, test]
    if: github.ref == 'refs/heads/main'
    uses: octo/workflows/.github/workflows/release.yaml@main
    with:
      dry-run: false
    secrets:
      token: ${{ secrets.RELEASE_TOKEN }}
"#;

// ============================================================================
// DECODING
// ============================================================================

#[test]
fn test_parse_full_workflow() {
    let workflow = parse_workflow(CI_WORKFLOW.as_bytes()).unwrap();

    assert_eq!(workflow.name, "CI");
    assert_eq!(workflow.run_name, "CI for ${{ github.ref }}");
    assert_eq!(workflow.env["CARGO_TERM_COLOR"], "always");
    assert_eq!(workflow.jobs.len(), 3);

    let order: Vec<&String> = workflow.jobs.keys().collect();
    assert_eq!(order, ["lint", "test", "release"]);
}

#[test]
fn test_parse_normalizes_permissions_mapping() {
    let workflow = parse_workflow(CI_WORKFLOW.as_bytes()).unwrap();

    let mut want = Permissions::all("none");
    want.contents = "read".to_string();
    want.id_token = "write".to_string();
    assert_eq!(workflow.permissions, want);
}

#[test]
fn test_parse_normalizes_shorthands() {
    let workflow = parse_workflow(CI_WORKFLOW.as_bytes()).unwrap();

    assert_eq!(workflow.concurrency.group, "ci-${{ github.ref }}");
    assert_eq!(workflow.concurrency.cancel_in_progress, "true");

    let test = &workflow.jobs["test"];
    assert_eq!(test.needs, Needs(vec!["lint".to_string()]));
    assert_eq!(test.environment.name, "staging");
    assert_eq!(test.environment.url, "https://staging.example.com");
    assert_eq!(test.services["redis"].ports.0, ["6379"]);

    let release = &workflow.jobs["release"];
    assert_eq!(release.needs.0, ["lint", "test"]);
    assert_eq!(release.r#if, "github.ref == 'refs/heads/main'");
    assert_eq!(release.with["dry-run"], "false");
    assert_eq!(release.secrets["token"], "${{ secrets.RELEASE_TOKEN }}");
}

#[test]
fn test_parse_recovers_annotations_per_occurrence() {
    let workflow = parse_workflow(CI_WORKFLOW.as_bytes()).unwrap();

    let lint_checkout = &workflow.jobs["lint"].steps[0].uses;
    assert_eq!(lint_checkout.name, "actions/checkout");
    assert_eq!(lint_checkout.r#ref, "8f4b7f84864484a7bf31766abe9204da3cbe65b3");
    assert_eq!(lint_checkout.annotation, "v4.2.0");

    let test_checkout = &workflow.jobs["test"].steps[0].uses;
    assert_eq!(test_checkout.annotation, "v4.2.0");
}

#[test]
fn test_parse_ignores_unknown_fields() {
    let workflow = parse_workflow(
        b"on:\n  push:\n    branches: [main]\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: make\n",
    )
    .unwrap();
    assert_eq!(workflow.jobs["build"].steps[0].run, "make");
}

// ============================================================================
// ERROR SURFACING
// ============================================================================

#[test]
fn test_parse_rejects_non_mapping_jobs() {
    let err = parse_workflow(b"jobs: 3.14").unwrap_err();
    assert!(err.to_string().starts_with("could not parse workflow:"));
}

#[test]
fn test_field_error_aborts_whole_parse() {
    let cases: &[&str] = &[
        "permissions: all\njobs: {}\n",
        "permissions:\n  issues: [3]\njobs: {}\n",
        "jobs:\n  a:\n    concurrency:\n      group: [x]\n",
        "jobs:\n  a:\n    needs:\n      - 3\n",
        "jobs:\n  a:\n    steps:\n      - uses: invalid@\n",
        "jobs:\n  a:\n    strategy:\n      matrix: 42\n",
        "jobs:\n  a:\n    services:\n      db:\n        ports: 80\n",
    ];

    for case in cases {
        let err = parse_workflow(case.as_bytes()).unwrap_err();
        assert!(
            err.to_string().starts_with("could not parse workflow:"),
            "case {case:?} produced {err}"
        );
    }
}

#[test]
fn test_parse_rejects_invalid_yaml_syntax() {
    let err = parse_workflow(b"jobs:\n  a: [unclosed\n").unwrap_err();
    assert!(err.to_string().starts_with("could not parse workflow:"));
}
