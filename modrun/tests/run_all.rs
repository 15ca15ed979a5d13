//! Orchestration tests against fixture trees and a scripted toolchain.
//!
//! These drive `run_all` through whole repositories to verify discovery
//! order, exclusion pruning and the continue-past-failure contract.

use modrun::core::exclusion::DiscoveryRules;
use modrun::core::options::TestOptions;
use modrun::core::target::Target;
use modrun::error::ModuleError;
use modrun::orchestrate::{RunConfig, resolve_test_options, run_all};
use modrun::test_support::{FixtureTree, RecordingReporter, ScriptedToolchain, ToolchainCall};

fn run_config(options: TestOptions) -> RunConfig {
    RunConfig {
        rules: DiscoveryRules::default(),
        options,
    }
}

/// Repository layout:
/// ```text
/// root/            go.mod
/// ├── .github/     go.mod   (hidden, pruned)
/// ├── _tools/      go.mod   (underscore, pruned)
/// ├── cmd/
/// │   └── cli/     go.mod
/// ├── engine/      go.mod
/// │   ├── testdata/go.mod   (pruned)
/// │   └── zeta/    go.mod   (nested module)
/// └── vendor/x/    go.mod   (pruned)
/// ```
#[test]
fn repository_walk_tests_every_reachable_module_in_order() {
    let tree = FixtureTree::new();
    tree.module("");
    tree.module(".github");
    tree.module("_tools");
    tree.module("cmd/cli");
    tree.module("engine");
    tree.module("engine/testdata");
    tree.module("engine/zeta");
    tree.module("vendor/x");

    let toolchain = ScriptedToolchain::new();
    let reporter = RecordingReporter::default();
    let report = run_all(
        tree.path(),
        &run_config(TestOptions::default()),
        &toolchain,
        &reporter,
    )
    .expect("run");

    let modules: Vec<_> = report.outcomes.iter().map(|o| o.module.clone()).collect();
    assert_eq!(
        modules,
        vec![
            tree.abs("cmd/cli"),
            tree.abs("engine"),
            tree.abs("engine/zeta"),
            tree.abs(""),
        ]
    );
    assert!(!report.failed());
    assert!(reporter.groups_balanced());
}

#[test]
fn failed_fetch_in_a_does_not_block_b() {
    let tree = FixtureTree::new();
    tree.module("a");
    tree.module("b");

    let toolchain = ScriptedToolchain::new().failing_download(tree.abs("a"));
    let reporter = RecordingReporter::default();
    let report = run_all(
        tree.path(),
        &run_config(TestOptions::default()),
        &toolchain,
        &reporter,
    )
    .expect("run");

    assert!(report.failed());
    match &report.outcomes[0].error {
        Some(ModuleError::DependencyFetch { module, cause }) => {
            assert_eq!(module, &tree.abs("a"));
            assert!(cause.contains("exit status 1"), "{cause}");
        }
        other => panic!("expected dependency fetch failure, got {other:?}"),
    }
    assert!(report.outcomes[1].is_success());
    assert_eq!(
        toolchain.calls(),
        vec![
            ToolchainCall::PrintEnv,
            ToolchainCall::Download(tree.abs("a")),
            ToolchainCall::Download(tree.abs("b")),
            ToolchainCall::Test(tree.abs("b")),
        ]
    );
    let failures = reporter.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with(&format!("download {}", tree.abs("a").display())));
}

#[test]
fn every_module_failing_still_attempts_all() {
    let tree = FixtureTree::new();
    tree.module("a");
    tree.module("b");

    let toolchain = ScriptedToolchain::new()
        .failing_tests(tree.abs("a"))
        .failing_tests(tree.abs("b"));
    let reporter = RecordingReporter::default();
    let report = run_all(
        tree.path(),
        &run_config(TestOptions::default()),
        &toolchain,
        &reporter,
    )
    .expect("run");

    assert_eq!(report.failures().count(), 2);
    assert_eq!(reporter.failures().len(), 2);
}

#[test]
fn no_manifests_anywhere_is_an_empty_passing_report() {
    let tree = FixtureTree::new();
    tree.file("src/main.go");
    tree.file("vendor/go.mod");

    let toolchain = ScriptedToolchain::new();
    let reporter = RecordingReporter::default();
    let report = run_all(
        tree.path(),
        &run_config(TestOptions::default()),
        &toolchain,
        &reporter,
    )
    .expect("run");

    assert!(report.outcomes.is_empty());
    assert!(!report.failed());
}

#[test]
fn resolved_race_flag_reaches_every_test_run() {
    let tree = FixtureTree::new();
    tree.module("a");
    tree.module("b");

    let options = resolve_test_options(
        TestOptions::default(),
        &Target::new("windows", "amd64"),
        true,
        false,
    );
    let toolchain = ScriptedToolchain::new();
    let reporter = RecordingReporter::default();
    run_all(tree.path(), &run_config(options), &toolchain, &reporter).expect("run");

    let seen = toolchain.test_options();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|options| options.race_detection));
    assert!(seen.iter().all(|options| options.test_args().contains(&"-race".to_string())));
}
