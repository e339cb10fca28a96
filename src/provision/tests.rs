//! Unit tests for strategy selection and both provisioning strategies.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::command::CommandLine;
use crate::platform::{OsRelease, PackageFamily};
use crate::test_support::{ScriptedRunner, seed_build_outputs};

struct Scratch {
    _dir: TempDir,
    layout: DeploymentLayout,
}

#[fixture]
fn scratch() -> Scratch {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
    let layout = DeploymentLayout::rooted_at(&root);
    Scratch { _dir: dir, layout }
}

fn config(release: Option<&str>, use_source_build: bool) -> ProvisioningConfig {
    ProvisioningConfig {
        release: release.map(str::to_owned),
        use_source_build,
        ..ProvisioningConfig::default()
    }
}

fn read(path: &Utf8Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}

#[rstest]
fn select_uses_package_install_when_release_is_pinned() {
    let strategy = ProvisionStrategy::select(&config(Some("5.0"), false));
    assert_eq!(
        strategy,
        ProvisionStrategy::PackageInstall(PackageInstall::new(
            DEFAULT_PACKAGE_NAME,
            Some(String::from("5.0"))
        ))
    );
}

#[rstest]
#[case(Some("5.0"), true)]
#[case(None, true)]
#[case(None, false)]
#[case(Some("   "), false)]
fn select_falls_back_to_source_build(
    #[case] release: Option<&str>,
    #[case] use_source_build: bool,
) {
    let strategy = ProvisionStrategy::select(&config(release, use_source_build));
    assert_eq!(strategy.kind(), StrategyKind::SourceBuild);
    assert_eq!(
        strategy,
        ProvisionStrategy::SourceBuild(SourceBuild::new(
            DEFAULT_SOURCE_REPO_URL,
            DEFAULT_SOURCE_BRANCH
        ))
    );
}

#[rstest]
fn release_trims_whitespace() {
    assert_eq!(config(Some(" 7.3.0 "), false).release(), Some("7.3.0"));
}

#[rstest]
#[case(PackageFamily::Debian, "apt-get update && apt-get install -y -q", "repose-valve=5.0")]
#[case(PackageFamily::RedHat, "yum makecache -q && yum install -y -q", "repose-valve-5.0")]
fn package_install_runs_install_then_start(
    scratch: Scratch,
    #[case] family: PackageFamily,
    #[case] install_prefix: &str,
    #[case] package_spec: &str,
) {
    let runner = ScriptedRunner::new();
    runner.push_successes(2);
    let strategy = PackageInstall::new("repose-valve", Some(String::from("5.0")));
    let host = ProvisionHost {
        runner: &runner,
        platform: &family,
        layout: &scratch.layout,
    };

    let report = strategy.provision(&host).expect("install should succeed");

    let commands = runner.invocations();
    assert_eq!(commands.len(), 2);
    let script = commands
        .first()
        .and_then(|command| command.args.get(1))
        .map(|arg| arg.to_string_lossy().into_owned())
        .expect("install script");
    assert!(script.starts_with(install_prefix), "script: {script}");
    assert!(script.contains(package_spec), "script: {script}");
    assert_eq!(
        commands.get(1),
        Some(&CommandLine::new("service").args(["repose-valve", "start"]))
    );
    assert_eq!(report.strategy, StrategyKind::PackageInstall);
    assert_eq!(report.steps.len(), 2);
}

#[rstest]
fn package_install_without_release_installs_latest() {
    let strategy = PackageInstall::new("repose-valve", Some(String::from("  ")));
    assert_eq!(strategy.release(), None);
    let command = strategy.install_command(PackageFamily::Debian);
    assert_eq!(
        command.display(),
        "sh -c apt-get update && apt-get install -y -q repose-valve"
    );
}

#[rstest]
fn package_install_rejects_unsupported_platform(scratch: Scratch) {
    let runner = ScriptedRunner::new();
    let platform = OsRelease::parse("NAME=\"Gentoo\"\nID=gentoo\n");
    let host = ProvisionHost {
        runner: &runner,
        platform: &platform,
        layout: &scratch.layout,
    };

    let err = PackageInstall::new("repose-valve", Some(String::from("5.0")))
        .provision(&host)
        .expect_err("gentoo is unsupported");

    assert!(
        matches!(err, ProvisionError::Platform(PlatformError::Unsupported { ref name }) if name == "Gentoo"),
        "unexpected error: {err}"
    );
    assert!(runner.invocations().is_empty(), "no command should run");
}

#[rstest]
fn package_install_stops_after_failed_install(scratch: Scratch) {
    let runner = ScriptedRunner::new();
    runner.push_failure(100);
    let host = ProvisionHost {
        runner: &runner,
        platform: &PackageFamily::Debian,
        layout: &scratch.layout,
    };

    let err = PackageInstall::new("repose-valve", None)
        .provision(&host)
        .expect_err("install failure should abort");

    assert!(
        matches!(err, ProvisionError::Command(CommandError::Failure { status: Some(100), .. })),
        "unexpected error: {err}"
    );
    assert_eq!(runner.invocations().len(), 1, "service start must not run");
}

#[rstest]
fn source_build_deploys_artifacts_and_launches(scratch: Scratch) {
    let layout = &scratch.layout;
    seed_build_outputs(layout).expect("seed build outputs");
    let runner = ScriptedRunner::new();
    runner.push_successes(4);
    let host = ProvisionHost {
        runner: &runner,
        platform: &PackageFamily::Debian,
        layout,
    };

    let report = SourceBuild::new("https://example.com/repose.git", "feature")
        .provision(&host)
        .expect("source build should succeed");

    assert_eq!(
        runner.invocations(),
        vec![
            CommandLine::new("git")
                .arg("init")
                .current_dir(&layout.checkout_dir),
            CommandLine::new("git")
                .args(["pull", "https://example.com/repose.git", "feature"])
                .current_dir(&layout.checkout_dir),
            CommandLine::new("mvn")
                .args(["-q", "-DskipTests", "clean", "install"])
                .current_dir(&layout.checkout_dir),
            SourceBuild::launch_command(layout),
        ]
    );
    assert_eq!(read(&layout.runtime_jar()), "valve-jar");
    assert_eq!(
        read(&layout.bundle_path(&EXTENSIONS_BUNDLE)),
        EXTENSIONS_BUNDLE.deployed_name
    );
    assert_eq!(
        read(&layout.bundle_path(&FILTER_BUNDLE)),
        FILTER_BUNDLE.deployed_name
    );
    assert_eq!(
        read(&layout.config_dir.join("system-model.cfg.xml")),
        "<system-model/>"
    );
    assert!(
        !layout.config_dir.join("examples").exists(),
        "only regular files are deployed"
    );
    assert_eq!(report.strategy, StrategyKind::SourceBuild);
    let expected_step = format!("deploy 2 files to {}", layout.config_dir);
    assert!(
        report.steps.contains(&expected_step),
        "steps: {:?}",
        report.steps
    );
}

#[rstest]
fn launch_command_runs_detached_from_lib_dir(scratch: Scratch) {
    let command = SourceBuild::launch_command(&scratch.layout);
    assert_eq!(command.cwd.as_ref(), Some(&scratch.layout.lib_dir));
    let rendered = command.display();
    assert!(
        rendered.contains("nohup java -jar repose-valve.jar -s 8123 -c "),
        "rendered: {rendered}"
    );
    assert!(rendered.ends_with("start >/dev/null 2>&1 &"), "rendered: {rendered}");
}

#[rstest]
fn source_build_aborts_on_failed_pull(scratch: Scratch) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_failure(128);
    let host = ProvisionHost {
        runner: &runner,
        platform: &PackageFamily::Debian,
        layout: &scratch.layout,
    };

    let err = SourceBuild::new(DEFAULT_SOURCE_REPO_URL, "missing-branch")
        .provision(&host)
        .expect_err("pull failure should abort");

    assert!(matches!(err, ProvisionError::Command(_)), "unexpected error: {err}");
    assert_eq!(runner.invocations().len(), 2, "build must not run");
    assert!(!scratch.layout.lib_dir.exists(), "deployment dirs untouched");
}

#[rstest]
fn source_build_reports_missing_runtime_jar(scratch: Scratch) {
    let runner = ScriptedRunner::new();
    runner.push_successes(3);
    let host = ProvisionHost {
        runner: &runner,
        platform: &PackageFamily::Debian,
        layout: &scratch.layout,
    };

    let err = SourceBuild::new(DEFAULT_SOURCE_REPO_URL, DEFAULT_SOURCE_BRANCH)
        .provision(&host)
        .expect_err("missing jar should abort");

    assert!(
        matches!(err, ProvisionError::MissingArtifact { ref path, .. } if path.as_str().ends_with(VALVE_JAR_SOURCE)),
        "unexpected error: {err}"
    );
    assert_eq!(runner.invocations().len(), 3, "launch must not run");
}

#[rstest]
fn source_build_reports_missing_bundle(scratch: Scratch) {
    let layout = &scratch.layout;
    seed_build_outputs(layout).expect("seed build outputs");
    let bundle_dir = layout.checkout_dir.join(FILTER_BUNDLE.source_dir);
    fs::remove_dir_all(&bundle_dir).expect("remove bundle dir");
    fs::create_dir_all(&bundle_dir).expect("recreate empty bundle dir");
    let runner = ScriptedRunner::new();
    runner.push_successes(3);
    let host = ProvisionHost {
        runner: &runner,
        platform: &PackageFamily::Debian,
        layout,
    };

    let err = SourceBuild::new(DEFAULT_SOURCE_REPO_URL, DEFAULT_SOURCE_BRANCH)
        .provision(&host)
        .expect_err("missing bundle should abort");

    assert!(
        matches!(err, ProvisionError::MissingArtifact { ref description, .. } if description == "filter-bundle-*-SNAPSHOT.ear"),
        "unexpected error: {err}"
    );
}

#[rstest]
#[case("filter-bundle-8.0.0-SNAPSHOT.ear", true)]
#[case("filter-bundle-8.0.0.ear", false)]
#[case("extensions-filter-bundle-8.0.0-SNAPSHOT.ear", false)]
#[case("filter-bundle--SNAPSHOT.ear", true)]
fn bundle_pattern_mirrors_glob(#[case] name: &str, #[case] expected: bool) {
    assert_eq!(FILTER_BUNDLE.matches(name), expected);
}

#[rstest]
fn default_layout_uses_fixed_locations() {
    let layout = DeploymentLayout::default();
    assert_eq!(layout.checkout_dir, DEFAULT_CHECKOUT_DIR);
    assert_eq!(layout.runtime_jar(), "/usr/share/lib/repose/repose-valve.jar");
    assert_eq!(
        layout.bundle_path(&EXTENSIONS_BUNDLE),
        "/usr/share/repose/filters/extensions-filter-bundle.ear"
    );
    assert_eq!(layout.config_dir, DEFAULT_CONFIG_DIR);
    assert_eq!(layout.control_port, DEFAULT_CONTROL_PORT);
}
