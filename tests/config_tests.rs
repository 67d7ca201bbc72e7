use faultmap::config::{load_config_from_dir, load_config_from_path, CONFIG_FILE_NAME};
use faultmap::{
    localize, EnsembleStrategy, Error, FaultmapConfig, SourceUnit, SpectraBuilder, TestSuite,
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_found_in_ancestor_directory() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join(CONFIG_FILE_NAME),
        indoc! {r#"
            [execution]
            timeout_ms = 250
            max_call_depth = 40

            [scoring]
            ensemble = "max-scaled-dstar"
        "#},
    )
    .unwrap();
    let nested = root.path().join("src").join("pkg");
    fs::create_dir_all(&nested).unwrap();

    let config = load_config_from_dir(&nested);
    assert_eq!(config.execution.timeout_ms, 250);
    assert_eq!(config.execution.max_call_depth, 40);
    assert_eq!(config.scoring.ensemble, EnsembleStrategy::MaxScaledDStar);
    assert_eq!(config.limits().timeout, Some(Duration::from_millis(250)));
}

#[test]
fn test_nearest_config_wins() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join(CONFIG_FILE_NAME), "[execution]\ntimeout_ms = 100\n").unwrap();
    let inner = root.path().join("inner");
    fs::create_dir(&inner).unwrap();
    fs::write(inner.join(CONFIG_FILE_NAME), "[execution]\ntimeout_ms = 900\n").unwrap();

    assert_eq!(load_config_from_dir(&inner).execution.timeout_ms, 900);
    assert_eq!(load_config_from_dir(root.path()).execution.timeout_ms, 100);
}

#[test]
fn test_invalid_config_during_search_falls_back_to_defaults() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join(CONFIG_FILE_NAME), "[execution]\nmax_call_depth = 0\n").unwrap();

    assert_eq!(load_config_from_dir(root.path()), FaultmapConfig::default());
}

#[test]
fn test_explicit_path_reports_every_failure() {
    let root = TempDir::new().unwrap();

    let missing = load_config_from_path(&root.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, Error::FileSystem { .. }), "{missing:?}");

    let unknown = root.path().join("unknown.toml");
    fs::write(&unknown, "[execution]\nretries = 3\n").unwrap();
    assert!(matches!(load_config_from_path(&unknown), Err(Error::Configuration(_))));

    let bad_timeout = root.path().join("timeout.toml");
    fs::write(&bad_timeout, "[execution]\ntimeout_ms = 0\n").unwrap();
    let err = load_config_from_path(&bad_timeout).unwrap_err();
    assert!(err.to_string().contains("timeout_ms"), "{err}");
}

#[test]
fn test_configured_limits_reach_the_runner() {
    let root = TempDir::new().unwrap();
    let path = root.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "[execution]\ntimeout_ms = 50\n").unwrap();
    let config = load_config_from_path(&path).unwrap();

    let target = SourceUnit::inline(
        "spin",
        indoc! {"
            def spin():
                while True:
                    pass
        "},
    );
    let mut suite = TestSuite::new();
    suite.register_fn("spins", |ns| ns.call("spin", Vec::new()).map(|_| ()));

    let spectra = SpectraBuilder::from_config(&config).build(&target, &suite).unwrap();
    let outcome = &spectra.outcomes()[0];
    assert!(!outcome.passed);
    assert_eq!(outcome.executed_lines, BTreeSet::from([2, 3]));
    assert!(outcome.failure_detail.as_deref().unwrap().contains("50 ms"));

    let table = localize(&target, &suite, &config).unwrap();
    assert_eq!((table.nf, table.ns), (1, 0));
}
