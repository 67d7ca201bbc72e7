//! Scoring scenarios driven through the public pipeline

use faultmap::{
    build_spectra, compute_suspiciousness, ensure_eq, DegenerateInput, EnsembleStrategy, Metric,
    SourceUnit, Spectra, SuspiciousnessEngine, TestOutcome, TestSuite,
};
use indoc::indoc;
use pretty_assertions::assert_eq;

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}

#[test]
fn test_shared_line_between_failing_and_passing_test() {
    let target = SourceUnit::inline("shared", "def half(x):\n    return x // 2\n");
    let mut suite = TestSuite::new();
    suite
        .register_fn("even", |ns| ensure_eq(&ns.call("half", vec![4.into()])?, 2))
        .register_fn("odd", |ns| ensure_eq(&ns.call("half", vec![5.into()])?, 2.5));

    let spectra = build_spectra(&target, &suite).unwrap();
    let table = compute_suspiciousness(&spectra, target.line_count());

    assert_eq!((table.nf, table.ns), (1, 1));
    let line = table.get(2).unwrap();
    assert_eq!((line.ncf, line.ncs), (1, 1));
    assert!(close(line.tarantula, 0.5));
    assert!(close(line.ochiai, 0.5f64.sqrt()));
    assert!(close(line.dstar, 1.0));
    assert!(close(line.ensemble, (0.5 + 0.5f64.sqrt() + 1.0) / 3.0));
    assert_eq!(table.degeneracy(), None);
}

#[test]
fn test_all_passing_suite_has_no_signal() {
    let target = SourceUnit::inline("ok", "def two():\n    return 2\n");
    let mut suite = TestSuite::new();
    suite
        .register_fn("a", |ns| ensure_eq(&ns.call("two", Vec::new())?, 2))
        .register_fn("b", |ns| ensure_eq(&ns.call("two", Vec::new())?, 2));

    let spectra = build_spectra(&target, &suite).unwrap();
    let table = compute_suspiciousness(&spectra, target.line_count());

    assert_eq!(table.degeneracy(), Some(DegenerateInput::NoFailingTests));
    let line = table.get(2).unwrap();
    assert_eq!((line.ncf, line.ncs), (0, 2));
    assert_eq!(line.tarantula, 0.0);
    assert_eq!(line.ochiai, 0.0);
    assert_eq!(line.dstar, 0.0);
    assert!(table.top(Metric::Ensemble, 5).is_empty());
}

#[test]
fn test_line_covered_only_by_the_failing_test() {
    let target = SourceUnit::inline(
        "sign",
        indoc! {"
            def sign(x):
                if x < 0:
                    return 1
                if x == 0:
                    return 0
                return 1
        "},
    );
    let mut suite = TestSuite::new();
    suite
        .register_fn("negative", |ns| ensure_eq(&ns.call("sign", vec![(-4).into()])?, -1))
        .register_fn("zero", |ns| ensure_eq(&ns.call("sign", vec![0.into()])?, 0))
        .register_fn("positive", |ns| ensure_eq(&ns.call("sign", vec![9.into()])?, 1))
        .register_fn("large", |ns| ensure_eq(&ns.call("sign", vec![1000.into()])?, 1));

    let spectra = build_spectra(&target, &suite).unwrap();
    assert_eq!(spectra.failing_count(), 1);
    let table = compute_suspiciousness(&spectra, target.line_count());

    let bug = table.get(3).unwrap();
    assert_eq!((bug.ncf, bug.ncs), (1, 0));
    assert_eq!(bug.tarantula, 1.0);
    assert_eq!(bug.ochiai, 1.0);
    assert_eq!(table.ranked(Metric::Ochiai)[0].0, 3);

    // Line 2 runs in every test; line 1 is only the definition.
    assert_eq!(table.get(2).map(|s| (s.ncf, s.ncs)), Some((1, 3)));
    assert_eq!(table.get(1).map(|s| (s.ncf, s.ncs)), Some((0, 0)));
}

#[test]
fn test_empty_spectra_scores_every_line_zero() {
    let table = compute_suspiciousness(&Spectra::new(), 6);

    assert_eq!(table.len(), 6);
    assert_eq!(table.degeneracy(), Some(DegenerateInput::NoTests));
    for (line, score) in table.iter() {
        assert_eq!(score.ensemble, 0.0, "line {line}");
        assert_eq!(score.dstar, 0.0, "line {line}");
    }
}

#[test]
fn test_max_scaled_ensemble_is_bounded() {
    let spectra: Spectra = vec![
        TestOutcome::failing("f1", [1, 2], "AssertionError"),
        TestOutcome::failing("f2", [1, 2], "AssertionError"),
        TestOutcome::failing("f3", [1], "AssertionError"),
        TestOutcome::passing("p1", [2, 3]),
    ]
    .into();

    let mean = SuspiciousnessEngine::new(EnsembleStrategy::Mean).compute(&spectra, 3);
    let scaled = SuspiciousnessEngine::new(EnsembleStrategy::MaxScaledDStar).compute(&spectra, 3);

    // ncf=3, ncs=0 on line 1 gives an empty DStar denominator.
    assert_eq!(mean.get(1).unwrap().dstar, 0.0);
    // Line 2: ncf=2, ncs=1, nf=3 -> 4 / 2
    assert!(close(mean.get(2).unwrap().dstar, 2.0));
    assert!(mean.get(2).unwrap().ensemble > 1.0);

    for (line, score) in scaled.iter() {
        assert!((0.0..=1.0).contains(&score.ensemble), "line {line}: {}", score.ensemble);
        assert_eq!(score.dstar, mean.get(line).unwrap().dstar);
    }
    let line2 = scaled.get(2).unwrap();
    assert!(close(line2.ensemble, (line2.tarantula + line2.ochiai + 1.0) / 3.0));
}
