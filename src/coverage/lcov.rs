//! Spectra from externally produced LCOV reports.
//!
//! When a target runs under another coverage tool, each test's report can
//! be turned into a [`TestOutcome`] here. Only the section whose source path
//! matches the target's [`ModuleId`] contributes lines.

use crate::core::{Error, ModuleId, Result, TestOutcome};
use lcov::{Reader, Record};
use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::Path;

/// Lines with a positive hit count for `module` in the report at `path`.
/// Only the first section matching `module` counts.
pub fn executed_lines_from_lcov(path: &Path, module: &ModuleId) -> Result<BTreeSet<usize>> {
    let reader = Reader::open_file(path).map_err(|e| Error::file_system(path, e))?;
    collect_lines(reader, module)
        .map_err(|e| e.with_context(format!("LCOV report {}", path.display())))
}

/// Same as [`executed_lines_from_lcov`] for an in-memory report.
pub fn executed_lines_from_reader<B: BufRead>(input: B, module: &ModuleId) -> Result<BTreeSet<usize>> {
    collect_lines(Reader::new(input), module)
}

/// Build one test's outcome from its LCOV report.
pub fn outcome_from_lcov(
    test_id: impl Into<String>,
    path: &Path,
    module: &ModuleId,
    passed: bool,
    failure_detail: Option<String>,
) -> Result<TestOutcome> {
    let executed_lines = executed_lines_from_lcov(path, module)?;
    Ok(TestOutcome {
        test_id: test_id.into(),
        executed_lines,
        passed,
        failure_detail: if passed { None } else { failure_detail },
    })
}

fn collect_lines<B: BufRead>(reader: Reader<B>, module: &ModuleId) -> Result<BTreeSet<usize>> {
    let mut lines = BTreeSet::new();
    let mut in_module = false;
    let mut matched = false;

    for record in reader {
        let record = record.map_err(|e| Error::Coverage(format!("failed to parse record: {e}")))?;
        match record {
            Record::SourceFile { path } => {
                let matches = module_matches(&path, module);
                in_module = matches && !matched;
                if matches && matched {
                    tracing::debug!(
                        module = %module,
                        path = %path.display(),
                        "Skipping further LCOV section for already matched module"
                    );
                }
                matched |= in_module;
            }
            Record::LineData { line, count, .. } if in_module && count > 0 => {
                if let Ok(line) = usize::try_from(line) {
                    if line > 0 {
                        lines.insert(line);
                    }
                }
            }
            Record::EndOfRecord => in_module = false,
            _ => {}
        }
    }

    if !matched {
        tracing::debug!(module = %module, "No LCOV section for module; treating as uncovered");
    }
    Ok(lines)
}

/// True when the trailing components of `path` spell the dotted module
/// name: `pkg/subject.py` matches `pkg.subject` and `subject`. Separators
/// of either platform are accepted.
pub fn module_matches(path: &Path, module: &ModuleId) -> bool {
    let text = path.to_string_lossy().replace('\\', "/");
    let mut segments: Vec<&str> = text.split('/').filter(|s| !s.is_empty()).collect();
    let Some(file) = segments.pop() else {
        return false;
    };
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);

    let wanted: Vec<&str> = module.components().collect();
    let Some((last, parents)) = wanted.split_last() else {
        return false;
    };
    if stem != *last || parents.len() > segments.len() {
        return false;
    }
    segments[segments.len() - parents.len()..] == *parents
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const REPORT: &str = indoc! {"
        TN:
        SF:/work/src/helpers.py
        DA:1,1
        DA:2,4
        end_of_record
        SF:/work/src/pkg/subject.py
        DA:1,1
        DA:2,0
        DA:3,7
        LF:3
        LH:2
        end_of_record
    "};

    #[test]
    fn test_collects_positive_counts_for_matching_section() {
        let lines = executed_lines_from_reader(REPORT.as_bytes(), &ModuleId::new("pkg.subject")).unwrap();
        assert_eq!(lines, BTreeSet::from([1, 3]));
    }

    #[test]
    fn test_missing_section_is_uncovered() {
        let lines = executed_lines_from_reader(REPORT.as_bytes(), &ModuleId::new("other")).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_first_matching_section_wins() {
        let report = indoc! {"
            SF:/work/a/subject.py
            DA:1,1
            DA:2,1
            end_of_record
            SF:/work/b/subject.py
            DA:7,3
            end_of_record
        "};
        let lines = executed_lines_from_reader(report.as_bytes(), &ModuleId::new("subject")).unwrap();
        assert_eq!(lines, BTreeSet::from([1, 2]));

        let lines = executed_lines_from_reader(report.as_bytes(), &ModuleId::new("b.subject")).unwrap();
        assert_eq!(lines, BTreeSet::from([7]));
    }

    #[test]
    fn test_module_matching() {
        let module = ModuleId::new("pkg.subject");
        assert!(module_matches(Path::new("/a/pkg/subject.py"), &module));
        assert!(module_matches(Path::new("C:\\a\\pkg\\subject.py"), &module));
        assert!(!module_matches(Path::new("/a/other/subject.py"), &module));
        assert!(!module_matches(Path::new("subject.py"), &module));
        assert!(module_matches(Path::new("/a/b/subject.py"), &ModuleId::new("subject")));
        assert!(!module_matches(Path::new("/a/b/subject_tests.py"), &ModuleId::new("subject")));
    }

    #[test]
    fn test_outcome_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(REPORT.as_bytes()).unwrap();

        let outcome = outcome_from_lcov(
            "test_ratio",
            file.path(),
            &ModuleId::new("subject"),
            false,
            Some("AssertionError".to_string()),
        )
        .unwrap();
        assert_eq!(outcome.executed_lines, BTreeSet::from([1, 3]));
        assert!(!outcome.passed);
        assert_eq!(outcome.failure_detail.as_deref(), Some("AssertionError"));
    }

    #[test]
    fn test_malformed_report_is_an_error() {
        let err = executed_lines_from_reader("DA:not-a-number\n".as_bytes(), &ModuleId::new("subject"))
            .unwrap_err();
        assert!(matches!(err, Error::Coverage(_)));
    }

    #[test]
    fn test_missing_report_is_an_error() {
        let err = executed_lines_from_lcov(Path::new("/no/such/report.info"), &ModuleId::new("subject"))
            .unwrap_err();
        assert!(err.is_harness_error());
    }
}
