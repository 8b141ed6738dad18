//! Result artifacts
//!
//! Serializes a finished run into the two output files:
//! `MATILDA_<db>_results.json` (machine-readable, deterministic modulo the
//! `execution_time_seconds` field) and `report_MATILDA_<db>.md` (human
//! summary with confidence rendered to 4 decimal places). Rule entries
//! appear in sink rank order.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::discovery::DiscoveryOutcome;
use crate::error::Result;

/// One rule entry in the JSON artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEntry {
    /// Body atoms, rendered
    pub body: Vec<String>,
    /// Head atoms, rendered
    pub head: Vec<String>,
    /// Body witnesses satisfying the head
    pub support: u64,
    /// Witness fraction
    pub confidence: f64,
    /// Full logical form
    pub tgd_string: String,
}

/// Run metadata in the JSON artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Database display name
    pub database: String,
    /// Number of rules in the artifact
    pub total_rules: usize,
    /// Wall-clock duration of the run
    pub execution_time_seconds: f64,
    /// `success` or `partial`
    pub status: String,
}

/// The complete JSON artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsDocument {
    /// Discovered rules in rank order
    pub rules: Vec<RuleEntry>,
    /// Run metadata
    pub metadata: RunMetadata,
}

impl ResultsDocument {
    /// Build the document for a finished run
    pub fn from_outcome(outcome: &DiscoveryOutcome) -> ResultsDocument {
        let rules = outcome
            .rules
            .iter()
            .map(|accepted| RuleEntry {
                body: accepted.rule.body_strings(),
                head: accepted.rule.head_strings(),
                support: accepted.support,
                confidence: accepted.confidence,
                tgd_string: accepted.rule.tgd_string(),
            })
            .collect();
        ResultsDocument {
            rules,
            metadata: RunMetadata {
                database: outcome.database.clone(),
                total_rules: outcome.rules.len(),
                execution_time_seconds: outcome.elapsed.as_secs_f64(),
                status: outcome.status.as_str().to_string(),
            },
        }
    }
}

/// Render the Markdown summary
pub fn render_markdown(outcome: &DiscoveryOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# MATILDA discovery report — {}", outcome.database);
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Status**: {}", outcome.status.as_str());
    if let Some(trigger) = outcome.trigger {
        let _ = writeln!(out, "- **Cancelled by**: {}", trigger);
    }
    let _ = writeln!(out, "- **Rules discovered**: {}", outcome.rules.len());
    let _ = writeln!(
        out,
        "- **Candidates**: {} enumerated, {} validated",
        outcome.stats.enumerated, outcome.stats.validated
    );
    let _ = writeln!(
        out,
        "- **Execution time**: {:.2}s",
        outcome.elapsed.as_secs_f64()
    );
    let _ = writeln!(out);
    if outcome.rules.is_empty() {
        let _ = writeln!(out, "No rules met the support and confidence thresholds.");
    } else {
        let _ = writeln!(out, "| # | TGD | Support | Confidence |");
        let _ = writeln!(out, "|---|-----|---------|------------|");
        for (i, accepted) in outcome.rules.iter().enumerate() {
            let _ = writeln!(
                out,
                "| {} | `{}` | {} | {:.4} |",
                i + 1,
                accepted.rule.tgd_string(),
                accepted.support,
                accepted.confidence
            );
        }
    }
    out
}

/// Write both artifacts into `output_dir`, returning their paths
pub fn write_artifacts(
    outcome: &DiscoveryOutcome,
    output_dir: &Path,
) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(output_dir)?;
    let json_path = output_dir.join(format!("MATILDA_{}_results.json", outcome.database));
    let md_path = output_dir.join(format!("report_MATILDA_{}.md", outcome.database));

    let document = ResultsDocument::from_outcome(outcome);
    let mut json = serde_json::to_string_pretty(&document)?;
    json.push('\n');
    std::fs::write(&json_path, json)?;
    std::fs::write(&md_path, render_markdown(outcome))?;

    info!(
        json = %json_path.display(),
        report = %md_path.display(),
        "artifacts written"
    );
    Ok((json_path, md_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DiscoveryStats, RunStatus};
    use crate::prune::AcceptedRule;
    use crate::tgd::{fingerprint, Atom, Rule, Term};
    use std::time::Duration;

    fn outcome() -> DiscoveryOutcome {
        let rule = Rule::new(
            vec![Atom::new(
                "enrollment",
                vec![Term::Anonymous, Term::var(0), Term::Anonymous],
            )],
            vec![Atom::new(
                "student",
                vec![Term::var(0), Term::var(1), Term::var(2), Term::var(3)],
            )],
        );
        let accepted = AcceptedRule {
            fingerprint: fingerprint(&rule),
            support: 76,
            confidence: 76.0 / 81.0,
            rule,
        };
        DiscoveryOutcome {
            rules: vec![accepted],
            status: RunStatus::Success,
            trigger: None,
            stats: DiscoveryStats {
                enumerated: 10,
                validated: 8,
                accepted: 1,
            },
            elapsed: Duration::from_millis(1234),
            database: "imperfect_database".to_string(),
        }
    }

    #[test]
    fn test_json_document_shape() {
        let document = ResultsDocument::from_outcome(&outcome());
        assert_eq!(document.metadata.total_rules, 1);
        assert_eq!(document.metadata.status, "success");
        assert_eq!(document.rules[0].support, 76);
        assert_eq!(
            document.rules[0].body,
            vec!["enrollment(_, x, _)".to_string()]
        );
        assert_eq!(
            document.rules[0].tgd_string,
            "enrollment(_, x, _) → ∃y,z,w. student(x, y, z, w)"
        );
    }

    #[test]
    fn test_artifacts_written() {
        let dir = tempfile::tempdir().unwrap();
        let (json_path, md_path) = write_artifacts(&outcome(), dir.path()).unwrap();
        assert_eq!(
            json_path.file_name().unwrap(),
            "MATILDA_imperfect_database_results.json"
        );
        assert_eq!(
            md_path.file_name().unwrap(),
            "report_MATILDA_imperfect_database.md"
        );
        let parsed: ResultsDocument =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed.rules.len(), 1);

        let markdown = std::fs::read_to_string(&md_path).unwrap();
        assert!(markdown.contains("0.9383"));
        assert!(markdown.contains("success"));
    }

    #[test]
    fn test_json_identical_modulo_execution_time() {
        let mut second = outcome();
        second.elapsed = Duration::from_millis(9999);
        let a = serde_json::to_string_pretty(&ResultsDocument::from_outcome(&outcome())).unwrap();
        let b = serde_json::to_string_pretty(&ResultsDocument::from_outcome(&second)).unwrap();
        let strip = |s: &str| {
            s.lines()
                .filter(|l| !l.contains("execution_time_seconds"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_ne!(a, b);
        assert_eq!(strip(&a), strip(&b));
    }
}
