// Shape-based urgency boosts that do not depend on the keyword table.
//
// Each heuristic counts occurrences up to its own cap and contributes
// `weight * counted` to the raw score, so repeating the same shouting
// cannot dominate the keyword evidence.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Raw-score contribution per all-caps word.
pub const ALL_CAPS_WEIGHT: f64 = 0.15;
/// Maximum number of all-caps words that count.
pub const ALL_CAPS_CAP: usize = 3;
/// Raw-score contribution per exclamation mark.
pub const EXCLAMATION_WEIGHT: f64 = 0.1;
/// Maximum number of exclamation marks that count.
pub const EXCLAMATION_CAP: usize = 3;
/// Raw-score contribution when any numeric error code is present.
pub const ERROR_CODE_WEIGHT: f64 = 0.25;

lazy_static! {
    // A run of 3+ capitals not running into a digit ("SEV1" is an identifier).
    // No word boundaries: text glued onto either side keeps the run intact.
    static ref ALL_CAPS_RUN: Regex =
        Regex::new(r"\p{Lu}{3,}(?:[^\p{Lu}\p{Nd}]|$)").expect("Invalid all-caps regex");
    // "HTTP 503", "exit code 137", "errno=13" / "E1234", "ERR-42", "ORA-00600"
    static ref ERROR_CODE: Regex = Regex::new(
        r"(?i:(?:http|status|code|errno|exit|error)[\s:=#]*\d{2,5})|[A-Z]{1,4}(?:-\d{2,5}|\d{3,5})"
    )
    .expect("Invalid error code regex");
}

/// Which heuristic produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicKind {
    AllCaps,
    Exclamation,
    ErrorCode,
}

impl HeuristicKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AllCaps => "ALL CAPS",
            Self::Exclamation => "exclamation",
            Self::ErrorCode => "error code",
        }
    }

    pub fn all() -> &'static [HeuristicKind] {
        &[Self::AllCaps, Self::Exclamation, Self::ErrorCode]
    }
}

/// One heuristic that fired for a text.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicHit {
    pub kind: HeuristicKind,
    /// Byte offsets of every occurrence (including ones beyond the cap)
    pub positions: Vec<usize>,
    /// Occurrences that counted toward the score
    pub counted: usize,
    pub contribution: f64,
}

/// Run a single heuristic over `text`.
pub fn evaluate_heuristic(kind: HeuristicKind, text: &str) -> Option<HeuristicHit> {
    match kind {
        HeuristicKind::AllCaps => all_caps(text),
        HeuristicKind::Exclamation => exclamation(text),
        HeuristicKind::ErrorCode => error_code(text),
    }
}

/// Run every heuristic, in declaration order.
pub fn evaluate_all(text: &str) -> Vec<HeuristicHit> {
    HeuristicKind::all()
        .iter()
        .filter_map(|kind| evaluate_heuristic(*kind, text))
        .collect()
}

fn all_caps(text: &str) -> Option<HeuristicHit> {
    let positions: Vec<usize> = ALL_CAPS_RUN.find_iter(text).map(|m| m.start()).collect();
    capped_hit(HeuristicKind::AllCaps, positions, ALL_CAPS_CAP, ALL_CAPS_WEIGHT)
}

fn exclamation(text: &str) -> Option<HeuristicHit> {
    let positions: Vec<usize> = text.match_indices('!').map(|(i, _)| i).collect();
    capped_hit(HeuristicKind::Exclamation, positions, EXCLAMATION_CAP, EXCLAMATION_WEIGHT)
}

fn error_code(text: &str) -> Option<HeuristicHit> {
    let positions: Vec<usize> = ERROR_CODE.find_iter(text).map(|m| m.start()).collect();
    // presence only
    capped_hit(HeuristicKind::ErrorCode, positions, 1, ERROR_CODE_WEIGHT)
}

fn capped_hit(
    kind: HeuristicKind,
    positions: Vec<usize>,
    cap: usize,
    weight: f64,
) -> Option<HeuristicHit> {
    if positions.is_empty() {
        return None;
    }
    let counted = positions.len().min(cap);
    Some(HeuristicHit {
        kind,
        positions,
        counted,
        contribution: weight * counted as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_caps_counts_long_words_only() {
        let hit = evaluate_heuristic(HeuristicKind::AllCaps, "DB is DOWN, OK? NOW").unwrap();
        // "DB" and "OK" are too short
        assert_eq!(hit.positions.len(), 2);
        assert!((hit.contribution - 2.0 * ALL_CAPS_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn test_all_caps_is_capped() {
        let hit = evaluate_heuristic(HeuristicKind::AllCaps, "ONE TWO THREE FOUR FIVE").unwrap();
        assert_eq!(hit.positions.len(), 5);
        assert_eq!(hit.counted, ALL_CAPS_CAP);
    }

    #[test]
    fn test_caps_survive_glued_text() {
        for text in ["SECURITYincident", "incidentSECURITY", "DOWN!"] {
            let hit = evaluate_heuristic(HeuristicKind::AllCaps, text).unwrap();
            assert_eq!(hit.counted, 1, "{text:?}");
        }
        assert!(evaluate_heuristic(HeuristicKind::AllCaps, "SEV1 declared").is_none());
    }

    #[test]
    fn test_mixed_case_is_not_caps() {
        assert!(evaluate_heuristic(HeuristicKind::AllCaps, "Daily Backup Completed").is_none());
    }

    #[test]
    fn test_exclamation_capped() {
        let hit = evaluate_heuristic(HeuristicKind::Exclamation, "help!!!!!").unwrap();
        assert_eq!(hit.counted, EXCLAMATION_CAP);
        assert_eq!(hit.positions[0], 4);
    }

    #[test]
    fn test_error_code_patterns() {
        for text in [
            "upstream returned HTTP 503",
            "process exited with exit code 137",
            "open failed: errno=13",
            "ORA-00600 internal error",
            "compiler said E0502",
            "see ERR-42",
        ] {
            assert!(
                evaluate_heuristic(HeuristicKind::ErrorCode, text).is_some(),
                "expected an error code in {text:?}"
            );
        }
    }

    #[test]
    fn test_error_code_survives_glued_text() {
        for text in ["production code 503production", "outageHTTP 502", "ORA-00600outage", "errorE1234"] {
            assert!(
                evaluate_heuristic(HeuristicKind::ErrorCode, text).is_some(),
                "expected an error code in {text:?}"
            );
        }
    }

    #[test]
    fn test_error_code_ignores_plain_numbers() {
        assert!(evaluate_heuristic(HeuristicKind::ErrorCode, "backup took 450 seconds").is_none());
        assert!(evaluate_heuristic(HeuristicKind::ErrorCode, "Daily backup completed").is_none());
    }

    #[test]
    fn test_error_code_counts_once() {
        let hit = evaluate_heuristic(HeuristicKind::ErrorCode, "E1001 then E1002 then E1003").unwrap();
        assert_eq!(hit.positions.len(), 3);
        assert_eq!(hit.counted, 1);
        assert!((hit.contribution - ERROR_CODE_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_all_empty() {
        assert!(evaluate_all("").is_empty());
        assert!(evaluate_all("   \n\t").is_empty());
    }
}
