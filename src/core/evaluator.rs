// Urgency evaluator - turns arbitrary text into a bounded urgency score.
//
// raw = sum(weight * counted occurrences) over keyword signals
//     + heuristic contributions
// score = 1 - exp(-raw * SATURATION_RATE), clamped to [0, 1]

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use super::error::ConfigError;
use super::gate::Threshold;
use super::signals::heuristics::{self, HeuristicKind};
use super::signals::model::{Signal, SignalSet};

/// Steepness of the saturating normalization. A raw score of 1.0 maps to ~0.78.
pub const SATURATION_RATE: f64 = 1.5;

/// Map a non-negative raw score into [0, 1]. Monotonic, never reaches 1 for finite input.
pub fn normalize(raw: f64) -> f64 {
    if !raw.is_finite() {
        return if raw > 0.0 { 1.0 } else { 0.0 };
    }
    if raw <= 0.0 {
        return 0.0;
    }
    (1.0 - (-raw * SATURATION_RATE).exp()).clamp(0.0, 1.0)
}

/// Where a match came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchSource {
    /// Index into the signal table
    Keyword { index: usize },
    Heuristic { kind: HeuristicKind },
}

/// One matched signal with its positions and score contribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalMatch {
    pub name: String,
    pub source: MatchSource,
    pub weight: f64,
    /// Byte offsets into the evaluated text
    pub positions: Vec<usize>,
    /// Occurrences that counted toward the raw score
    pub occurrences: usize,
    pub contribution: f64,
}

impl SignalMatch {
    fn first_position(&self) -> usize {
        self.positions.first().copied().unwrap_or(usize::MAX)
    }
}

/// Outcome of evaluating one text. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    text: String,
    raw_score: f64,
    score: f64,
    threshold: f64,
    is_urgent: bool,
    matches: Vec<SignalMatch>,
}

impl EvaluationResult {
    fn new(text: String, raw_score: f64, threshold: Threshold, matches: Vec<SignalMatch>) -> Self {
        let score = normalize(raw_score);
        Self {
            text,
            raw_score,
            score,
            threshold: threshold.value(),
            is_urgent: threshold.is_met_by(score),
            matches,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn raw_score(&self) -> f64 {
        self.raw_score
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_urgent(&self) -> bool {
        self.is_urgent
    }

    pub fn matches(&self) -> &[SignalMatch] {
        &self.matches
    }

    /// Names of matched signals, in match order.
    pub fn matched_names(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.name.as_str()).collect()
    }
}

struct CompiledSignal {
    signal: Signal,
    pattern: Regex,
}

/// Scores text against a fixed signal table. Cheap to share; holds no mutable state.
pub struct UrgencyEvaluator {
    signals: Vec<CompiledSignal>,
    threshold: Threshold,
}

impl UrgencyEvaluator {
    pub fn new(signals: SignalSet, threshold: Threshold) -> Result<Self, ConfigError> {
        let signals = signals
            .signals()
            .iter()
            .enumerate()
            .map(|(index, signal)| compile(index, signal))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { signals, threshold })
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Evaluate one text. Total over strings: empty or blank text scores 0.
    pub fn evaluate(&self, text: &str) -> EvaluationResult {
        if text.trim().is_empty() {
            return EvaluationResult::new(text.to_string(), 0.0, self.threshold, Vec::new());
        }

        let mut matches = Vec::new();
        let mut raw = 0.0;

        for (index, compiled) in self.signals.iter().enumerate() {
            let positions: Vec<usize> = compiled.pattern.find_iter(text).map(|m| m.start()).collect();
            if positions.is_empty() {
                continue;
            }
            let occurrences = if compiled.signal.count_once { 1 } else { positions.len() };
            let contribution = compiled.signal.weight * occurrences as f64;
            raw += contribution;
            matches.push(SignalMatch {
                name: compiled.signal.keyword.clone(),
                source: MatchSource::Keyword { index },
                weight: compiled.signal.weight,
                positions,
                occurrences,
                contribution,
            });
        }

        for hit in heuristics::evaluate_all(text) {
            raw += hit.contribution;
            let weight = if hit.counted == 0 { 0.0 } else { hit.contribution / hit.counted as f64 };
            matches.push(SignalMatch {
                name: hit.kind.label().to_string(),
                source: MatchSource::Heuristic { kind: hit.kind },
                weight,
                positions: hit.positions,
                occurrences: hit.counted,
                contribution: hit.contribution,
            });
        }

        // stable: ties keep table order, keywords before heuristics
        matches.sort_by_key(SignalMatch::first_position);

        log::debug!("Evaluated {} bytes: raw={:.3}, {} matches", text.len(), raw, matches.len());
        EvaluationResult::new(text.to_string(), raw, self.threshold, matches)
    }
}

fn compile(index: usize, signal: &Signal) -> Result<CompiledSignal, ConfigError> {
    let escaped = regex::escape(&signal.keyword);
    let source = if signal.whole_word {
        format!(r"\b{escaped}\b")
    } else {
        escaped
    };
    let pattern = RegexBuilder::new(&source)
        .case_insensitive(!signal.case_sensitive)
        .build()
        .map_err(|e| ConfigError::InvalidSignal {
            index,
            reason: e.to_string(),
        })?;
    Ok(CompiledSignal {
        signal: signal.clone(),
        pattern,
    })
}
