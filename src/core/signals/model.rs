// Signal table types: the weighted keywords the evaluator searches for.
//
// Tables are versioned JSON so operators can ship their own without
// touching the scoring code.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;

/// Current on-disk table version.
pub const SIGNAL_TABLE_VERSION: u32 = 1;

/// A weighted textual indicator of urgency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub keyword: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Match case exactly instead of case-insensitively
    #[serde(default)]
    pub case_sensitive: bool,
    /// Only match at word boundaries ("down" must not hit "download")
    #[serde(default)]
    pub whole_word: bool,
    /// Count at most one occurrence of this signal per text
    #[serde(default)]
    pub count_once: bool,
}

fn default_weight() -> f64 {
    1.0
}

impl Signal {
    pub fn new(keyword: impl Into<String>, weight: f64) -> Self {
        Self {
            keyword: keyword.into(),
            weight,
            case_sensitive: false,
            whole_word: false,
            count_once: false,
        }
    }

    pub fn whole_word(mut self) -> Self {
        self.whole_word = true;
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    pub fn count_once(mut self) -> Self {
        self.count_once = true;
        self
    }
}

/// Serialized form of a signal table file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalTable {
    #[serde(default = "default_version")]
    pub version: u32,
    pub signals: Vec<Signal>,
}

fn default_version() -> u32 {
    SIGNAL_TABLE_VERSION
}

/// Validated, read-only set of signals.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSet {
    signals: Vec<Signal>,
}

impl SignalSet {
    /// Validate and wrap a list of signals.
    pub fn new(signals: Vec<Signal>) -> Result<Self, ConfigError> {
        for (index, signal) in signals.iter().enumerate() {
            if signal.keyword.trim().is_empty() {
                return Err(ConfigError::InvalidSignal {
                    index,
                    reason: "keyword is empty".to_string(),
                });
            }
            if !signal.weight.is_finite() || signal.weight < 0.0 {
                return Err(ConfigError::InvalidSignal {
                    index,
                    reason: format!("weight {} must be a finite non-negative number", signal.weight),
                });
            }
        }
        Ok(Self { signals })
    }

    /// Built-in table used when no table file is configured.
    pub fn builtin() -> Self {
        Self {
            signals: vec![
                Signal::new("urgent", 0.5),
                Signal::new("emergency", 0.6),
                Signal::new("critical", 0.5),
                Signal::new("alert", 0.3).whole_word(),
                Signal::new("immediately", 0.4),
                Signal::new("asap", 0.4).whole_word(),
                Signal::new("failure", 0.4),
                Signal::new("error", 0.3),
                Signal::new("failed", 0.3),
                Signal::new("down", 0.3).whole_word(),
                Signal::new("outage", 0.5),
                Signal::new("broken", 0.3),
                Signal::new("crashed", 0.4),
                Signal::new("breach", 0.6),
                Signal::new("security", 0.3),
                Signal::new("incident", 0.4),
                Signal::new("production", 0.2),
            ],
        }
    }

    /// Load a versioned table from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let table: SignalTable =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if table.version != SIGNAL_TABLE_VERSION {
            return Err(ConfigError::UnsupportedSignalVersion(table.version));
        }
        log::info!("Loaded {} signals from {:?}", table.signals.len(), path);
        Self::new(table.signals)
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

impl Default for SignalSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_table_is_valid() {
        let builtin = SignalSet::builtin();
        assert!(SignalSet::new(builtin.signals().to_vec()).is_ok());
        assert!(builtin.signals().iter().any(|s| s.keyword == "critical"));
    }

    #[test]
    fn test_rejects_empty_keyword() {
        let err = SignalSet::new(vec![Signal::new("ok", 0.1), Signal::new("  ", 0.2)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSignal { index: 1, .. }));
    }

    #[test]
    fn test_rejects_bad_weights() {
        assert!(SignalSet::new(vec![Signal::new("x", -0.1)]).is_err());
        assert!(SignalSet::new(vec![Signal::new("x", f64::NAN)]).is_err());
        assert!(SignalSet::new(vec![Signal::new("x", f64::INFINITY)]).is_err());
    }

    #[test]
    fn test_load_table_with_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"version": 1, "signals": [{{"keyword": "pager"}}, {{"keyword": "SEV1", "weight": 0.9, "case_sensitive": true}}]}}"#
        )
        .unwrap();

        let set = SignalSet::load(file.path()).unwrap();
        assert_eq!(set.signals().len(), 2);
        assert_eq!(set.signals()[0].weight, 1.0);
        assert!(!set.signals()[0].case_sensitive);
        assert!(set.signals()[1].case_sensitive);
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"version": 7, "signals": []}}"#).unwrap();
        let err = SignalSet::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedSignalVersion(7)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SignalSet::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
