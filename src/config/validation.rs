//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use crate::types::ThresholdField;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `AppConfig`.
///
/// Maintained by hand to match app_config.rs; the `[risk]` keys (snake_case
/// names and their camelCase aliases) come from `ThresholdField` so they
/// cannot drift.
pub fn known_config_keys() -> HashSet<String> {
    let fixed: &[&str] = &[
        // [server]
        "server",
        "server.addr",
        "server.utc_offset_hours",
        // [history]
        "history",
        "history.capacity",
        "history.query_limit",
        "history.export_limit",
        // [live]
        "live",
        "live.channel_capacity",
        // [risk]
        "risk",
    ];

    fixed
        .iter()
        .map(|k| (*k).to_string())
        .chain(
            ThresholdField::ALL
                .iter()
                .flat_map(|f| [f.name(), f.camel_name()])
                .map(|name| format!("risk.{name}")),
        )
        .collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction<'a, I>(unknown: &str, known: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    known
        .into_iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.to_string())
}

/// Suggest a threshold name for a misspelled one (used by the threshold editor).
pub fn suggest_threshold_name(unknown: &str) -> Option<String> {
    suggest_correction(unknown, ThresholdField::ALL.iter().map(|f| f.name()))
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns. Existing configs
/// always continue to work.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let mut warnings = Vec::new();

    for key in walk_toml_keys(&value, "") {
        if !known.contains(&key) {
            let suggestion = suggest_correction(&key, known.iter().map(String::as_str));
            warnings.push(ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate non-threshold ranges on a parsed `AppConfig`.
///
/// Returns (errors, warnings). Errors must prevent startup; warnings are
/// suspicious but not fatal.
pub fn validate_ranges(config: &super::AppConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if config.server.offset().is_none() {
        errors.push(format!(
            "server.utc_offset_hours = {} is outside the valid range (-23..=23)",
            config.server.utc_offset_hours
        ));
    }

    let h = &config.history;
    for (name, value) in [
        ("history.capacity", h.capacity),
        ("history.query_limit", h.query_limit),
        ("history.export_limit", h.export_limit),
        ("live.channel_capacity", config.live.channel_capacity),
    ] {
        if value == 0 {
            errors.push(format!("{name} must be > 0"));
        }
    }

    if h.export_limit > h.capacity {
        warnings.push(ValidationWarning {
            field: "history.export_limit".to_string(),
            message: format!(
                "history.export_limit ({}) exceeds history.capacity ({}); exports are capped by what is retained",
                h.export_limit, h.capacity
            ),
            suggestion: None,
        });
    }

    // The classification boundaries assume a composite in [0, 1]
    let weight_sum = config.risk.weight_sum();
    if weight_sum.is_finite() && !(0.95..=1.05).contains(&weight_sum) {
        warnings.push(ValidationWarning {
            field: "risk".to_string(),
            message: format!(
                "risk weights sum to {weight_sum:.2}; the composite score will not span [0, 1]"
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
