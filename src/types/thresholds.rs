//! Risk thresholds, named threshold fields, partial overrides and risk levels

use serde::{Deserialize, Serialize};

/// Built-in threshold defaults (the values the field deployment was tuned with)
pub mod risk_defaults {
    // === Tilt (planar accel magnitude) ===
    /// Tilt magnitude below this contributes no risk
    pub const TILT_NORMAL: f64 = 6.0;
    /// Tilt magnitude at or above this is full tilt risk
    pub const TILT_DANGER: f64 = 8.0;

    // === Soil moisture (higher = wetter = safer) ===
    /// Moisture above this contributes no risk
    pub const MOISTURE_NORMAL: f64 = 800.0;
    /// Moisture at or below this is full moisture risk
    pub const MOISTURE_WARNING: f64 = 750.0;

    // === Vibration ===
    /// Raw vibration at or above this counts as a vibration event
    pub const VIBRATION_EVENT: f64 = 1.0;

    // === Composite weights ===
    /// Tilt weight (50%) - primary precursor
    pub const WEIGHT_TILT: f64 = 0.5;
    /// Moisture weight (30%) - cause of collapse
    pub const WEIGHT_MOISTURE: f64 = 0.3;
    /// Vibration weight (20%) - supporting indicator
    pub const WEIGHT_VIBRATION: f64 = 0.2;

    // === Classification boundaries ===
    /// Composite score below this is Normal
    pub const RISK_NORMAL_MAX: f64 = 0.3;
    /// Composite score below this (and >= RISK_NORMAL_MAX) is Warning
    pub const RISK_WARNING_MAX: f64 = 0.6;
}

use risk_defaults as d;

// ============================================================================
// RiskThresholds
// ============================================================================

/// Complete threshold set used by every scoring call.
///
/// Any subset may be given in TOML or JSON; missing fields take the
/// built-in defaults. camelCase names are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    #[serde(alias = "tiltNormal")]
    pub tilt_normal: f64,
    #[serde(alias = "tiltDanger")]
    pub tilt_danger: f64,
    #[serde(alias = "moistureNormal")]
    pub moisture_normal: f64,
    #[serde(alias = "moistureWarning")]
    pub moisture_warning: f64,
    #[serde(alias = "weightTilt")]
    pub weight_tilt: f64,
    #[serde(alias = "weightMoisture")]
    pub weight_moisture: f64,
    #[serde(alias = "weightVibration")]
    pub weight_vibration: f64,
    #[serde(alias = "riskNormalMax")]
    pub risk_normal_max: f64,
    #[serde(alias = "riskWarningMax")]
    pub risk_warning_max: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            tilt_normal: d::TILT_NORMAL,
            tilt_danger: d::TILT_DANGER,
            moisture_normal: d::MOISTURE_NORMAL,
            moisture_warning: d::MOISTURE_WARNING,
            weight_tilt: d::WEIGHT_TILT,
            weight_moisture: d::WEIGHT_MOISTURE,
            weight_vibration: d::WEIGHT_VIBRATION,
            risk_normal_max: d::RISK_NORMAL_MAX,
            risk_warning_max: d::RISK_WARNING_MAX,
        }
    }
}

impl RiskThresholds {
    /// Read one field by name.
    pub fn get(&self, field: ThresholdField) -> f64 {
        match field {
            ThresholdField::TiltNormal => self.tilt_normal,
            ThresholdField::TiltDanger => self.tilt_danger,
            ThresholdField::MoistureNormal => self.moisture_normal,
            ThresholdField::MoistureWarning => self.moisture_warning,
            ThresholdField::WeightTilt => self.weight_tilt,
            ThresholdField::WeightMoisture => self.weight_moisture,
            ThresholdField::WeightVibration => self.weight_vibration,
            ThresholdField::RiskNormalMax => self.risk_normal_max,
            ThresholdField::RiskWarningMax => self.risk_warning_max,
        }
    }

    /// Return a copy with one field replaced. Does not validate.
    #[must_use]
    pub fn with(mut self, field: ThresholdField, value: f64) -> Self {
        let slot = match field {
            ThresholdField::TiltNormal => &mut self.tilt_normal,
            ThresholdField::TiltDanger => &mut self.tilt_danger,
            ThresholdField::MoistureNormal => &mut self.moisture_normal,
            ThresholdField::MoistureWarning => &mut self.moisture_warning,
            ThresholdField::WeightTilt => &mut self.weight_tilt,
            ThresholdField::WeightMoisture => &mut self.weight_moisture,
            ThresholdField::WeightVibration => &mut self.weight_vibration,
            ThresholdField::RiskNormalMax => &mut self.risk_normal_max,
            ThresholdField::RiskWarningMax => &mut self.risk_warning_max,
        };
        *slot = value;
        self
    }

    /// Sum of the three composite weights (upper bound of the composite score).
    pub fn weight_sum(&self) -> f64 {
        self.weight_tilt + self.weight_moisture + self.weight_vibration
    }

    /// Check the thresholds for degenerate or impossible values.
    ///
    /// Returns every problem found, not just the first.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for field in ThresholdField::ALL {
            let value = self.get(field);
            if !value.is_finite() {
                problems.push(format!("{field} must be a finite number (got {value})"));
            }
        }
        if !problems.is_empty() {
            // Ordering checks against NaN/Inf are meaningless
            return problems;
        }

        if self.tilt_danger <= self.tilt_normal {
            problems.push(format!(
                "tilt_danger ({:.3}) must be greater than tilt_normal ({:.3})",
                self.tilt_danger, self.tilt_normal
            ));
        }
        if self.moisture_normal <= self.moisture_warning {
            problems.push(format!(
                "moisture_normal ({:.3}) must be greater than moisture_warning ({:.3})",
                self.moisture_normal, self.moisture_warning
            ));
        }
        for field in [
            ThresholdField::WeightTilt,
            ThresholdField::WeightMoisture,
            ThresholdField::WeightVibration,
        ] {
            let w = self.get(field);
            if w < 0.0 {
                problems.push(format!("{field} ({w:.3}) cannot be negative"));
            }
        }
        if self.risk_warning_max <= self.risk_normal_max {
            problems.push(format!(
                "risk_warning_max ({:.3}) must be greater than risk_normal_max ({:.3})",
                self.risk_warning_max, self.risk_normal_max
            ));
        }

        problems
    }
}

// ============================================================================
// ThresholdField
// ============================================================================

/// One named, individually editable threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdField {
    TiltNormal,
    TiltDanger,
    MoistureNormal,
    MoistureWarning,
    WeightTilt,
    WeightMoisture,
    WeightVibration,
    RiskNormalMax,
    RiskWarningMax,
}

impl ThresholdField {
    /// All fields in editor order (ids 1..=9).
    pub const ALL: [Self; 9] = [
        Self::TiltNormal,
        Self::TiltDanger,
        Self::MoistureNormal,
        Self::MoistureWarning,
        Self::WeightTilt,
        Self::WeightMoisture,
        Self::WeightVibration,
        Self::RiskNormalMax,
        Self::RiskWarningMax,
    ];

    /// Stable numeric id shown by the threshold editor.
    pub fn id(self) -> u32 {
        match self {
            Self::TiltNormal => 1,
            Self::TiltDanger => 2,
            Self::MoistureNormal => 3,
            Self::MoistureWarning => 4,
            Self::WeightTilt => 5,
            Self::WeightMoisture => 6,
            Self::WeightVibration => 7,
            Self::RiskNormalMax => 8,
            Self::RiskWarningMax => 9,
        }
    }

    /// snake_case name, identical to the TOML / JSON key.
    pub fn name(self) -> &'static str {
        match self {
            Self::TiltNormal => "tilt_normal",
            Self::TiltDanger => "tilt_danger",
            Self::MoistureNormal => "moisture_normal",
            Self::MoistureWarning => "moisture_warning",
            Self::WeightTilt => "weight_tilt",
            Self::WeightMoisture => "weight_moisture",
            Self::WeightVibration => "weight_vibration",
            Self::RiskNormalMax => "risk_normal_max",
            Self::RiskWarningMax => "risk_warning_max",
        }
    }

    /// camelCase alias accepted in TOML and JSON.
    pub(crate) fn camel_name(self) -> &'static str {
        match self {
            Self::TiltNormal => "tiltNormal",
            Self::TiltDanger => "tiltDanger",
            Self::MoistureNormal => "moistureNormal",
            Self::MoistureWarning => "moistureWarning",
            Self::WeightTilt => "weightTilt",
            Self::WeightMoisture => "weightMoisture",
            Self::WeightVibration => "weightVibration",
            Self::RiskNormalMax => "riskNormalMax",
            Self::RiskWarningMax => "riskWarningMax",
        }
    }
}

impl std::fmt::Display for ThresholdField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a threshold name is not one of the nine fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown threshold '{0}'")]
pub struct UnknownThreshold(pub String);

impl std::str::FromStr for ThresholdField {
    type Err = UnknownThreshold;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s || f.camel_name() == s)
            .ok_or_else(|| UnknownThreshold(s.to_string()))
    }
}

// ============================================================================
// ThresholdOverrides
// ============================================================================

/// A partial threshold set: fields left `None` keep the base value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOverrides {
    #[serde(alias = "tiltNormal", skip_serializing_if = "Option::is_none")]
    pub tilt_normal: Option<f64>,
    #[serde(alias = "tiltDanger", skip_serializing_if = "Option::is_none")]
    pub tilt_danger: Option<f64>,
    #[serde(alias = "moistureNormal", skip_serializing_if = "Option::is_none")]
    pub moisture_normal: Option<f64>,
    #[serde(alias = "moistureWarning", skip_serializing_if = "Option::is_none")]
    pub moisture_warning: Option<f64>,
    #[serde(alias = "weightTilt", skip_serializing_if = "Option::is_none")]
    pub weight_tilt: Option<f64>,
    #[serde(alias = "weightMoisture", skip_serializing_if = "Option::is_none")]
    pub weight_moisture: Option<f64>,
    #[serde(alias = "weightVibration", skip_serializing_if = "Option::is_none")]
    pub weight_vibration: Option<f64>,
    #[serde(alias = "riskNormalMax", skip_serializing_if = "Option::is_none")]
    pub risk_normal_max: Option<f64>,
    #[serde(alias = "riskWarningMax", skip_serializing_if = "Option::is_none")]
    pub risk_warning_max: Option<f64>,
}

impl ThresholdOverrides {
    /// Overlay the set fields onto `base`. Does not validate.
    pub fn apply_to(&self, base: RiskThresholds) -> RiskThresholds {
        RiskThresholds {
            tilt_normal: self.tilt_normal.unwrap_or(base.tilt_normal),
            tilt_danger: self.tilt_danger.unwrap_or(base.tilt_danger),
            moisture_normal: self.moisture_normal.unwrap_or(base.moisture_normal),
            moisture_warning: self.moisture_warning.unwrap_or(base.moisture_warning),
            weight_tilt: self.weight_tilt.unwrap_or(base.weight_tilt),
            weight_moisture: self.weight_moisture.unwrap_or(base.weight_moisture),
            weight_vibration: self.weight_vibration.unwrap_or(base.weight_vibration),
            risk_normal_max: self.risk_normal_max.unwrap_or(base.risk_normal_max),
            risk_warning_max: self.risk_warning_max.unwrap_or(base.risk_warning_max),
        }
    }
}

// ============================================================================
// RiskLevel
// ============================================================================

/// Discrete risk classification.
///
/// Encoded on the wire as the integers 0 / 1 / 2 so existing dashboards
/// and stored exports keep reading `risk_level` the same way.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum RiskLevel {
    #[default]
    Normal = 0,
    Warning = 1,
    Danger = 2,
}

impl RiskLevel {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<RiskLevel> for u8 {
    fn from(level: RiskLevel) -> Self {
        level.code()
    }
}

impl TryFrom<u8> for RiskLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Warning),
            2 => Ok(Self::Danger),
            other => Err(format!("invalid risk level {other} (expected 0, 1 or 2)")),
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Normal => write!(f, "NORMAL"),
            RiskLevel::Warning => write!(f, "WARNING"),
            RiskLevel::Danger => write!(f, "DANGER"),
        }
    }
}
