//! Cross-image threat pattern analysis.

use serde::Serialize;

use crate::detect::{Detection, Severity, ThreatType, TypeCounts};

pub const NO_THREATS: &str = "No threats detected";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MostCommonThreat {
    #[serde(rename = "type")]
    pub threat_type: ThreatType,
    pub count: usize,
}

/// `critical`, `high` and `medium` are always present; `low` only when seen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    #[serde(skip_serializing_if = "is_zero")]
    pub low: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl SeverityCounts {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThreatPatterns {
    pub most_common_threat: MostCommonThreat,
    pub threat_distribution: TypeCounts,
    pub severity_distribution: SeverityCounts,
    /// Mean confidence rounded to two decimals.
    pub average_confidence: f64,
    pub total_threats: usize,
    pub risk_level: RiskLevel,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PatternReport {
    NoThreats { pattern_summary: &'static str },
    Patterns(ThreatPatterns),
}

impl PatternReport {
    pub fn no_threats() -> Self {
        PatternReport::NoThreats {
            pattern_summary: NO_THREATS,
        }
    }

    pub fn patterns(&self) -> Option<&ThreatPatterns> {
        match self {
            PatternReport::Patterns(p) => Some(p),
            PatternReport::NoThreats { .. } => None,
        }
    }

    pub fn total_threats(&self) -> usize {
        self.patterns().map(|p| p.total_threats).unwrap_or(0)
    }
}

/// Aggregate detections from any number of images.
pub fn analyze<'a>(detections: impl IntoIterator<Item = &'a Detection>) -> PatternReport {
    let mut severities = SeverityCounts::default();
    let mut types = Vec::new();
    let mut confidence_sum = 0.0f64;

    for detection in detections {
        severities.record(detection.severity());
        types.push(detection.threat_type());
        confidence_sum += detection.confidence();
    }

    let distribution = TypeCounts::tally(&types);
    let Some((threat_type, count)) = distribution.most_common() else {
        return PatternReport::no_threats();
    };

    let total = types.len();
    let risk_level = if severities.critical > 0 {
        RiskLevel::High
    } else if severities.high > 0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    PatternReport::Patterns(ThreatPatterns {
        most_common_threat: MostCommonThreat { threat_type, count },
        threat_distribution: distribution,
        severity_distribution: severities,
        average_confidence: round2(confidence_sum / total as f64),
        total_threats: total,
        risk_level,
    })
}

/// Two-decimal rounding of the exact binary value, so 0.615 (stored as 0.61499…) gives 0.61.
fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}
