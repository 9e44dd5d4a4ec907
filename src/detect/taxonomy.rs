//! Fixed maritime threat taxonomy.

use std::fmt;

use image::Rgb;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatType {
    Submarine,
    Mine,
    Diver,
    Drone,
    SuspiciousObject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl ThreatType {
    pub const ALL: [ThreatType; 5] = [
        ThreatType::Submarine,
        ThreatType::Mine,
        ThreatType::Diver,
        ThreatType::Drone,
        ThreatType::SuspiciousObject,
    ];

    /// Detector class id lookup. Ids outside the table are suspicious objects.
    pub fn from_class_id(class_id: i64) -> Self {
        match class_id {
            0 => ThreatType::Submarine,
            1 => ThreatType::Mine,
            2 => ThreatType::Diver,
            3 => ThreatType::Drone,
            _ => ThreatType::SuspiciousObject,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ThreatType::Submarine => "submarine",
            ThreatType::Mine => "mine",
            ThreatType::Diver => "diver",
            ThreatType::Drone => "drone",
            ThreatType::SuspiciousObject => "suspicious_object",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            ThreatType::Submarine | ThreatType::Mine => Severity::Critical,
            ThreatType::Diver | ThreatType::Drone => Severity::High,
            ThreatType::SuspiciousObject => Severity::Medium,
        }
    }

    /// Annotation colour (RGB).
    pub fn color(self) -> Rgb<u8> {
        match self {
            ThreatType::Submarine => Rgb([255, 0, 0]),
            ThreatType::Mine => Rgb([255, 165, 0]),
            ThreatType::Diver => Rgb([255, 255, 0]),
            ThreatType::Drone => Rgb([0, 0, 255]),
            ThreatType::SuspiciousObject => Rgb([128, 0, 128]),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ThreatType::Submarine => "Underwater military vessel",
            ThreatType::Mine => "Naval explosive device",
            ThreatType::Diver => "Human underwater swimmer",
            ThreatType::Drone => "Unmanned underwater vehicle",
            ThreatType::SuspiciousObject => "Unidentified potentially threatening object",
        }
    }
}

impl fmt::Display for ThreatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Catalogue entry for one threat type, as exposed to callers.
#[derive(Clone, Debug, Serialize)]
pub struct ThreatTypeInfo {
    pub threat_type: ThreatType,
    pub severity: Severity,
    pub description: &'static str,
    pub color: [u8; 3],
}

pub fn catalogue() -> Vec<ThreatTypeInfo> {
    ThreatType::ALL
        .into_iter()
        .map(|t| ThreatTypeInfo {
            threat_type: t,
            severity: t.severity(),
            description: t.description(),
            color: t.color().0,
        })
        .collect()
}
