// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Aircraft and Recording Attributes
// ─────────────────────────────────────────────────────────────────────

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FdmError;

/// Aircraft attributes a node may depend on or be gated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeName {
    Model,
    Series,
    Family,
    EngineSeries,
    EngineType,
}

impl AttributeName {
    pub const ALL: [AttributeName; 5] = [
        AttributeName::Model,
        AttributeName::Series,
        AttributeName::Family,
        AttributeName::EngineSeries,
        AttributeName::EngineType,
    ];

    /// Name as it appears in the available-name set.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeName::Model => "Model",
            AttributeName::Series => "Series",
            AttributeName::Family => "Family",
            AttributeName::EngineSeries => "Engine Series",
            AttributeName::EngineType => "Engine Type",
        }
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeName {
    type Err = FdmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttributeName::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| FdmError::Contract(format!("unknown attribute '{s}'")))
    }
}

/// Metadata of one recording and the aircraft that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    pub model: Option<String>,
    pub series: Option<String>,
    pub family: Option<String>,
    pub engine_series: Option<String>,
    pub engine_type: Option<String>,
    /// Recording length in seconds, when known.
    pub duration_s: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: AttributeName, value: impl Into<String>) -> Self {
        *self.slot_mut(name) = Some(value.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_s = Some(seconds);
        self
    }

    pub fn with_start_time(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn get(&self, name: AttributeName) -> Option<&str> {
        match name {
            AttributeName::Model => self.model.as_deref(),
            AttributeName::Series => self.series.as_deref(),
            AttributeName::Family => self.family.as_deref(),
            AttributeName::EngineSeries => self.engine_series.as_deref(),
            AttributeName::EngineType => self.engine_type.as_deref(),
        }
    }

    /// Names of the attributes that carry a value.
    pub fn present(&self) -> impl Iterator<Item = AttributeName> + '_ {
        AttributeName::ALL
            .into_iter()
            .filter(|&a| self.get(a).is_some())
    }

    fn slot_mut(&mut self, name: AttributeName) -> &mut Option<String> {
        match name {
            AttributeName::Model => &mut self.model,
            AttributeName::Series => &mut self.series,
            AttributeName::Family => &mut self.family,
            AttributeName::EngineSeries => &mut self.engine_series,
            AttributeName::EngineType => &mut self.engine_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_attributes() {
        let attrs = Attributes::new()
            .with(AttributeName::Family, "A320")
            .with(AttributeName::EngineType, "CFM56-5B");
        let present: Vec<_> = attrs.present().map(|a| a.as_str()).collect();
        assert_eq!(present, vec!["Family", "Engine Type"]);
        assert_eq!(attrs.get(AttributeName::Family), Some("A320"));
        assert_eq!(attrs.get(AttributeName::Model), None);
    }

    #[test]
    fn test_parse_attribute_name() {
        assert_eq!("Engine Series".parse::<AttributeName>().unwrap(), AttributeName::EngineSeries);
        assert!("Tail Number".parse::<AttributeName>().is_err());
    }

    #[test]
    fn test_json_round_trip_with_start_time() {
        let start = DateTime::parse_from_rfc3339("2024-05-01T06:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let attrs = Attributes::new()
            .with(AttributeName::Series, "B737-800")
            .with_duration(3600.0)
            .with_start_time(start);
        let text = serde_json::to_string(&attrs).unwrap();
        let back: Attributes = serde_json::from_str(&text).unwrap();
        assert_eq!(back, attrs);
    }
}
