use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Classification of a single telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleTag {
    Movement,
    Stop,
    Speeding,
}

impl SampleTag {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "movement" => Some(Self::Movement),
            "stop" => Some(Self::Stop),
            "speeding" => Some(Self::Speeding),
            _ => None,
        }
    }
}

/// One validated telemetry sample. Immutable once recorded; ownership belongs
/// to the telemetry store and the tracking core only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePosition {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Speed over ground in km/h. Absent when the device sends no speed signal.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Heading in degrees, 0–359.
    #[serde(default)]
    pub heading: Option<u16>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tag: Option<SampleTag>,
}

impl VehiclePosition {
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate { latitude: self.latitude, longitude: self.longitude }
    }

    /// Checks the telemetry invariants: latitude in [-90, 90], longitude in
    /// [-180, 180], speed non-negative, heading below 360.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedTelemetry` identifying the sample and the
    /// violated field.
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(self.malformed(format!("latitude {} out of range", self.latitude)));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(self.malformed(format!("longitude {} out of range", self.longitude)));
        }
        if let Some(speed) = self.speed
            && (speed < 0.0 || speed.is_nan())
        {
            return Err(self.malformed(format!("speed {speed} is negative or not a number")));
        }
        if let Some(heading) = self.heading
            && heading > 359
        {
            return Err(self.malformed(format!("heading {heading} out of range")));
        }
        Ok(())
    }

    fn malformed(&self, detail: String) -> Error {
        Error::MalformedTelemetry(format!(
            "vehicle {} at {}: {detail}",
            self.vehicle_id, self.updated_at
        ))
    }
}

/// A raw position row as the data store returns it: every field optional, the
/// timestamp in epoch seconds, the tag free text. Conversion into
/// [`VehiclePosition`] is the single chokepoint where store-shape drift becomes
/// `MalformedTelemetry`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PositionRecord {
    pub vehicle_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<i64>,
    pub updated_at: Option<i64>,
    pub tag: Option<String>,
}

impl TryFrom<PositionRecord> for VehiclePosition {
    type Error = Error;

    fn try_from(record: PositionRecord) -> Result<Self> {
        let vehicle_id = record
            .vehicle_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MalformedTelemetry("row without vehicle id".to_string()))?;

        let missing = |field: &str| {
            Error::MalformedTelemetry(format!("vehicle {vehicle_id}: row missing {field}"))
        };
        let latitude = record.latitude.ok_or_else(|| missing("latitude"))?;
        let longitude = record.longitude.ok_or_else(|| missing("longitude"))?;
        let epoch = record.updated_at.ok_or_else(|| missing("updated_at"))?;

        let updated_at = DateTime::<Utc>::from_timestamp(epoch, 0).ok_or_else(|| {
            Error::MalformedTelemetry(format!("vehicle {vehicle_id}: timestamp {epoch} out of range"))
        })?;

        let heading = match record.heading {
            Some(value) => Some(u16::try_from(value).map_err(|_| {
                Error::MalformedTelemetry(format!("vehicle {vehicle_id}: heading {value} out of range"))
            })?),
            None => None,
        };

        let tag = match record.tag.as_deref() {
            Some(value) => Some(SampleTag::parse(value).ok_or_else(|| {
                Error::MalformedTelemetry(format!("vehicle {vehicle_id}: unknown tag {value:?}"))
            })?),
            None => None,
        };

        let position = Self {
            vehicle_id,
            latitude,
            longitude,
            speed: record.speed,
            heading,
            updated_at,
            tag,
        };
        position.validate()?;
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::{PositionRecord, SampleTag, VehiclePosition};

    fn record() -> PositionRecord {
        PositionRecord {
            vehicle_id: Some("v-001".to_string()),
            latitude: Some(-36.8485),
            longitude: Some(174.7633),
            speed: Some(52.0),
            heading: Some(270),
            updated_at: Some(1_752_000_000),
            tag: Some("movement".to_string()),
        }
    }

    #[test]
    fn record_converts() {
        let position = VehiclePosition::try_from(record()).expect("valid row");

        assert_eq!(position.vehicle_id, "v-001");
        assert_eq!(position.heading, Some(270));
        assert_eq!(position.tag, Some(SampleTag::Movement));
        assert_eq!(position.updated_at, Utc.timestamp_opt(1_752_000_000, 0).unwrap());
    }

    #[test]
    fn missing_vehicle_id_rejected() {
        let row = PositionRecord { vehicle_id: None, ..record() };
        let err = VehiclePosition::try_from(row).unwrap_err();
        assert_eq!(err.code(), "malformed_telemetry");
    }

    #[test]
    fn missing_coordinate_rejected() {
        let row = PositionRecord { longitude: None, ..record() };
        let err = VehiclePosition::try_from(row).unwrap_err();
        assert!(err.to_string().contains("missing longitude"));
    }

    #[test]
    fn out_of_range_latitude_rejected() {
        let row = PositionRecord { latitude: Some(91.2), ..record() };
        let err = VehiclePosition::try_from(row).unwrap_err();
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn negative_speed_rejected() {
        let row = PositionRecord { speed: Some(-4.0), ..record() };
        let err = VehiclePosition::try_from(row).unwrap_err();
        assert!(err.to_string().contains("speed"));
    }

    #[test]
    fn heading_wraparound_rejected() {
        let row = PositionRecord { heading: Some(360), ..record() };
        let err = VehiclePosition::try_from(row).unwrap_err();
        assert!(err.to_string().contains("heading"));
    }

    #[test]
    fn unknown_tag_rejected() {
        let row = PositionRecord { tag: Some("teleport".to_string()), ..record() };
        let err = VehiclePosition::try_from(row).unwrap_err();
        assert!(err.to_string().contains("unknown tag"));
    }

    #[test]
    fn optional_fields_stay_optional() {
        let row = PositionRecord { speed: None, heading: None, tag: None, ..record() };
        let position = VehiclePosition::try_from(row).expect("valid row");

        assert_eq!(position.speed, None);
        assert_eq!(position.heading, None);
        assert_eq!(position.tag, None);
    }
}
