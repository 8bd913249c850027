use serde::{Deserialize, Serialize};

/// One vehicle in the fleet registry.
///
/// Registry rows come from the back-office data store; every field except the
/// identifier is optional because older fleet entries predate the registration
/// and kind columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    pub label: Option<String>,
    pub registration: Option<String>,
    pub kind: Option<VehicleKind>,
}

impl Vehicle {
    /// Label when one is set, otherwise the raw identifier. Used for alert and
    /// log text.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    #[must_use]
    pub fn is_truck(&self) -> bool {
        matches!(self.kind, Some(VehicleKind::Truck))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VehicleKind {
    Truck,
    Van,
    Car,
    Trailer,
}
