use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broad media class of a discovered device.
///
/// The erase backend picks its destruction method from this; the workflow
/// itself never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "HDD")]
    Hdd,
    #[serde(rename = "SSD")]
    Ssd,
    #[serde(other)]
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hdd => "HDD",
            Self::Ssd => "SSD",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one physical storage device at the moment of discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Unique among the currently discovered devices (e.g. `/dev/sda`).
    pub device_name: String,
    pub model: String,
    pub device_type: DeviceType,
    /// Bus label such as `SATA`, `NVME` or `USB`.
    pub transport: String,
}

impl DeviceDescriptor {
    pub fn new(
        device_name: impl Into<String>,
        model: impl Into<String>,
        device_type: DeviceType,
        transport: impl Into<String>,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            model: model.into(),
            device_type,
            transport: transport.into(),
        }
    }
}

/// A non-empty, de-duplicated, ordered set of device names handed to the
/// erase backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeviceSet(Vec<String>);

impl DeviceSet {
    /// Returns `None` when `names` yields nothing.
    pub fn new<I, S>(names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }

        if unique.is_empty() {
            None
        } else {
            Some(Self(unique))
        }
    }

    pub fn single(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }
}

impl fmt::Display for DeviceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// Identifies one erase episode (confirm through outcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EpisodeId(Uuid);

impl EpisodeId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EpisodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The controller's single source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    /// No destructive action pending.
    #[default]
    Browsing,
    /// Destructive action pending, awaiting explicit confirmation.
    Confirming,
    /// Backend call outstanding.
    Erasing {
        episode: EpisodeId,
        devices: DeviceSet,
        started_at: DateTime<Utc>,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Browsing => "browsing",
            Self::Confirming => "confirming",
            Self::Erasing { .. } => "erasing",
        }
    }

    pub fn is_browsing(&self) -> bool {
        matches!(self, Self::Browsing)
    }

    pub fn is_confirming(&self) -> bool {
        matches!(self, Self::Confirming)
    }

    pub fn is_erasing(&self) -> bool {
        matches!(self, Self::Erasing { .. })
    }
}

/// User-visible status line. At most one is shown at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Status {
    Info(String),
    Notice(String),
    Error(String),
}

impl Status {
    pub fn text(&self) -> &str {
        match self {
            Self::Info(text) | Self::Notice(text) | Self::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Outcome of the most recently finished erase episode. Kept in memory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeReport {
    pub episode: EpisodeId,
    pub devices: DeviceSet,
    pub succeeded: bool,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Everything the presentation layer needs to render the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Snapshot {
    pub state: WorkflowState,
    pub devices: Vec<DeviceDescriptor>,
    pub selection: Option<String>,
    pub status: Option<Status>,
    pub last_episode: Option<EpisodeReport>,
}

impl Snapshot {
    pub fn selected_device(&self) -> Option<&DeviceDescriptor> {
        let name = self.selection.as_deref()?;
        self.devices.iter().find(|d| d.device_name == name)
    }

    pub fn is_erasing(&self) -> bool {
        self.state.is_erasing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_set_dedups_and_keeps_order() {
        let set = DeviceSet::new(["/dev/sdb", "/dev/sda", "/dev/sdb"]).unwrap();
        assert_eq!(set.names(), ["/dev/sdb", "/dev/sda"]);
        assert_eq!(set.to_string(), "/dev/sdb, /dev/sda");
        assert!(set.contains("/dev/sda"));
    }

    #[test]
    fn device_set_rejects_empty() {
        assert!(DeviceSet::new(Vec::<String>::new()).is_none());
    }

    #[test]
    fn descriptor_uses_wire_field_names() {
        let device = DeviceDescriptor::new("sda", "X", DeviceType::Hdd, "SATA");
        let json = serde_json::to_value(&device).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "device_name": "sda",
                "model": "X",
                "device_type": "HDD",
                "transport": "SATA"
            })
        );
    }

    #[test]
    fn unrecognised_device_type_parses_as_unknown() {
        let json = r#"{"device_name":"sdz","model":"?","device_type":"Tape","transport":"SAS"}"#;
        let device: DeviceDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(device.device_type, DeviceType::Unknown);
    }

    #[test]
    fn selected_device_resolves_against_list() {
        let snapshot = Snapshot {
            devices: vec![DeviceDescriptor::new("sda", "X", DeviceType::Ssd, "SATA")],
            selection: Some("sda".into()),
            ..Default::default()
        };

        assert_eq!(snapshot.selected_device().map(|d| d.model.as_str()), Some("X"));
    }
}
