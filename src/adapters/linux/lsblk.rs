//! Parsing of `lsblk -J` output into device descriptors.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::core::{DeviceDescriptor, DeviceType, EnumerationError};

/// Columns requested from lsblk, in `-o` syntax.
pub const LSBLK_COLUMNS: &str = "NAME,MODEL,TRAN,ROTA,TYPE";

static SSD_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ssd|solid|flash|nvme").expect("static regex"));
static HDD_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)hdd|hard ?drive|harddisk").expect("static regex"));

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    tran: Option<String>,
    #[serde(default)]
    rota: Option<Rotational>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// util-linux prints ROTA as a JSON bool since 2.33 and as "0"/"1" before.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Rotational {
    Flag(bool),
    Text(String),
}

impl Rotational {
    fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            Self::Text(text) => match text.trim() {
                "1" => Some(true),
                "0" => Some(false),
                _ => None,
            },
        }
    }
}

/// Turn `lsblk -d -J -o NAME,MODEL,TRAN,ROTA,TYPE` output into descriptors.
///
/// Only whole disks are kept; partitions, loop devices and optical drives are
/// not erase targets.
pub fn parse_lsblk(json: &str) -> Result<Vec<DeviceDescriptor>, EnumerationError> {
    let output: LsblkOutput =
        serde_json::from_str(json).map_err(|e| EnumerationError::Parse(e.to_string()))?;

    let devices = output
        .blockdevices
        .into_iter()
        .filter(|d| d.kind.as_deref().is_none_or(|kind| kind == "disk"))
        .map(|d| {
            let model = d
                .model
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("Disk {}", d.name));

            let transport = match d.tran.map(|t| t.trim().to_uppercase()) {
                Some(t) if !t.is_empty() => t,
                _ if d.name.starts_with("nvme") => "NVME".to_string(),
                _ => "UNKNOWN".to_string(),
            };

            let rotational = d.rota.as_ref().and_then(Rotational::as_bool);
            let device_type = classify(&d.name, &model, rotational);

            DeviceDescriptor {
                device_name: format!("/dev/{}", d.name),
                model,
                device_type,
                transport,
            }
        })
        .collect();

    Ok(devices)
}

/// Decide HDD vs SSD. NVMe namespaces are always flash; otherwise the kernel's
/// rotational flag wins, and the model name is the last resort.
pub fn classify(name: &str, model: &str, rotational: Option<bool>) -> DeviceType {
    if name.starts_with("nvme") {
        return DeviceType::Ssd;
    }

    match rotational {
        Some(true) => DeviceType::Hdd,
        Some(false) => DeviceType::Ssd,
        None if SSD_HINT.is_match(model) => DeviceType::Ssd,
        None if HDD_HINT.is_match(model) => DeviceType::Hdd,
        None => DeviceType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
       "blockdevices": [
          {"name":"sda", "model":"WDC WD20EZRZ-00Z5HB0", "tran":"sata", "rota":true, "type":"disk"},
          {"name":"sdb", "model":"Samsung SSD 860 EVO 500GB ", "tran":"sata", "rota":false, "type":"disk"},
          {"name":"nvme0n1", "model":"Samsung PM9A1", "tran":null, "rota":false, "type":"disk"},
          {"name":"sr0", "model":"DVD-RW", "tran":"sata", "rota":true, "type":"rom"},
          {"name":"loop0", "model":null, "tran":null, "rota":false, "type":"loop"}
       ]
    }"#;

    #[test]
    fn parses_disks_and_skips_other_types() {
        let devices = parse_lsblk(SAMPLE).unwrap();

        let names: Vec<_> = devices.iter().map(|d| d.device_name.as_str()).collect();
        assert_eq!(names, ["/dev/sda", "/dev/sdb", "/dev/nvme0n1"]);
    }

    #[test]
    fn normalises_model_and_transport() {
        let devices = parse_lsblk(SAMPLE).unwrap();

        assert_eq!(devices[0].transport, "SATA");
        assert_eq!(devices[0].device_type, DeviceType::Hdd);
        assert_eq!(devices[1].model, "Samsung SSD 860 EVO 500GB");
        assert_eq!(devices[1].device_type, DeviceType::Ssd);
        assert_eq!(devices[2].transport, "NVME");
        assert_eq!(devices[2].device_type, DeviceType::Ssd);
    }

    #[test]
    fn accepts_legacy_string_rota_and_missing_model() {
        let json = r#"{"blockdevices":[{"name":"sdc","rota":"1","type":"disk"}]}"#;

        let devices = parse_lsblk(json).unwrap();

        assert_eq!(devices[0].model, "Disk sdc");
        assert_eq!(devices[0].transport, "UNKNOWN");
        assert_eq!(devices[0].device_type, DeviceType::Hdd);
    }

    #[test]
    fn empty_listing_is_not_an_error() {
        assert!(parse_lsblk(r#"{"blockdevices":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_lsblk("NAME TRAN\nsda sata"),
            Err(EnumerationError::Parse(_))
        ));
    }

    #[test]
    fn model_name_breaks_ties_without_rota() {
        assert_eq!(classify("sdd", "Kingston Flash Drive", None), DeviceType::Ssd);
        assert_eq!(classify("sdd", "Generic Hard Drive", None), DeviceType::Hdd);
        assert_eq!(classify("sdd", "Generic Storage", None), DeviceType::Unknown);
    }
}
