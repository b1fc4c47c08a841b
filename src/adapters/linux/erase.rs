//! Per-device erase methods and the external commands that carry them out.

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::EraseConfig;
use crate::core::{DeviceDescriptor, DeviceType};

/// How a single device gets destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMethod {
    /// Multi-pass `dd` overwrite for rotating media.
    Overwrite { passes: u32 },
    /// ATA security erase through hdparm (SATA flash).
    AtaSecureErase,
    /// NVMe format with user-data secure erase.
    NvmeFormat,
    /// Single zero pass for flash behind bridges that pass no security commands.
    ZeroFill,
    /// Type could not be determined; the device is skipped.
    Unsupported,
}

impl EraseMethod {
    pub fn for_device(device: &DeviceDescriptor, passes: u32) -> Self {
        match device.device_type {
            DeviceType::Hdd => Self::Overwrite { passes },
            DeviceType::Ssd if device.device_name.starts_with("/dev/nvme") => Self::NvmeFormat,
            DeviceType::Ssd => match device.transport.as_str() {
                "SATA" => Self::AtaSecureErase,
                "NVME" => Self::NvmeFormat,
                _ => Self::ZeroFill,
            },
            DeviceType::Unknown => Self::Unsupported,
        }
    }
}

/// Data source for one overwrite pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Random,
    Zero,
}

impl Pattern {
    pub fn source(&self) -> &'static str {
        match self {
            Self::Random => "/dev/urandom",
            Self::Zero => "/dev/zero",
        }
    }
}

/// Random and zero passes alternate, starting and (for odd counts) ending
/// with random data.
pub fn pass_patterns(passes: u32) -> Vec<Pattern> {
    (0..passes)
        .map(|i| if i % 2 == 0 { Pattern::Random } else { Pattern::Zero })
        .collect()
}

/// Executes an [`EraseMethod`] against one device.
pub struct DeviceEraser<'a> {
    pub device: &'a DeviceDescriptor,
    pub config: &'a EraseConfig,
}

impl DeviceEraser<'_> {
    pub async fn run(&self, method: EraseMethod) -> Result<()> {
        info!(method = ?method, "Erase method chosen");

        match method {
            EraseMethod::Overwrite { passes } => self.overwrite(&pass_patterns(passes)).await,
            EraseMethod::AtaSecureErase => self.ata_secure_erase().await,
            EraseMethod::NvmeFormat => self.nvme_format().await,
            EraseMethod::ZeroFill => self.overwrite(&[Pattern::Zero]).await,
            EraseMethod::Unsupported => bail!(
                "unknown device type {}, skipped",
                self.device.device_type
            ),
        }
    }

    async fn overwrite(&self, patterns: &[Pattern]) -> Result<()> {
        let path = &self.device.device_name;
        let size = self.device_size().await?;
        let block_size = self.config.block_size_mib * 1024 * 1024;
        let total = patterns.len();

        for (i, pattern) in patterns.iter().enumerate() {
            info!(pass = i + 1, passes = total, pattern = ?pattern, "Overwrite pass started");

            run(
                "dd",
                &[
                    &format!("if={}", pattern.source()),
                    &format!("of={path}"),
                    &format!("bs={block_size}"),
                    &format!("count={size}"),
                    "iflag=fullblock,count_bytes",
                    "oflag=direct",
                    "conv=fsync",
                ],
            )
            .await
            .with_context(|| format!("pass {}/{} failed", i + 1, total))?;

            info!(pass = i + 1, passes = total, "Overwrite pass complete");
        }

        Ok(())
    }

    async fn device_size(&self) -> Result<u64> {
        let stdout = run("blockdev", &["--getsize64", &self.device.device_name]).await?;
        let size: u64 = stdout
            .trim()
            .parse()
            .with_context(|| format!("unexpected blockdev output: {:?}", stdout.trim()))?;

        if size == 0 {
            bail!("device reports a size of zero");
        }
        Ok(size)
    }

    async fn ata_secure_erase(&self) -> Result<()> {
        let path = self.device.device_name.as_str();
        let password = self.config.ata_password.as_str();

        run(
            "hdparm",
            &["--user-master", "u", "--security-set-pass", password, path],
        )
        .await
        .context("setting the ATA security password failed")?;

        let enhanced = run(
            "hdparm",
            &["--user-master", "u", "--security-erase-enhanced", password, path],
        )
        .await;

        match enhanced {
            Ok(_) => {
                info!("Enhanced secure erase complete");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Enhanced secure erase unavailable, using normal secure erase");
                run(
                    "hdparm",
                    &["--user-master", "u", "--security-erase", password, path],
                )
                .await
                .context("ATA secure erase failed")?;
                info!("Secure erase complete");
                Ok(())
            }
        }
    }

    async fn nvme_format(&self) -> Result<()> {
        run("nvme", &["format", "--ses=1", &self.device.device_name])
            .await
            .context("NVMe format failed")?;
        info!("NVMe format complete");
        Ok(())
    }
}

/// Run a command to completion, returning stdout or failing with stderr.
async fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("failed to spawn {program}"))?;

    if !output.status.success() {
        bail!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
