use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::AdvanceGate;
use crate::config::BatteryMode;
use crate::error::GateReason;
use crate::events::{BatteryStatus, HostCommand};

/// Battery gate with a fixed charge threshold for
/// [`BatteryMode::BatteryAboveThreshold`]. A charging device always passes.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdGate {
    threshold: u8,
}

impl ThresholdGate {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold: threshold.min(100),
        }
    }
}

impl AdvanceGate for ThresholdGate {
    fn check(&self, mode: BatteryMode, status: BatteryStatus) -> Result<(), GateReason> {
        match mode {
            BatteryMode::ChargingOnly if status.charging => Ok(()),
            BatteryMode::ChargingOnly => Err(GateReason::NotCharging),
            BatteryMode::BatteryAboveThreshold
                if status.charging || status.level >= self.threshold =>
            {
                Ok(())
            }
            BatteryMode::BatteryAboveThreshold => Err(GateReason::BatteryBelowThreshold {
                level: status.level,
                threshold: self.threshold,
            }),
        }
    }
}

/// Reads a Linux power-supply directory such as `/sys/class/power_supply/BAT0`.
pub fn read_power_supply(dir: &Path) -> Result<BatteryStatus> {
    let capacity_path = dir.join("capacity");
    let capacity = fs::read_to_string(&capacity_path)
        .with_context(|| format!("failed to read {}", capacity_path.display()))?;
    let level: u8 = capacity
        .trim()
        .parse()
        .with_context(|| format!("invalid capacity value {:?}", capacity.trim()))?;

    let status_path = dir.join("status");
    let status = fs::read_to_string(&status_path)
        .with_context(|| format!("failed to read {}", status_path.display()))?;
    let charging = matches!(status.trim(), "Charging" | "Full");

    Ok(BatteryStatus {
        level: level.min(100),
        charging,
    })
}

/// Polls `dir` every `interval` and reports status changes to the slideshow.
pub async fn watch(
    dir: PathBuf,
    interval: Duration,
    initial: BatteryStatus,
    commands: Sender<HostCommand>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut last = initial;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let status = match read_power_supply(&dir) {
            Ok(status) => status,
            Err(err) => {
                warn!(error = ?err, "battery read failed");
                continue;
            }
        };
        if status == last {
            continue;
        }
        info!(level = status.level, charging = status.charging, "battery status changed");
        last = status;
        if commands.send(HostCommand::BatteryChanged(status)).await.is_err() {
            debug!("slideshow command channel closed");
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(level: u8, charging: bool) -> BatteryStatus {
        BatteryStatus { level, charging }
    }

    #[test]
    fn charging_only_requires_power() {
        let gate = ThresholdGate::new(50);
        assert!(gate.can_advance(BatteryMode::ChargingOnly, 10, true));
        assert_eq!(
            gate.check(BatteryMode::ChargingOnly, status(100, false)),
            Err(GateReason::NotCharging)
        );
    }

    #[test]
    fn threshold_mode_compares_level() {
        let gate = ThresholdGate::new(50);
        assert!(gate.can_advance(BatteryMode::BatteryAboveThreshold, 50, false));
        assert!(gate.can_advance(BatteryMode::BatteryAboveThreshold, 5, true));
        assert_eq!(
            gate.check(BatteryMode::BatteryAboveThreshold, status(49, false)),
            Err(GateReason::BatteryBelowThreshold {
                level: 49,
                threshold: 50
            })
        );
    }

    #[test]
    fn reads_sysfs_power_supply() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("capacity"), "73\n").unwrap();
        fs::write(dir.path().join("status"), "Discharging\n").unwrap();
        assert_eq!(read_power_supply(dir.path()).unwrap(), status(73, false));

        fs::write(dir.path().join("status"), "Full\n").unwrap();
        assert!(read_power_supply(dir.path()).unwrap().charging);
    }

    #[tokio::test(start_paused = true)]
    async fn watch_reports_only_changes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("capacity"), "80\n").unwrap();
        fs::write(dir.path().join("status"), "Charging\n").unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(watch(
            dir.path().to_path_buf(),
            Duration::from_secs(30),
            status(80, true),
            tx,
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(rx.try_recv().is_err());

        fs::write(dir.path().join("status"), "Discharging\n").unwrap();
        let changed = tokio::time::timeout(Duration::from_secs(60), rx.recv())
            .await
            .unwrap();
        assert!(matches!(
            changed,
            Some(HostCommand::BatteryChanged(s)) if s == status(80, false)
        ));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
