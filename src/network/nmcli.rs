//! Host WiFi driver backed by NetworkManager's `nmcli`.

use std::net::IpAddr;
use std::time::Duration;

use tokio::process::Command;

use super::driver::{AccessPoint, LinkEvent, WifiDriver};
use crate::error::GatewayError;

/// [`WifiDriver`] that shells out to `nmcli`.
#[derive(Debug, Clone)]
pub struct NmcliDriver {
    interface: Option<String>,
    poll_interval: Duration,
}

impl NmcliDriver {
    /// Creates a driver for `interface` (or NetworkManager's default
    /// device), polling link state every `poll_interval`.
    #[must_use]
    pub fn new(interface: Option<String>, poll_interval: Duration) -> Self {
        Self {
            interface,
            poll_interval,
        }
    }

    fn with_ifname(&self, mut args: Vec<String>) -> Vec<String> {
        if let Some(ifname) = &self.interface {
            args.push("ifname".to_string());
            args.push(ifname.clone());
        }
        args
    }

    /// Arguments for joining `ap`. An open network gets no `password`
    /// pair, since nmcli rejects an empty one.
    fn connect_args(&self, ap: &AccessPoint, password: &str) -> Vec<String> {
        let mut args: Vec<String> = ["device", "wifi", "connect", ap.ssid.as_str()]
            .map(String::from)
            .to_vec();
        if !password.is_empty() {
            args.push("password".to_string());
            args.push(password.to_string());
        }
        if let Some(bssid) = &ap.bssid {
            args.push("bssid".to_string());
            args.push(bssid.clone());
        }
        self.with_ifname(args)
    }

    async fn address(&self) -> Option<IpAddr> {
        let ifname = self.interface.as_deref()?;
        let out = run(&["-g", "IP4.ADDRESS", "device", "show", ifname]).await.ok()?;
        out.lines()
            .next()
            .and_then(|line| line.split('/').next())
            .and_then(|ip| ip.trim().parse().ok())
    }
}

impl WifiDriver for NmcliDriver {
    async fn scan(&self) -> Result<Vec<AccessPoint>, GatewayError> {
        let args = self.with_ifname(
            ["-t", "-f", "SSID,BSSID,SIGNAL,CHAN", "device", "wifi", "list", "--rescan", "yes"]
                .map(String::from)
                .to_vec(),
        );
        let out = run(&args).await?;
        Ok(out.lines().filter_map(parse_scan_line).collect())
    }

    async fn connect(&self, ap: &AccessPoint, password: &str) -> Result<LinkEvent, GatewayError> {
        match run(&self.connect_args(ap, password)).await {
            Ok(_) => Ok(LinkEvent::GotAddress(self.address().await)),
            Err(GatewayError::Wifi(reason)) => Ok(LinkEvent::Disconnected { reason }),
            Err(e) => Err(e),
        }
    }

    async fn signal_strength(&self) -> Option<i32> {
        let out = run(&["-t", "-f", "ACTIVE,SIGNAL", "device", "wifi"]).await.ok()?;
        out.lines().find_map(|line| {
            let fields = split_terse(line);
            match fields.as_slice() {
                [active, signal] if active == "yes" => signal.parse().ok().map(percent_to_dbm),
                _ => None,
            }
        })
    }

    async fn wait_link_loss(&self) {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            match run(&["-t", "-f", "STATE", "general"]).await {
                Ok(state) if state.trim().starts_with("connected") => {}
                Ok(state) => {
                    tracing::debug!(state = %state.trim(), "networkmanager reports link down");
                    return;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "nmcli state query failed");
                    return;
                }
            }
        }
    }
}

/// Runs `nmcli` and returns stdout. A non-zero exit becomes
/// [`GatewayError::Wifi`] carrying stderr.
async fn run<S: AsRef<str>>(args: &[S]) -> Result<String, GatewayError> {
    let output = Command::new("nmcli")
        .args(args.iter().map(AsRef::as_ref))
        .output()
        .await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(GatewayError::Wifi(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

/// Splits an `nmcli -t` line on unescaped `:` and unescapes `\:` / `\\`.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn parse_scan_line(line: &str) -> Option<AccessPoint> {
    let fields = split_terse(line);
    let [ssid, bssid, signal, chan] = fields.as_slice() else {
        return None;
    };
    if ssid.is_empty() {
        return None;
    }
    Some(AccessPoint {
        ssid: ssid.clone(),
        bssid: Some(bssid.clone()).filter(|b| !b.is_empty()),
        signal_strength: percent_to_dbm(signal.parse().ok()?),
        channel: chan.parse().ok(),
    })
}

/// NetworkManager reports quality in percent; map it onto the usual
/// -100..-50 dBm range.
fn percent_to_dbm(percent: i32) -> i32 {
    percent.clamp(0, 100) / 2 - 100
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn lab_ap(bssid: Option<&str>) -> AccessPoint {
        AccessPoint {
            ssid: "lab".to_string(),
            bssid: bssid.map(str::to_string),
            signal_strength: -60,
            channel: Some(6),
        }
    }

    #[test]
    fn open_network_omits_password() {
        let driver = NmcliDriver::new(None, Duration::from_secs(1));
        assert_eq!(
            driver.connect_args(&lab_ap(None), ""),
            vec!["device", "wifi", "connect", "lab"]
        );
    }

    #[test]
    fn secured_network_passes_password_bssid_and_ifname() {
        let driver = NmcliDriver::new(Some("wlan0".to_string()), Duration::from_secs(1));
        assert_eq!(
            driver.connect_args(&lab_ap(Some("AA:BB:CC:DD:EE:FF")), "secret"),
            vec![
                "device", "wifi", "connect", "lab", "password", "secret", "bssid",
                "AA:BB:CC:DD:EE:FF", "ifname", "wlan0",
            ]
        );
    }

    #[test]
    fn terse_split_handles_escaped_colons() {
        let fields = split_terse(r"lab:AA\:BB\:CC\:DD\:EE\:FF:72:6");
        assert_eq!(fields, vec!["lab", "AA:BB:CC:DD:EE:FF", "72", "6"]);
    }

    #[test]
    fn scan_line_parses() {
        let Some(ap) = parse_scan_line(r"WPS School:11\:22\:33\:44\:55\:66:80:11") else {
            panic!("line should parse");
        };
        assert_eq!(ap.ssid, "WPS School");
        assert_eq!(ap.bssid.as_deref(), Some("11:22:33:44:55:66"));
        assert_eq!(ap.signal_strength, -60);
        assert_eq!(ap.channel, Some(11));
    }

    #[test]
    fn hidden_networks_are_skipped() {
        assert!(parse_scan_line(r":11\:22\:33\:44\:55\:66:80:11").is_none());
        assert!(parse_scan_line("garbage").is_none());
    }

    #[test]
    fn percent_maps_to_dbm() {
        assert_eq!(percent_to_dbm(100), -50);
        assert_eq!(percent_to_dbm(0), -100);
        assert_eq!(percent_to_dbm(150), -50);
    }
}
