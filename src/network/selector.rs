//! Candidate ranking and the WiFi join state machine.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use super::driver::{AccessPoint, LinkEvent, NetworkCandidate, WifiDriver};
use super::{Connectivity, ConnectivityState};
use crate::domain::{StatusBus, StatusEvent};

/// Picks the network to join.
///
/// Candidates are searched in priority order: every access point matching
/// the first candidate is considered (strongest wins, first-seen on ties)
/// before the next candidate is looked at. Returns `None` when no
/// candidate is visible.
#[must_use]
pub fn select_network<'a>(
    candidates: &'a [NetworkCandidate],
    scan: &'a [AccessPoint],
) -> Option<(&'a NetworkCandidate, &'a AccessPoint)> {
    candidates.iter().find_map(|candidate| {
        scan.iter()
            .filter(|ap| ap.ssid == candidate.ssid)
            .fold(None::<&AccessPoint>, |best, ap| match best {
                Some(b) if b.signal_strength >= ap.signal_strength => Some(b),
                _ => Some(ap),
            })
            .map(|ap| (candidate, ap))
    })
}

/// Joins the best visible candidate network and publishes the outcome.
///
/// The selector owns the `Disconnected → Connecting → Connected | Failed`
/// transitions of [`Connectivity`]. Reconnecting after a lost link is left
/// to higher-level logic; the selector only reports the loss.
#[derive(Debug)]
pub struct NetworkSelector<D> {
    driver: Arc<D>,
    candidates: Vec<NetworkCandidate>,
    max_retry: u32,
    retries: AtomicU32,
    connectivity: Connectivity,
    bus: StatusBus,
}

impl<D> NetworkSelector<D>
where
    D: WifiDriver + 'static,
{
    /// Creates a selector over `candidates`, tolerating `max_retry`
    /// disconnect events per join.
    #[must_use]
    pub fn new(
        driver: Arc<D>,
        candidates: Vec<NetworkCandidate>,
        max_retry: u32,
        connectivity: Connectivity,
        bus: StatusBus,
    ) -> Self {
        Self {
            driver,
            candidates,
            max_retry,
            retries: AtomicU32::new(0),
            connectivity,
            bus,
        }
    }

    /// Reconnect attempts made since the last successful join.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Shared connectivity handle updated by this selector.
    #[must_use]
    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Scans once, joins the best candidate and waits for the outcome.
    ///
    /// Returns `Failed` without blocking when nothing is configured or
    /// nothing suitable is visible.
    pub async fn join(&self) -> ConnectivityState {
        if self.candidates.is_empty() {
            return self.fail("no candidate networks configured");
        }

        self.connectivity.set(ConnectivityState::Connecting);
        tracing::info!(candidates = self.candidates.len(), "scanning for target networks");

        let scan = match self.driver.scan().await {
            Ok(scan) => scan,
            Err(e) => return self.fail(&format!("scan failed: {e}")),
        };
        if scan.is_empty() {
            return self.fail("no access point found during scan");
        }

        let Some((candidate, ap)) = select_network(&self.candidates, &scan) else {
            return self.fail("no candidate network visible");
        };
        tracing::info!(ssid = %ap.ssid, rssi = ap.signal_strength, "best access point found");
        let _ = self.bus.publish(StatusEvent::WifiConnecting {
            ssid: ap.ssid.clone(),
            signal_strength: ap.signal_strength,
            timestamp: Utc::now(),
        });

        loop {
            let reason = match self.driver.connect(ap, &candidate.password).await {
                Ok(LinkEvent::GotAddress(address)) => {
                    self.retries.store(0, Ordering::Relaxed);
                    self.connectivity.set_signal_strength(Some(ap.signal_strength));
                    self.connectivity.set(ConnectivityState::Connected);
                    tracing::info!(ssid = %ap.ssid, address = ?address, "connected to access point");
                    let _ = self.bus.publish(StatusEvent::WifiConnected {
                        ssid: ap.ssid.clone(),
                        address: address.map(|a| a.to_string()),
                        timestamp: Utc::now(),
                    });
                    return ConnectivityState::Connected;
                }
                Ok(LinkEvent::Disconnected { reason }) => reason,
                Err(e) => e.to_string(),
            };

            let attempt = self.retries.load(Ordering::Relaxed);
            if attempt >= self.max_retry {
                return self.fail(&format!("failed to connect to {}: {reason}", ap.ssid));
            }
            self.retries.store(attempt + 1, Ordering::Relaxed);
            tracing::info!(ssid = %ap.ssid, attempt = attempt + 1, %reason, "retrying connection to access point");
        }
    }

    /// Watches an established link: refreshes the live signal strength every
    /// `refresh` and flips the state to `Disconnected` on link loss.
    pub fn spawn_link_monitor(&self, refresh: Duration) -> JoinHandle<()> {
        let driver = Arc::clone(&self.driver);
        let connectivity = self.connectivity.clone();
        let bus = self.bus.clone();

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(refresh);
            let loss = driver.wait_link_loss();
            tokio::pin!(loss);

            loop {
                tokio::select! {
                    () = &mut loss => {
                        if connectivity.state() == ConnectivityState::Connected {
                            connectivity.set(ConnectivityState::Disconnected);
                            connectivity.set_signal_strength(None);
                            let _ = bus.publish(StatusEvent::WifiLost { timestamp: Utc::now() });
                        }
                        tracing::warn!("wifi link lost");
                        break;
                    }
                    _ = tick.tick() => {
                        if let Some(rssi) = driver.signal_strength().await {
                            connectivity.set_signal_strength(Some(rssi));
                        }
                    }
                }
            }
        })
    }

    fn fail(&self, reason: &str) -> ConnectivityState {
        tracing::warn!(%reason, "wifi join failed; command server will not start");
        self.connectivity.set(ConnectivityState::Failed);
        let _ = self.bus.publish(StatusEvent::WifiFailed {
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        ConnectivityState::Failed
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::sync::Notify;

    use super::*;
    use crate::error::GatewayError;

    fn ap(ssid: &str, rssi: i32) -> AccessPoint {
        AccessPoint {
            ssid: ssid.to_string(),
            bssid: None,
            signal_strength: rssi,
            channel: None,
        }
    }

    fn candidates() -> Vec<NetworkCandidate> {
        vec![
            NetworkCandidate::new("primary", "p1"),
            NetworkCandidate::new("backup", "p2"),
        ]
    }

    #[derive(Debug, Default)]
    struct ScriptedDriver {
        scan: Vec<AccessPoint>,
        events: Mutex<VecDeque<LinkEvent>>,
        connects: Mutex<Vec<(String, String)>>,
        lost: Notify,
    }

    impl ScriptedDriver {
        fn new(scan: Vec<AccessPoint>, events: Vec<LinkEvent>) -> Self {
            Self {
                scan,
                events: Mutex::new(events.into()),
                ..Self::default()
            }
        }

        fn connects(&self) -> Vec<(String, String)> {
            self.connects.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    impl WifiDriver for ScriptedDriver {
        async fn scan(&self) -> Result<Vec<AccessPoint>, GatewayError> {
            Ok(self.scan.clone())
        }

        async fn connect(&self, ap: &AccessPoint, password: &str) -> Result<LinkEvent, GatewayError> {
            if let Ok(mut c) = self.connects.lock() {
                c.push((ap.ssid.clone(), password.to_string()));
            }
            let next = self.events.lock().ok().and_then(|mut e| e.pop_front());
            Ok(next.unwrap_or(LinkEvent::Disconnected {
                reason: "no beacon".to_string(),
            }))
        }

        async fn signal_strength(&self) -> Option<i32> {
            Some(-42)
        }

        async fn wait_link_loss(&self) {
            self.lost.notified().await;
        }
    }

    fn selector(driver: ScriptedDriver, max_retry: u32) -> (NetworkSelector<ScriptedDriver>, Arc<ScriptedDriver>) {
        let driver = Arc::new(driver);
        let sel = NetworkSelector::new(
            Arc::clone(&driver),
            candidates(),
            max_retry,
            Connectivity::new(),
            StatusBus::new(16),
        );
        (sel, driver)
    }

    #[test]
    fn strongest_first_candidate_wins() {
        let scan = [ap("backup", -30), ap("primary", -70), ap("primary", -50)];
        let cands = candidates();
        let Some((cand, best)) = select_network(&cands, &scan) else {
            panic!("expected a match");
        };
        assert_eq!(cand.ssid, "primary");
        assert_eq!(best.signal_strength, -50);
    }

    #[test]
    fn second_candidate_used_only_when_first_absent() {
        let scan = [ap("other", -20), ap("backup", -80), ap("backup", -60)];
        let cands = candidates();
        let Some((cand, best)) = select_network(&cands, &scan) else {
            panic!("expected a match");
        };
        assert_eq!(cand.ssid, "backup");
        assert_eq!(best.signal_strength, -60);
    }

    #[test]
    fn ties_resolve_to_first_seen() {
        let mut first = ap("primary", -55);
        first.bssid = Some("aa".to_string());
        let mut second = ap("primary", -55);
        second.bssid = Some("bb".to_string());
        let scan = [first, second];
        let cands = candidates();
        let Some((_, best)) = select_network(&cands, &scan) else {
            panic!("expected a match");
        };
        assert_eq!(best.bssid.as_deref(), Some("aa"));
    }

    #[test]
    fn nothing_visible_selects_nothing() {
        assert!(select_network(&candidates(), &[ap("cafe", -40)]).is_none());
        assert!(select_network(&[], &[ap("primary", -40)]).is_none());
    }

    #[tokio::test]
    async fn join_connects_with_matching_password() {
        let driver = ScriptedDriver::new(
            vec![ap("backup", -40)],
            vec![LinkEvent::GotAddress(None)],
        );
        let (sel, driver) = selector(driver, 3);

        assert_eq!(sel.join().await, ConnectivityState::Connected);
        assert_eq!(sel.connectivity().state(), ConnectivityState::Connected);
        assert_eq!(sel.connectivity().signal_strength(), Some(-40));
        assert_eq!(driver.connects(), vec![("backup".to_string(), "p2".to_string())]);
    }

    #[tokio::test]
    async fn join_retries_then_resets_counter() {
        let lost = || LinkEvent::Disconnected {
            reason: "auth timeout".to_string(),
        };
        let driver = ScriptedDriver::new(
            vec![ap("primary", -40)],
            vec![lost(), lost(), LinkEvent::GotAddress(None)],
        );
        let (sel, driver) = selector(driver, 5);

        assert_eq!(sel.join().await, ConnectivityState::Connected);
        assert_eq!(driver.connects().len(), 3);
        assert_eq!(sel.retry_count(), 0);
    }

    #[tokio::test]
    async fn join_fails_after_retry_budget() {
        let driver = ScriptedDriver::new(vec![ap("primary", -40)], Vec::new());
        let (sel, driver) = selector(driver, 2);
        let mut events = sel.bus.subscribe();

        assert_eq!(sel.join().await, ConnectivityState::Failed);
        // initial attempt plus two retries
        assert_eq!(driver.connects().len(), 3);
        assert_eq!(sel.connectivity().state(), ConnectivityState::Failed);

        let Ok(first) = events.recv().await else {
            panic!("expected connecting event");
        };
        assert_eq!(first.event_type_str(), "wifi_connecting");
        let Ok(second) = events.recv().await else {
            panic!("expected failure event");
        };
        assert_eq!(second.event_type_str(), "wifi_failed");
    }

    #[tokio::test]
    async fn empty_scan_fails_without_connecting() {
        let (sel, driver) = selector(ScriptedDriver::new(Vec::new(), Vec::new()), 3);
        assert_eq!(sel.join().await, ConnectivityState::Failed);
        assert!(driver.connects().is_empty());
    }

    #[tokio::test]
    async fn no_candidates_fails_immediately() {
        let driver = Arc::new(ScriptedDriver::new(vec![ap("primary", -40)], Vec::new()));
        let sel = NetworkSelector::new(
            Arc::clone(&driver),
            Vec::new(),
            3,
            Connectivity::new(),
            StatusBus::new(4),
        );
        assert_eq!(sel.join().await, ConnectivityState::Failed);
        assert!(driver.connects().is_empty());
    }

    #[tokio::test]
    async fn link_monitor_reports_loss() {
        let driver = ScriptedDriver::new(
            vec![ap("primary", -40)],
            vec![LinkEvent::GotAddress(None)],
        );
        let (sel, driver) = selector(driver, 1);
        assert_eq!(sel.join().await, ConnectivityState::Connected);

        let monitor = sel.spawn_link_monitor(Duration::from_millis(10));
        driver.lost.notify_one();
        assert!(monitor.await.is_ok());
        assert_eq!(sel.connectivity().state(), ConnectivityState::Disconnected);
        assert_eq!(sel.connectivity().signal_strength(), None);
    }
}
