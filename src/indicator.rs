//! Status indicator patterns.
//!
//! Maps [`StatusEvent`]s to the LED patterns an indicator driver should
//! render. The gateway ships a logging indicator only; hardware drivers
//! subscribe to the same bus.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::domain::StatusEvent;

/// Colour of the RGB pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Red.
    Red,
    /// Green.
    Green,
    /// Blue.
    Blue,
}

/// A pattern for the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorPattern {
    /// Slow fade in and out.
    Breathing(Color),
    /// A fixed number of blinks, then off.
    Blink {
        /// Blink colour.
        color: Color,
        /// Number of blinks.
        times: u8,
    },
    /// Looping gradient between two colours.
    Gradient {
        /// Start colour.
        from: Color,
        /// End colour.
        to: Color,
    },
    /// Steady on.
    Solid(Color),
    /// One short pulse signalling traffic.
    Pulse(Color),
}

/// Pattern for `event`, or `None` if the event leaves the indicator as is.
#[must_use]
pub const fn pattern_for(event: &StatusEvent) -> Option<IndicatorPattern> {
    match event {
        StatusEvent::WifiConnecting { .. } => Some(IndicatorPattern::Breathing(Color::Blue)),
        StatusEvent::WifiConnected { .. } => Some(IndicatorPattern::Blink {
            color: Color::Blue,
            times: 3,
        }),
        StatusEvent::WifiFailed { .. } | StatusEvent::WifiLost { .. } | StatusEvent::ServerDown { .. } => {
            Some(IndicatorPattern::Solid(Color::Red))
        }
        StatusEvent::ServerListening { .. } => Some(IndicatorPattern::Solid(Color::Green)),
        StatusEvent::CommandReceived { .. } => Some(IndicatorPattern::Pulse(Color::Green)),
        StatusEvent::TelemetrySent { .. } => Some(IndicatorPattern::Pulse(Color::Blue)),
        StatusEvent::ClientConnected { .. }
        | StatusEvent::ClientRejected { .. }
        | StatusEvent::ClientDisconnected { .. }
        | StatusEvent::TelemetryDropped { .. } => None,
    }
}

/// Pattern shown between the WiFi join and the server coming up.
pub const STARTING_SERVER: IndicatorPattern = IndicatorPattern::Gradient {
    from: Color::Blue,
    to: Color::Green,
};

/// Logs every pattern change until the bus closes.
pub async fn run_log_indicator(mut events: broadcast::Receiver<StatusEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(n)) => {
                tracing::warn!(lagged = n, "indicator lagged behind status bus");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Some(pattern) = pattern_for(&event) else {
            continue;
        };
        // traffic pulses are too frequent for info
        if matches!(pattern, IndicatorPattern::Pulse(_)) {
            tracing::trace!(event = event.event_type_str(), ?pattern, "indicator");
        } else {
            tracing::info!(event = event.event_type_str(), ?pattern, "indicator");
        }
        if matches!(event, StatusEvent::WifiConnected { .. }) {
            tracing::info!(pattern = ?STARTING_SERVER, "indicator");
        }
    }
}
