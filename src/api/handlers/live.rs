//! Live feed: every ingested record is pushed to WebSocket subscribers

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::AppState;
use crate::types::SensorRecord;

/// Broadcast fan-out of serialized records.
///
/// Records are serialized once on publish. A subscriber that falls more
/// than `capacity` messages behind is told how many it missed and resumes
/// from the oldest message still buffered.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    tx: broadcast::Sender<String>,
}

impl LiveFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Push a record to all current subscribers; returns how many received it.
    pub fn publish(&self, record: &SensorRecord) -> usize {
        match serde_json::to_string(record) {
            Ok(json) => self.tx.send(json).unwrap_or(0),
            Err(e) => {
                warn!(id = record.id, error = %e, "Failed to serialize record for live feed");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Notice sent in place of the records a slow subscriber missed.
fn lagged_notice(missed: u64) -> String {
    serde_json::json!({ "type": "lagged", "missed": missed }).to_string()
}

/// GET /ws - Upgrade to a WebSocket that receives every new record as JSON text
pub async fn live_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let rx = state.live.subscribe();
    ws.on_upgrade(move |socket| stream_records(socket, rx))
}

async fn stream_records(socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    let (mut sender, mut receiver) = socket.split();
    debug!("Live subscriber connected");

    let mut send_task = tokio::spawn(async move {
        loop {
            let text = match rx.recv().await {
                Ok(text) => text,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Live subscriber lagging, skipped records");
                    lagged_notice(missed)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Client messages are ignored; reading only detects the close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    debug!("Live subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskScorer;
    use crate::types::SensorReading;
    use chrono::{FixedOffset, TimeZone};

    fn record(id: u64) -> SensorRecord {
        let reading = SensorReading {
            moisture: 700.0,
            accel_x: 5.0,
            accel_y: 3.0,
            accel_z: 9.8,
            gyro_x: 0.0,
            gyro_y: 0.0,
            gyro_z: 0.0,
            vibration_raw: 1.2,
            created_at: FixedOffset::east_opt(9 * 3600)
                .unwrap()
                .with_ymd_and_hms(2025, 11, 3, 10, 0, 0)
                .unwrap(),
        };
        let eval = RiskScorer::default().evaluate(&reading).unwrap();
        SensorRecord::new(id, &reading, &eval)
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let feed = LiveFeed::new(8);
        let mut rx = feed.subscribe();
        assert_eq!(feed.publish(&record(1)), 1);

        let json: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["risk_level"], 1);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let feed = LiveFeed::new(8);
        assert_eq!(feed.publish(&record(1)), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_then_resumes() {
        let feed = LiveFeed::new(2);
        let mut rx = feed.subscribe();
        for id in 1..=4 {
            feed.publish(&record(id));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        let json: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(json["id"], 3);
    }

    #[test]
    fn test_lagged_notice_shape() {
        let v: serde_json::Value = serde_json::from_str(&lagged_notice(5)).unwrap();
        assert_eq!(v["type"], "lagged");
        assert_eq!(v["missed"], 5);
    }
}
