//! Per-topic polling: fetch, fingerprint, fan out.

use std::sync::Arc;
use std::time::Duration;

use tailswan_core::{
    ConnectionSnapshot, ControlError, Message, NodeSnapshot, PeerSnapshot, SaSnapshot, Topic,
};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::EventBroadcaster;
use crate::state_tracker::canonical_json;

impl EventBroadcaster {
    /// Poll one topic until `token` is cancelled.
    ///
    /// The first fetch happens one `period` after start. Ticks missed while a
    /// fetch is slow are skipped rather than bunched up.
    pub(crate) async fn poll_topic(
        self: Arc<Self>,
        topic: Topic,
        period: Duration,
        token: CancellationToken,
    ) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(period_ms = period.as_millis() as u64, "Poller started");
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let fetched = tokio::select! {
                biased;
                () = token.cancelled() => break,
                result = self.fetch(topic) => result,
            };

            let payload = match fetched {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Failed to fetch {}: {}", topic, e);
                    continue;
                }
            };

            if token.is_cancelled() {
                break;
            }
            if self.tracker.has_changed_payload(topic, &payload) {
                let delivered = self.broadcast(Message::new(topic, payload)).await;
                debug!(delivered, "Broadcast {} change", topic);
            }
        }
        debug!("Poller stopped");
    }

    /// Fetch the current snapshot for `topic` as canonical JSON.
    pub(crate) async fn fetch(&self, topic: Topic) -> Result<Vec<u8>, ControlError> {
        let payload = match topic {
            Topic::SecurityAssociations => {
                let sas = self.ipsec()?.list_sas().await?;
                canonical_json(&SaSnapshot::new(sas))?
            }
            Topic::Connections => {
                let connections = self.ipsec()?.list_connections().await?;
                canonical_json(&ConnectionSnapshot::new(connections))?
            }
            Topic::Peers => {
                let status = self.mesh()?.status().await?;
                canonical_json(&PeerSnapshot::from(&status))?
            }
            Topic::NodeStatus => {
                let status = self.mesh()?.status().await?;
                canonical_json(&NodeSnapshot::from(&status))?
            }
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tailswan_core::{JsonMap, MeshControl, MeshStatus, MeshUpOptions, PeerStatus, ServeConfig};

    use super::*;
    use crate::broadcast::BroadcasterConfig;

    struct FixedMesh(MeshStatus);

    #[async_trait]
    impl MeshControl for FixedMesh {
        async fn status(&self) -> Result<MeshStatus, ControlError> {
            Ok(self.0.clone())
        }
        async fn up(&self, _options: &MeshUpOptions) -> Result<(), ControlError> {
            Ok(())
        }
        async fn set_serve_config(&self, _config: &ServeConfig) -> Result<(), ControlError> {
            Ok(())
        }
        async fn serve_config(&self) -> Result<Option<ServeConfig>, ControlError> {
            Ok(None)
        }
    }

    fn peer(id: &str, host: &str) -> PeerStatus {
        PeerStatus {
            id: id.to_string(),
            host_name: host.to_string(),
            online: true,
            ..PeerStatus::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_without_ipsec_is_unavailable() {
        let broadcaster = EventBroadcaster::new(BroadcasterConfig::default());
        let err = broadcaster
            .fetch(Topic::SecurityAssociations)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Unavailable(_)));
        let err = broadcaster.fetch(Topic::Peers).await.unwrap_err();
        assert!(matches!(err, ControlError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_peers_is_sorted_and_canonical() {
        let mut peers = HashMap::new();
        peers.insert("nodekey:b".to_string(), peer("2", "beta"));
        peers.insert("nodekey:a".to_string(), peer("1", "alpha"));
        let status = MeshStatus {
            backend_state: "Running".to_string(),
            self_node: Some(peer("0", "tailswan")),
            peers: Some(peers),
        };
        let broadcaster = EventBroadcaster::new(BroadcasterConfig::default())
            .with_mesh(Arc::new(FixedMesh(status)));

        let payload = broadcaster.fetch(Topic::Peers).await.unwrap();
        let value: Value = serde_json::from_slice(&payload).unwrap();
        let hosts: Vec<&str> = value["peers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["hostname"].as_str().unwrap())
            .collect();
        assert_eq!(hosts, ["alpha", "beta"]);
        assert_eq!(value["self"]["HostName"], "tailswan");

        let node = broadcaster.fetch(Topic::NodeStatus).await.unwrap();
        let node: Value = serde_json::from_slice(&node).unwrap();
        assert_eq!(node["success"], true);
        assert_eq!(node["status"]["BackendState"], "Running");
    }

    #[test]
    fn test_sa_snapshot_shape() {
        let mut sa = JsonMap::new();
        sa.insert("site-a".to_string(), json!({"state": "ESTABLISHED"}));
        let payload = canonical_json(&SaSnapshot::new(vec![sa])).unwrap();
        assert_eq!(
            std::str::from_utf8(&payload).unwrap(),
            r#"{"sas":[{"site-a":{"state":"ESTABLISHED"}}],"success":true}"#
        );
    }
}
