use crate::error::Error;
use crate::messaging::event::AlertNotification;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Group every dashboard socket joins
pub const ALERTS_GROUP: &str = "alerts";

/// Publishing side of the broadcast gateway
#[async_trait]
pub trait AlertBroadcaster: Send + Sync {
    /// Deliver an alert to current subscribers. Returns how many received it.
    async fn broadcast_alert(&self, notification: &AlertNotification) -> Result<usize>;
}

/// Membership handle returned by [`ChannelLayer::group_add`]
#[derive(Debug)]
pub struct Subscription {
    pub channel_id: Uuid,
    pub group: String,
    pub receiver: mpsc::UnboundedReceiver<String>,
}

type Members = HashMap<Uuid, mpsc::UnboundedSender<String>>;

/// In-process publish/subscribe registry keyed by group name.
///
/// Delivery is fire-and-forget: a message reaches the members present at the
/// time of the send and is not kept for anyone joining later.
#[derive(Default)]
pub struct ChannelLayer {
    groups: RwLock<HashMap<String, Members>>,
}

impl ChannelLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `group` with a fresh channel
    pub async fn group_add(&self, group: &str) -> Subscription {
        let channel_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        self.groups
            .write()
            .await
            .entry(group.to_string())
            .or_default()
            .insert(channel_id, tx);

        info!("Channel {} joined group '{}'", channel_id, group);

        Subscription {
            channel_id,
            group: group.to_string(),
            receiver: rx,
        }
    }

    /// Leave `group`. Returns false if the channel was not a member.
    pub async fn group_discard(&self, group: &str, channel_id: &Uuid) -> bool {
        let mut groups = self.groups.write().await;
        let Some(members) = groups.get_mut(group) else {
            return false;
        };

        let removed = members.remove(channel_id).is_some();
        if members.is_empty() {
            groups.remove(group);
        }
        if removed {
            info!("Channel {} left group '{}'", channel_id, group);
        }
        removed
    }

    /// Number of channels currently in `group`
    pub async fn group_size(&self, group: &str) -> usize {
        self.groups
            .read()
            .await
            .get(group)
            .map_or(0, HashMap::len)
    }

    /// Serialize `message` once and send it to every member of `group`.
    /// Members whose receiver is gone are pruned.
    pub async fn group_send<T: Serialize + ?Sized>(&self, group: &str, message: &T) -> Result<usize> {
        let payload = serde_json::to_string(message)
            .map_err(|e| Error::Serialization(format!("Failed to encode group message: {}", e)))?;

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let groups = self.groups.read().await;
            if let Some(members) = groups.get(group) {
                for (id, tx) in members {
                    if tx.send(payload.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        closed.push(*id);
                    }
                }
            }
        }

        for id in &closed {
            warn!("Dropping closed channel {} from group '{}'", id, group);
            self.group_discard(group, id).await;
        }

        debug!("Sent message to {} member(s) of group '{}'", delivered, group);

        Ok(delivered)
    }
}

#[async_trait]
impl AlertBroadcaster for ChannelLayer {
    async fn broadcast_alert(&self, notification: &AlertNotification) -> Result<usize> {
        self.group_send(ALERTS_GROUP, notification).await
    }
}
