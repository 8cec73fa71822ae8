//! Textual scene context for a chat collaborator

use crate::processing::{DetectionSnapshot, SnapshotSubscription};
use crate::vocabulary::ColorLabel;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const NOTHING: &str = "nothing";

/// Short description of what is currently in view, e.g. `"2 red car, 1 white chair"`.
pub struct SceneContext {
    context: RwLock<String>,
}

impl SceneContext {
    pub fn new() -> Self {
        Self {
            context: RwLock::new(NOTHING.to_string()),
        }
    }

    /// Counts per (color, label) in first-seen order.
    pub fn describe(snapshot: &DetectionSnapshot) -> String {
        if snapshot.is_empty() {
            return NOTHING.to_string();
        }

        let mut groups: Vec<(ColorLabel, &str, usize)> = Vec::new();
        let mut index: HashMap<(ColorLabel, &str), usize> = HashMap::new();
        for detection in snapshot.iter() {
            let key = (detection.color, detection.label.as_str());
            match index.get(&key) {
                Some(&slot) => groups[slot].2 += 1,
                None => {
                    index.insert(key, groups.len());
                    groups.push((key.0, key.1, 1));
                }
            }
        }

        groups
            .iter()
            .map(|(color, label, count)| format!("{} {} {}", count, color, label))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn update(&self, snapshot: &DetectionSnapshot) {
        let description = Self::describe(snapshot);
        debug!("Scene context for frame {}: {}", snapshot.frame_id, description);
        *self.context.write() = description;
    }

    pub fn context(&self) -> String {
        self.context.read().clone()
    }

    /// Whether anything has been observed.
    pub fn is_ready(&self) -> bool {
        let context = self.context.read();
        !context.is_empty() && context.as_str() != NOTHING
    }

    /// Apply every snapshot from `subscription` until the aggregator is dropped.
    pub async fn follow(self: Arc<Self>, mut subscription: SnapshotSubscription) {
        while let Some(snapshot) = subscription.next().await {
            self.update(&snapshot);
        }
        debug!("Scene context subscription closed");
    }
}

impl Default for SceneContext {
    fn default() -> Self {
        Self::new()
    }
}
