//! Per-frame detection snapshots and their subscribers

use crate::frame::PixelRect;
use crate::models::DetectionCandidate;
use crate::processing::projection::{Projection, RelativeDirection};
use crate::vocabulary::{ColorLabel, LabelVocabulary};
use chrono::{DateTime, Utc};
use nalgebra::Point3;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 16;

/// A detector box grounded in the scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub class_index: usize,
    pub label: String,
    pub confidence: f32,
    pub pixel_box: PixelRect,
    pub color: ColorLabel,
    /// Set together with `distance`, only when the ray hit something
    pub world_position: Option<Point3<f32>>,
    pub distance: Option<f32>,
    pub direction: RelativeDirection,
    pub surface: String,
}

impl Detection {
    pub fn new(
        candidate: &DetectionCandidate,
        label: String,
        pixel_box: PixelRect,
        color: ColorLabel,
        projection: Projection,
    ) -> Self {
        let (world_position, distance) = match (projection.world_position, projection.distance) {
            (Some(point), Some(distance)) => (Some(point), Some(distance)),
            _ => (None, None),
        };

        Self {
            class_index: candidate.class_index,
            label,
            confidence: candidate.confidence,
            pixel_box,
            color,
            world_position,
            distance,
            direction: projection.direction,
            surface: projection.surface,
        }
    }

    /// Whether navigation can target this detection.
    pub fn is_reachable(&self) -> bool {
        self.world_position.is_some()
    }
}

/// Immutable result of one processing cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSnapshot {
    pub frame_id: u64,
    pub timestamp: DateTime<Utc>,
    pub detections: Vec<Detection>,
}

impl DetectionSnapshot {
    pub fn new(frame_id: u64, detections: Vec<Detection>) -> Self {
        Self {
            frame_id,
            timestamp: Utc::now(),
            detections,
        }
    }

    pub fn empty(frame_id: u64) -> Self {
        Self::new(frame_id, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }
}

/// Assembles snapshots and holds the current one.
///
/// Readers get an `Arc` to an immutable snapshot; `publish` swaps the slot
/// and notifies subscribers in one step.
pub struct DetectionAggregator {
    current: RwLock<Arc<DetectionSnapshot>>,
    sender: broadcast::Sender<Arc<DetectionSnapshot>>,
    next_frame_id: AtomicU64,
}

impl DetectionAggregator {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            current: RwLock::new(Arc::new(DetectionSnapshot::empty(0))),
            sender,
            next_frame_id: AtomicU64::new(1),
        }
    }

    /// Build one detection per candidate, in candidate order.
    pub fn aggregate<C, P>(
        &self,
        candidates: &[DetectionCandidate],
        labels: &LabelVocabulary,
        image_size: (u32, u32),
        mut color_of: C,
        mut project_of: P,
    ) -> DetectionSnapshot
    where
        C: FnMut(&PixelRect) -> ColorLabel,
        P: FnMut(&PixelRect) -> Projection,
    {
        let frame_id = self.next_frame_id.fetch_add(1, Ordering::Relaxed);

        let detections = candidates
            .iter()
            .map(|candidate| {
                let label = match labels.label(candidate.class_index) {
                    Some(label) => label.to_string(),
                    None => {
                        warn!("Class index {} has no label", candidate.class_index);
                        format!("class_{}", candidate.class_index)
                    }
                };
                let pixel_box = PixelRect::from_normalized(&candidate.bbox, image_size);
                let color = color_of(&pixel_box);
                let projection = project_of(&pixel_box);
                Detection::new(candidate, label, pixel_box, color, projection)
            })
            .collect::<Vec<_>>();

        debug!("Frame {}: {} detections", frame_id, detections.len());
        DetectionSnapshot::new(frame_id, detections)
    }

    /// Make `snapshot` current and notify subscribers.
    pub fn publish(&self, snapshot: DetectionSnapshot) -> Arc<DetectionSnapshot> {
        let snapshot = Arc::new(snapshot);
        // Send under the write guard so concurrent publishers deliver in the
        // same order they swap the slot.
        let mut current = self.current.write();
        *current = snapshot.clone();

        match self.sender.send(snapshot.clone()) {
            Ok(receivers) => debug!("Snapshot {} sent to {} subscribers", snapshot.frame_id, receivers),
            Err(_) => debug!("Snapshot {} published with no subscribers", snapshot.frame_id),
        }
        drop(current);
        snapshot
    }

    pub fn latest(&self) -> Arc<DetectionSnapshot> {
        self.current.read().clone()
    }

    pub fn subscribe(&self) -> SnapshotSubscription {
        info!("Snapshot subscriber registered");
        SnapshotSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DetectionAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives every snapshot published after it was created. Dropping the
/// handle unsubscribes.
pub struct SnapshotSubscription {
    receiver: broadcast::Receiver<Arc<DetectionSnapshot>>,
}

impl SnapshotSubscription {
    /// Newest pending snapshot without waiting; older pending ones are skipped.
    pub fn try_next(&mut self) -> Option<Arc<DetectionSnapshot>> {
        let mut newest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(snapshot) => newest = Some(snapshot),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!("Subscriber skipped {} snapshots", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return newest,
            }
        }
    }

    /// Wait for the next snapshot. `None` once the aggregator is gone.
    pub async fn next(&mut self) -> Option<Arc<DetectionSnapshot>> {
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} snapshots", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Human-readable grouping of a snapshot by (color, label, direction).
///
/// One line per group in first-seen order, reporting the first member's
/// distance, surface and position. An empty snapshot yields `"nothing"`.
pub fn summarize(snapshot: &DetectionSnapshot) -> String {
    if snapshot.is_empty() {
        return "nothing".to_string();
    }

    let mut groups: Vec<(&Detection, usize)> = Vec::new();
    let mut index: HashMap<(ColorLabel, &str, RelativeDirection), usize> = HashMap::new();
    for detection in snapshot.iter() {
        let key = (detection.color, detection.label.as_str(), detection.direction);
        match index.get(&key) {
            Some(&slot) => groups[slot].1 += 1,
            None => {
                index.insert(key, groups.len());
                groups.push((detection, 1));
            }
        }
    }

    groups
        .into_iter()
        .map(|(first, count)| match (first.distance, first.world_position) {
            (Some(distance), Some(p)) => format!(
                "{} {} {} ({}) {:.1}m on {} at ({:.2}, {:.2}, {:.2})",
                count, first.color, first.label, first.direction, distance, first.surface, p.x, p.y, p.z
            ),
            _ => format!(
                "{} {} {} ({}) unreachable",
                count, first.color, first.label, first.direction
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
