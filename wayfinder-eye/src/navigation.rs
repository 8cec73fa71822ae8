//! Free-text navigation queries against the latest snapshot

use crate::error::ResolutionError;
use crate::processing::{Detection, DetectionAggregator, DetectionSnapshot};
use crate::vocabulary::{normalize_token, ColorLabel, ColorVocabulary, LabelVocabulary};
use nalgebra::Point3;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Target description parsed from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationQuery {
    pub color: Option<ColorLabel>,
    pub label: String,
}

/// Matches message tokens against fixed label and color vocabularies.
///
/// A token that is both a color and a label counts as a color. When several
/// tokens fill the same role the last one wins.
#[derive(Debug, Clone)]
pub struct NavigationQueryResolver {
    labels: LabelVocabulary,
    colors: ColorVocabulary,
}

impl NavigationQueryResolver {
    pub fn new(labels: LabelVocabulary, colors: ColorVocabulary) -> Self {
        Self { labels, colors }
    }

    pub fn parse(&self, text: &str) -> Result<NavigationQuery, ResolutionError> {
        parse_query(text, &self.labels, &self.colors)
    }

    /// Closest reachable detection matching the query. Ties go to the
    /// earlier detection.
    pub fn select<'a>(&self, query: &NavigationQuery, snapshot: &'a DetectionSnapshot) -> Option<&'a Detection> {
        closest_match(query, snapshot)
    }

    pub fn resolve(&self, text: &str, snapshot: &DetectionSnapshot) -> Result<Point3<f32>, ResolutionError> {
        resolve_query(text, snapshot, &self.labels, &self.colors)
    }
}

fn parse_query(
    text: &str,
    labels: &LabelVocabulary,
    colors: &ColorVocabulary,
) -> Result<NavigationQuery, ResolutionError> {
    let mut color = None;
    let mut label = None;

    for token in text.split_whitespace().map(normalize_token) {
        if token.is_empty() {
            continue;
        }
        if let Some(c) = colors.lookup(&token) {
            color = Some(c);
        } else if labels.contains(&token) {
            label = Some(token);
        }
    }

    let label = label.ok_or(ResolutionError::NoLabelRecognized)?;
    Ok(NavigationQuery { color, label })
}

fn closest_match<'a>(query: &NavigationQuery, snapshot: &'a DetectionSnapshot) -> Option<&'a Detection> {
    let mut best: Option<(&Detection, f32)> = None;
    for detection in snapshot.iter() {
        if detection.label != query.label {
            continue;
        }
        if query.color.is_some_and(|c| c != detection.color) {
            continue;
        }
        let Some(distance) = detection.distance else {
            continue;
        };
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((detection, distance));
        }
    }
    best.map(|(detection, _)| detection)
}

fn resolve_query(
    text: &str,
    snapshot: &DetectionSnapshot,
    labels: &LabelVocabulary,
    colors: &ColorVocabulary,
) -> Result<Point3<f32>, ResolutionError> {
    let query = parse_query(text, labels, colors)?;
    closest_match(&query, snapshot)
        .and_then(|d| d.world_position)
        .ok_or(ResolutionError::NoMatch {
            label: query.label,
            color: query.color,
        })
}

/// Resolve `text` against `snapshot` with the given vocabularies.
pub fn resolve(
    text: &str,
    snapshot: &DetectionSnapshot,
    labels: &LabelVocabulary,
    colors: &ColorVocabulary,
) -> Result<Point3<f32>, ResolutionError> {
    resolve_query(text, snapshot, labels, colors)
}

/// True if `message` contains one of the trigger `phrases`, ignoring case.
pub fn is_navigation_request(message: &str, phrases: &[String]) -> bool {
    let message = message.to_lowercase();
    phrases.iter().any(|p| message.contains(&p.to_lowercase()))
}

/// Receives resolved navigation targets.
#[cfg_attr(test, mockall::automock)]
pub trait NavigationSink: Send + Sync {
    fn navigate_to(&self, target: Point3<f32>);
}

impl NavigationSink for mpsc::UnboundedSender<Point3<f32>> {
    fn navigate_to(&self, target: Point3<f32>) {
        if self.send(target).is_err() {
            warn!("Navigation target dropped: receiver closed");
        }
    }
}

/// Turns triggered user messages into navigation targets.
pub struct NavigationController<S: NavigationSink> {
    resolver: NavigationQueryResolver,
    aggregator: Arc<DetectionAggregator>,
    sink: S,
    phrases: Vec<String>,
}

impl<S: NavigationSink> NavigationController<S> {
    pub fn new(
        resolver: NavigationQueryResolver,
        aggregator: Arc<DetectionAggregator>,
        sink: S,
        phrases: Vec<String>,
    ) -> Self {
        Self {
            resolver,
            aggregator,
            sink,
            phrases,
        }
    }

    /// `Ok(None)` for messages that are not navigation requests.
    pub fn handle_message(&self, message: &str) -> Result<Option<Point3<f32>>, ResolutionError> {
        if !is_navigation_request(message, &self.phrases) {
            debug!("Not a navigation request: {:?}", message);
            return Ok(None);
        }

        let snapshot = self.aggregator.latest();
        match self.resolver.resolve(message, &snapshot) {
            Ok(target) => {
                info!(
                    "Navigating to ({:.2}, {:.2}, {:.2}) from frame {}",
                    target.x, target.y, target.z, snapshot.frame_id
                );
                self.sink.navigate_to(target);
                Ok(Some(target))
            }
            Err(e) => {
                warn!("Navigation: {}", e);
                Err(e)
            }
        }
    }
}
