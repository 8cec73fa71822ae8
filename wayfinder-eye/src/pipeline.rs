//! One decode, color, project, aggregate cycle per frame

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::frame::SourceFrame;
use crate::models::{DetectionCandidate, InferenceBackend, ModelSession, TensorLayout, YoloDecoder};
use crate::navigation::{NavigationController, NavigationQueryResolver, NavigationSink};
use crate::preprocess::image_to_input_tensor;
use crate::processing::{
    ColorClassifier, DetectionAggregator, DetectionSnapshot, RayCaster, SnapshotSubscription, SpatialProjector,
    ViewContext,
};
use crate::vocabulary::{ColorVocabulary, LabelVocabulary};
use ndarray::ArrayViewD;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Grounds detector output into published snapshots.
///
/// Cycles take `&mut self`, so one pipeline never runs two at once. The
/// tensor layout is resolved on the first decoded tensor (unless pinned in
/// the config) and reused for every later frame.
pub struct GroundingPipeline<B: InferenceBackend> {
    config: VisionConfig,
    session: ModelSession<B>,
    labels: LabelVocabulary,
    decoder: Option<YoloDecoder>,
    projector: SpatialProjector,
    ray_caster: Box<dyn RayCaster + Send + Sync>,
    aggregator: Arc<DetectionAggregator>,
}

impl<B: InferenceBackend> GroundingPipeline<B> {
    pub fn new(
        config: VisionConfig,
        backend: B,
        ray_caster: Box<dyn RayCaster + Send + Sync>,
    ) -> Result<Self, VisionError> {
        config
            .validate()
            .map_err(|e| VisionError::Config(format!("Invalid vision config: {}", e)))?;

        let labels = config.label_vocabulary()?;
        let decoder = config.layout.pinned().map(|layout| Self::build_decoder(&config, layout));

        info!(
            "Grounding pipeline ready: {}x{} input, {} classes, threshold {}",
            config.input_size.0, config.input_size.1, config.class_count, config.confidence_threshold
        );

        Ok(Self {
            session: ModelSession::acquire(backend),
            labels,
            decoder,
            projector: SpatialProjector,
            ray_caster,
            aggregator: Arc::new(DetectionAggregator::new()),
            config,
        })
    }

    fn build_decoder(config: &VisionConfig, layout: TensorLayout) -> YoloDecoder {
        YoloDecoder::new(layout, config.class_count, config.confidence_threshold)
            .with_box_units(config.box_units, config.input_size)
    }

    /// Run one cycle and publish its snapshot.
    ///
    /// A missing frame skips the cycle without publishing. A tensor whose
    /// shape fits no layout publishes an empty snapshot. Colors are sampled
    /// in the encoding the frame declares.
    pub fn process_frame(
        &mut self,
        frame: Option<&SourceFrame>,
        view: &ViewContext,
    ) -> Result<Arc<DetectionSnapshot>, VisionError> {
        let Some(frame) = frame else {
            warn!("No source frame, skipping cycle");
            return Err(VisionError::MissingSource);
        };

        let input = image_to_input_tensor(&frame.image, self.config.input_size)?;
        let output = self.session.infer(input)?;

        let candidates = match self.decode(output.view()) {
            Ok(candidates) => candidates,
            Err(e @ VisionError::ShapeMismatch { .. }) => {
                warn!("{}, continuing with no detections", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let image = &frame.image;
        let classifier = ColorClassifier::new(frame.encoding);
        let ray_caster = self.ray_caster.as_ref();
        let snapshot = self.aggregator.aggregate(
            &candidates,
            &self.labels,
            frame.size(),
            |rect| classifier.classify(image, *rect),
            |rect| {
                self.projector
                    .project(frame.viewport_point(rect.center()), ray_caster, view)
            },
        );

        Ok(self.aggregator.publish(snapshot))
    }

    fn decode(&mut self, output: ArrayViewD<'_, f32>) -> Result<Vec<DetectionCandidate>, VisionError> {
        let decoder = match self.decoder.take() {
            Some(decoder) => decoder,
            None => {
                let layout = TensorLayout::infer(output.shape(), self.config.class_count)?;
                info!("Output layout resolved to {:?} from shape {:?}", layout, output.shape());
                Self::build_decoder(&self.config, layout)
            }
        };
        self.decoder.insert(decoder).decode(output)
    }

    /// Layout in use, once known.
    pub fn layout(&self) -> Option<TensorLayout> {
        self.decoder.as_ref().map(|d| d.layout())
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    pub fn labels(&self) -> &LabelVocabulary {
        &self.labels
    }

    pub fn aggregator(&self) -> Arc<DetectionAggregator> {
        self.aggregator.clone()
    }

    pub fn latest(&self) -> Arc<DetectionSnapshot> {
        self.aggregator.latest()
    }

    pub fn subscribe(&self) -> SnapshotSubscription {
        self.aggregator.subscribe()
    }

    /// Controller resolving messages against this pipeline's snapshots.
    pub fn navigation_controller<S: NavigationSink>(&self, sink: S) -> NavigationController<S> {
        let resolver = NavigationQueryResolver::new(self.labels.clone(), ColorVocabulary::default());
        NavigationController::new(resolver, self.aggregator(), sink, self.config.navigation_phrases.clone())
    }

    /// Release the model. Later cycles fail with an inference error.
    pub fn shutdown(&mut self) {
        debug!("Shutting down grounding pipeline");
        self.session.shutdown();
    }
}
