//! Product detection: model proposals filtered to the category allow-list and cropped

use crate::error::VisionError;
use crate::labels::CategoryFilter;
use crate::utils::crop;
use image::RgbImage;
use std::sync::Arc;
use tracing::{debug, warn};
use vitrine_core::{BoundingBox, ComputeError, Detection, Frame, ObjectDetector};

/// Raw detector output in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub label: String,
    pub score: f32,
    pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

/// A network that turns an image into labelled box proposals.
#[cfg_attr(test, mockall::automock)]
pub trait ProposalModel: Send + Sync {
    fn propose(&self, image: &RgbImage) -> Result<Vec<Proposal>, VisionError>;
}

/// Object detector restricted to product categories
pub struct ProductDetector {
    model: Arc<dyn ProposalModel>,
    categories: CategoryFilter,
}

impl ProductDetector {
    pub fn new(model: Arc<dyn ProposalModel>, categories: CategoryFilter) -> Self {
        Self { model, categories }
    }

    pub fn categories(&self) -> &CategoryFilter {
        &self.categories
    }
}

impl ObjectDetector for ProductDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, ComputeError> {
        let image = match frame.decode() {
            Ok(image) => image,
            Err(e) => {
                warn!("Skipping frame {}: {}", frame.index, e);
                return Ok(Vec::new());
            }
        };
        let (width, height) = image.dimensions();

        let proposals = self.model.propose(&image)?;
        let total = proposals.len();

        let detections: Vec<Detection> = proposals
            .into_iter()
            .filter(|p| self.categories.allows(&p.label))
            .filter_map(|p| {
                let bounding_box = BoundingBox::from_xyxy(p.bbox, width, height)?;
                Some(Detection {
                    category: p.label,
                    confidence: p.score,
                    bounding_box,
                    frame_index: frame.index,
                    cropped_image: crop(&image, &bounding_box),
                })
            })
            .collect();

        debug!(
            "Frame {}: {} proposals, {} product detections",
            frame.index,
            total,
            detections.len()
        );
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn proposal(label: &str, score: f32, bbox: [f32; 4]) -> Proposal {
        Proposal {
            label: label.to_string(),
            score,
            bbox,
        }
    }

    fn detector_with(proposals: Vec<Proposal>, categories: &[&str]) -> ProductDetector {
        let mut model = MockProposalModel::new();
        model
            .expect_propose()
            .returning(move |_| Ok(proposals.clone()));
        ProductDetector::new(Arc::new(model), CategoryFilter::new(categories))
    }

    fn frame(index: usize) -> Frame {
        Frame::decoded(index, RgbImage::from_pixel(100, 80, Rgb([120, 120, 120])))
    }

    #[test]
    fn test_detect_keeps_only_allowed_categories() {
        let detector = detector_with(
            vec![
                proposal("person", 0.99, [0.0, 0.0, 50.0, 80.0]),
                proposal("chair", 0.8, [10.0, 10.0, 40.0, 60.0]),
                proposal("dog", 0.7, [50.0, 40.0, 90.0, 70.0]),
            ],
            &["chair", "handbag"],
        );

        let detections = detector.detect(&frame(3)).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].category, "chair");
        assert_eq!(detections[0].frame_index, 3);
        assert_eq!(detections[0].confidence, 0.8);
    }

    #[test]
    fn test_detect_only_out_of_list_objects_yields_nothing() {
        let detector = detector_with(
            vec![proposal("person", 0.95, [0.0, 0.0, 10.0, 10.0])],
            &["chair"],
        );
        assert!(detector.detect(&frame(0)).unwrap().is_empty());
    }

    #[test]
    fn test_detect_keeps_overlapping_duplicates() {
        let detector = detector_with(
            vec![
                proposal("cup", 0.9, [10.0, 10.0, 30.0, 30.0]),
                proposal("cup", 0.6, [11.0, 11.0, 31.0, 31.0]),
            ],
            &["cup"],
        );
        let detections = detector.detect(&frame(0)).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence, 0.9);
        assert_eq!(detections[1].confidence, 0.6);
    }

    #[test]
    fn test_detect_crops_truncated_box() {
        let detector = detector_with(
            vec![proposal("vase", 0.5, [10.7, 10.7, 30.3, 30.3])],
            &["vase"],
        );
        let detections = detector.detect(&frame(0)).unwrap();
        assert_eq!(detections[0].bounding_box, BoundingBox::new(10, 10, 30, 30).unwrap());
        assert_eq!(detections[0].cropped_image.dimensions(), (20, 20));
    }

    #[test]
    fn test_detect_crops_clamped_box() {
        let detector = detector_with(
            vec![proposal("vase", 0.5, [90.5, 70.2, 140.0, 95.0])],
            &["vase"],
        );
        let detections = detector.detect(&frame(0)).unwrap();
        let detection = &detections[0];
        assert_eq!(detection.bounding_box, BoundingBox::new(90, 70, 100, 80).unwrap());
        assert_eq!(detection.cropped_image.dimensions(), (10, 10));
    }

    #[test]
    fn test_detect_drops_boxes_outside_frame() {
        let detector = detector_with(
            vec![proposal("book", 0.5, [200.0, 200.0, 220.0, 220.0])],
            &["book"],
        );
        assert!(detector.detect(&frame(0)).unwrap().is_empty());
    }

    #[test]
    fn test_undecodable_frame_is_skipped() {
        let mut model = MockProposalModel::new();
        model.expect_propose().never();
        let detector = ProductDetector::new(Arc::new(model), CategoryFilter::new(["chair"]));

        let broken = Frame::encoded(4, vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(detector.detect(&broken).unwrap().is_empty());
    }

    #[test]
    fn test_model_failure_is_compute_error() {
        let mut model = MockProposalModel::new();
        model
            .expect_propose()
            .returning(|_| Err(VisionError::Ort("inference failed".to_string())));
        let detector = ProductDetector::new(Arc::new(model), CategoryFilter::new(["chair"]));

        let result = detector.detect(&frame(0));
        assert!(matches!(result, Err(ComputeError::Model(_))));
    }
}
