//! YOLO object detection model

use crate::detector::Proposal;
use crate::error::VisionError;
use crate::labels::COCO_CLASSES;
use tracing::debug;

/// Detector candidates kept per frame before NMS
const MAX_CANDIDATES: usize = 30_000;

/// Turns a YOLOv8-style output tensor into proposals.
///
/// Accepts `[1, 4 + C, N]` (the exporter's default) or `[1, N, 4 + C]`,
/// boxes as centre-x, centre-y, width, height in model-input pixels, followed
/// by one score per class.
#[derive(Debug, Clone)]
pub struct YoloDecoder {
    pub input_size: (u32, u32),
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub labels: Vec<String>,
}

impl YoloDecoder {
    pub fn new(input_size: (u32, u32), confidence_threshold: f32, nms_threshold: f32) -> Self {
        Self {
            input_size,
            confidence_threshold,
            nms_threshold,
            labels: COCO_CLASSES.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    fn label(&self, class_id: usize) -> String {
        self.labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    /// Decode raw output into proposals in `frame_size` pixel space.
    pub fn decode(
        &self,
        shape: &[i64],
        data: &[f32],
        frame_size: (u32, u32),
    ) -> Result<Vec<Proposal>, VisionError> {
        if shape.len() != 3 || shape[0] != 1 {
            return Err(VisionError::Model(format!(
                "Unexpected YOLO output shape: {:?}",
                shape
            )));
        }
        let (d1, d2) = (shape[1] as usize, shape[2] as usize);
        if d1.checked_mul(d2) != Some(data.len()) {
            return Err(VisionError::Model(format!(
                "YOLO output has {} values, shape {:?}",
                data.len(),
                shape
            )));
        }

        // Attribute axis is the one matching the label count, else the shorter one
        let expected_attrs = 4 + self.labels.len();
        let channel_major = if d1 == expected_attrs {
            true
        } else if d2 == expected_attrs {
            false
        } else {
            d1 < d2
        };
        let (attrs, anchors) = if channel_major { (d1, d2) } else { (d2, d1) };
        if attrs <= 4 {
            return Err(VisionError::Model(format!(
                "YOLO output has no class scores: {:?}",
                shape
            )));
        }

        let at = |attr: usize, anchor: usize| -> f32 {
            if channel_major {
                data[attr * anchors + anchor]
            } else {
                data[anchor * attrs + attr]
            }
        };

        let scale_x = frame_size.0 as f32 / self.input_size.0 as f32;
        let scale_y = frame_size.1 as f32 / self.input_size.1 as f32;

        let mut candidates = Vec::new();
        for anchor in 0..anchors {
            let mut best_class = 0;
            let mut best_score = f32::MIN;
            for class_id in 0..attrs - 4 {
                let score = at(4 + class_id, anchor);
                if score > best_score {
                    best_score = score;
                    best_class = class_id;
                }
            }

            if !best_score.is_finite() || best_score < self.confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
            if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
                continue;
            }

            candidates.push((
                best_class,
                Proposal {
                    label: String::new(),
                    score: best_score.min(1.0),
                    bbox: [
                        (cx - w / 2.0) * scale_x,
                        (cy - h / 2.0) * scale_y,
                        (cx + w / 2.0) * scale_x,
                        (cy + h / 2.0) * scale_y,
                    ],
                },
            ));
            if candidates.len() >= MAX_CANDIDATES {
                break;
            }
        }

        let kept = apply_nms(candidates, self.nms_threshold);
        debug!("YOLO kept {} proposals", kept.len());

        Ok(kept
            .into_iter()
            .map(|(class_id, mut proposal)| {
                proposal.label = self.label(class_id);
                proposal
            })
            .collect())
    }
}

/// Class-aware non-maximum suppression. Output is ordered by descending score.
pub fn apply_nms(mut candidates: Vec<(usize, Proposal)>, iou_threshold: f32) -> Vec<(usize, Proposal)> {
    candidates.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));

    let mut keep: Vec<(usize, Proposal)> = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..candidates.len() {
            if suppressed[j] || candidates[i].0 != candidates[j].0 {
                continue;
            }
            if compute_iou(&candidates[i].1.bbox, &candidates[j].1.bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
        keep.push(candidates[i].clone());
    }

    keep
}

/// IoU of two `[x_min, y_min, x_max, y_max]` boxes
pub fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - inter;
    if union <= 0.0 || !union.is_finite() {
        return 0.0;
    }

    (inter / union).clamp(0.0, 1.0)
}

#[cfg(feature = "onnx")]
pub use self::session::YoloModel;

#[cfg(feature = "onnx")]
mod session {
    use super::YoloDecoder;
    use crate::detector::{Proposal, ProposalModel};
    use crate::error::VisionError;
    use crate::utils::{resize_exact, rgb_to_chw_tensor, UNIT_MEAN, UNIT_STD};
    use image::RgbImage;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use std::path::Path;
    use tracing::{debug, info};

    /// YOLO model for object detection
    pub struct YoloModel {
        session: Mutex<Session>,
        decoder: YoloDecoder,
    }

    impl YoloModel {
        /// Load a YOLO ONNX export
        pub fn new(model_path: &Path, decoder: YoloDecoder, intra_threads: usize) -> Result<Self, VisionError> {
            let builder = Session::builder()
                .map_err(|e| VisionError::Ort(format!("Failed to create session builder: {}", e)))?;
            let builder = builder
                .with_intra_threads(intra_threads)
                .map_err(|e| VisionError::Ort(format!("Failed to set intra threads: {}", e)))?;
            let session = builder
                .commit_from_file(model_path)
                .map_err(|e| VisionError::Ort(format!("Failed to load YOLO model: {}", e)))?;

            info!("YOLO model loaded from {:?}", model_path);

            Ok(Self {
                session: Mutex::new(session),
                decoder,
            })
        }
    }

    impl ProposalModel for YoloModel {
        fn propose(&self, image: &RgbImage) -> Result<Vec<Proposal>, VisionError> {
            let (input_w, input_h) = self.decoder.input_size;
            let resized = resize_exact(image, input_w, input_h);
            let data = rgb_to_chw_tensor(&resized, UNIT_MEAN, UNIT_STD)?;

            let input = Tensor::from_array(([1usize, 3, input_h as usize, input_w as usize], data))
                .map_err(|e| VisionError::Ort(format!("Failed to create input tensor: {}", e)))?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![input])
                .map_err(|e| VisionError::Ort(format!("YOLO inference failed: {}", e)))?;
            let (shape, raw) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| VisionError::Ort(format!("Failed to extract output tensor: {}", e)))?;

            let dims: Vec<i64> = shape.iter().copied().collect();
            debug!("YOLO output shape: {:?}", dims);

            let proposals = self.decoder.decode(&dims, raw, image.dimensions())?;
            Ok(proposals)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(classes: &[&str]) -> YoloDecoder {
        YoloDecoder::new((640, 640), 0.25, 0.45)
            .with_labels(classes.iter().map(|c| c.to_string()).collect())
    }

    /// Build a channel-major `[1, 4 + C, N]` tensor from per-anchor rows.
    fn channel_major(rows: &[Vec<f32>]) -> (Vec<i64>, Vec<f32>) {
        let attrs = rows[0].len();
        let anchors = rows.len();
        let mut data = vec![0.0; attrs * anchors];
        for (a, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                data[c * anchors + a] = *v;
            }
        }
        (vec![1, attrs as i64, anchors as i64], data)
    }

    #[test]
    fn test_decode_channel_major_scales_to_frame() {
        let (shape, data) = channel_major(&[
            vec![320.0, 320.0, 64.0, 128.0, 0.9, 0.1],
            vec![100.0, 100.0, 10.0, 10.0, 0.1, 0.2],
        ]);

        let proposals = decoder(&["chair", "cup"]).decode(&shape, &data, (1280, 640)).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].label, "chair");
        assert!((proposals[0].score - 0.9).abs() < 1e-6);
        assert_eq!(proposals[0].bbox, [576.0, 256.0, 704.0, 384.0]);
    }

    #[test]
    fn test_decode_anchor_major_layout() {
        let shape = vec![1, 2, 6];
        let data = vec![
            50.0, 50.0, 20.0, 20.0, 0.05, 0.8, // cup
            200.0, 200.0, 40.0, 40.0, 0.3, 0.1, // chair
        ];

        let proposals = decoder(&["chair", "cup"]).decode(&shape, &data, (640, 640)).unwrap();
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].label, "cup");
        assert_eq!(proposals[1].label, "chair");
        assert_eq!(proposals[1].bbox, [180.0, 180.0, 220.0, 220.0]);
    }

    #[test]
    fn test_decode_applies_class_aware_nms() {
        let (shape, data) = channel_major(&[
            vec![100.0, 100.0, 50.0, 50.0, 0.9, 0.0],
            vec![102.0, 102.0, 50.0, 50.0, 0.8, 0.0],
            vec![101.0, 101.0, 50.0, 50.0, 0.0, 0.7],
        ]);

        let proposals = decoder(&["chair", "cup"]).decode(&shape, &data, (640, 640)).unwrap();
        let labels: Vec<&str> = proposals.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["chair", "cup"]);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        assert!(decoder(&["chair"]).decode(&[1, 5], &[0.0; 5], (10, 10)).is_err());
        assert!(decoder(&["chair"]).decode(&[1, 5, 2], &[0.0; 7], (10, 10)).is_err());
    }

    #[test]
    fn test_unknown_class_gets_placeholder_label() {
        let mut rows = vec![vec![10.0, 10.0, 4.0, 4.0, 0.0, 0.0, 0.9]];
        rows.extend(std::iter::repeat(vec![0.0; 7]).take(7));
        let (shape, data) = channel_major(&rows);
        // Two labels but three class scores
        let proposals = decoder(&["chair", "cup"]).decode(&shape, &data, (640, 640)).unwrap();
        assert_eq!(proposals[0].label, "class_2");
    }

    #[test]
    fn test_compute_iou() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert!((compute_iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(compute_iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
        let half = compute_iou(&a, &[5.0, 0.0, 15.0, 10.0]);
        assert!((half - 1.0 / 3.0).abs() < 1e-6);
    }
}
