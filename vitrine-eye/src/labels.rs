//! Class labels and the product category allow-list

use std::collections::HashSet;

/// COCO class names (80 classes), in model output order
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Set of class labels a detection must belong to.
#[derive(Debug, Clone)]
pub struct CategoryFilter {
    allowed: HashSet<String>,
}

impl CategoryFilter {
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: categories
                .into_iter()
                .map(|c| c.as_ref().trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn allows(&self, label: &str) -> bool {
        self.allowed.contains(&label.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Allowed labels the given label set can never produce.
    pub fn unreachable<'a>(&'a self, labels: &[&str]) -> Vec<&'a str> {
        let mut missing: Vec<&str> = self
            .allowed
            .iter()
            .filter(|c| !labels.iter().any(|l| l.eq_ignore_ascii_case(c)))
            .map(String::as_str)
            .collect();
        missing.sort_unstable();
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::config::DEFAULT_PRODUCT_CATEGORIES;

    #[test]
    fn test_coco_has_80_classes() {
        assert_eq!(COCO_CLASSES.len(), 80);
        assert_eq!(COCO_CLASSES[56], "chair");
    }

    #[test]
    fn test_filter_allows_case_insensitively() {
        let filter = CategoryFilter::new(["Chair", " handbag "]);
        assert!(filter.allows("chair"));
        assert!(filter.allows("HANDBAG"));
        assert!(!filter.allows("person"));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_filter_skips_blank_entries() {
        let filter = CategoryFilter::new(["", "  "]);
        assert!(filter.is_empty());
    }

    #[test]
    fn test_default_categories_outside_coco() {
        let filter = CategoryFilter::new(DEFAULT_PRODUCT_CATEGORIES);
        assert_eq!(filter.unreachable(COCO_CLASSES), vec!["hat", "mirror", "shoe", "sunglasses"]);
    }
}
