use serde::Serialize;

/// Axis-aligned detection box in pixel coordinates, corners at (x1, y1) and (x2, y2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub class_id: u32,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn from_center(class_id: u32, confidence: f32, xc: f32, yc: f32, w: f32, h: f32) -> Self {
        Self {
            class_id,
            confidence,
            x1: xc - w / 2.,
            y1: yc - h / 2.,
            x2: xc + w / 2.,
            y2: yc + h / 2.,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.) * self.height().max(0.)
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2., (self.y1 + self.y2) / 2.)
    }

    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
            ..*self
        }
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let union = union(self, other);
        if union <= 0. {
            return 0.;
        }
        intersection(self, other) / union
    }
}

pub fn intersection(box1: &BoundingBox, box2: &BoundingBox) -> f32 {
    let w = (box1.x2.min(box2.x2) - box1.x1.max(box2.x1)).max(0.);
    let h = (box1.y2.min(box2.y2) - box1.y1.max(box2.y1)).max(0.);
    w * h
}

pub fn union(box1: &BoundingBox, box2: &BoundingBox) -> f32 {
    box1.area() + box2.area() - intersection(box1, box2)
}

/// Greedy per-class suppression. Output is sorted by descending confidence.
pub fn non_max_suppression(mut boxes: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
    let mut result = Vec::new();

    while !boxes.is_empty() {
        let best = boxes.remove(0);
        boxes.retain(|other| other.class_id != best.class_id || best.iou(other) < iou_threshold);
        result.push(best);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(class_id: u32, confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox {
            class_id,
            confidence,
            x1,
            y1,
            x2,
            y2,
        }
    }

    #[test]
    fn test_iou_identical_boxes() {
        let a = bbox(0, 0.9, 0., 0., 10., 10.);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_disjoint_boxes_have_no_intersection() {
        let a = bbox(0, 0.9, 0., 0., 10., 10.);
        let b = bbox(0, 0.9, 20., 20., 30., 30.);
        assert_eq!(intersection(&a, &b), 0.);
        assert_eq!(a.iou(&b), 0.);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = bbox(0, 0.9, 0., 0., 10., 10.);
        let b = bbox(0, 0.9, 5., 0., 15., 10.);
        // 50 / (100 + 100 - 50)
        assert!((a.iou(&b) - 1. / 3.).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping_same_class() {
        let boxes = vec![
            bbox(0, 0.6, 1., 1., 11., 11.),
            bbox(0, 0.9, 0., 0., 10., 10.),
            bbox(0, 0.5, 50., 50., 60., 60.),
        ];
        let kept = non_max_suppression(boxes, 0.7);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.5);
    }

    #[test]
    fn test_nms_keeps_overlapping_boxes_of_other_classes() {
        let boxes = vec![bbox(0, 0.9, 0., 0., 10., 10.), bbox(1, 0.8, 0., 0., 10., 10.)];
        let kept = non_max_suppression(boxes, 0.7);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_from_center_and_scale() {
        let b = BoundingBox::from_center(2, 0.4, 50., 40., 20., 10.);
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (40., 35., 60., 45.));
        assert_eq!(b.center(), (50., 40.));

        let scaled = b.scale(0.5, 2.);
        assert_eq!((scaled.x1, scaled.y1, scaled.x2, scaled.y2), (20., 70., 30., 90.));
        assert_eq!(scaled.class_id, 2);
    }
}
