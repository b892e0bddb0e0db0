use serde::Serialize;

use crate::detect::Detection;

/// Count of detections for one class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassCount {
    pub label: String,
    pub count: usize,
}

/// Per-class detection counts, most frequent first.
///
/// Ties keep the order in which the classes first appeared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DetectionSummary {
    counts: Vec<ClassCount>,
}

impl DetectionSummary {
    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut counts: Vec<ClassCount> = Vec::new();
        for detection in detections {
            match counts.iter_mut().find(|c| c.label == detection.label) {
                Some(entry) => entry.count += 1,
                None => counts.push(ClassCount {
                    label: detection.label.clone(),
                    count: 1,
                }),
            }
        }
        // stable sort keeps first-seen order for ties
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        Self { counts }
    }

    pub fn counts(&self) -> &[ClassCount] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|c| c.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(label: &str) -> Detection {
        Detection::new(0, label, 0.5, BoundingBox::default())
    }

    #[test]
    fn counts_by_frequency_then_first_seen() {
        let detections = vec![
            det("with helmet"),
            det("without helmet"),
            det("car"),
            det("without helmet"),
            det("car"),
            det("accident"),
        ];
        let summary = DetectionSummary::from_detections(&detections);
        let rendered: Vec<(&str, usize)> = summary
            .counts()
            .iter()
            .map(|c| (c.label.as_str(), c.count))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("without helmet", 2),
                ("car", 2),
                ("with helmet", 1),
                ("accident", 1)
            ]
        );
        assert_eq!(summary.total(), 6);
    }

    #[test]
    fn labels_are_case_sensitive_like_the_model_output() {
        let summary = DetectionSummary::from_detections(&[det("Car"), det("car")]);
        assert_eq!(summary.counts().len(), 2);
        assert!(DetectionSummary::from_detections(&[]).is_empty());
    }
}
