//! Violation filtering.
//!
//! A violation is a detection whose lowercased label belongs to the
//! alert-worthy label set. The filter is pure: it takes the label set as a
//! parameter and preserves detection order.

use serde::Serialize;

use crate::detect::Detection;

/// Labels that trigger an alert by default.
pub const DEFAULT_VIOLATION_LABELS: &[&str] = &["without helmet", "accident"];

/// Case-insensitive set of alert-worthy labels.
///
/// Labels are stored lowercased and trimmed; duplicates are dropped and the
/// first-seen order is kept for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ViolationLabels {
    labels: Vec<String>,
}

impl ViolationLabels {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref().trim().to_lowercase();
            if label.is_empty() || out.contains(&label) {
                continue;
            }
            out.push(label);
        }
        Self { labels: out }
    }

    /// Membership test; `label` is lowercased before comparison.
    pub fn contains(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.labels.iter().any(|l| *l == label)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for ViolationLabels {
    fn default() -> Self {
        Self::new(DEFAULT_VIOLATION_LABELS)
    }
}

/// A detection that matched the violation label set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Violation {
    /// Lowercased detection label.
    pub label: String,
    pub confidence: f32,
}

impl Violation {
    /// `label (0.81)`
    pub fn render(&self) -> String {
        format!("{} ({:.2})", self.label, self.confidence)
    }
}

/// Ordered violations found in one detection run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ViolationSet {
    items: Vec<Violation>,
}

impl ViolationSet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Violation] {
        &self.items
    }

    /// Comma-joined rendering: `without helmet (0.81), accident (0.40)`.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .map(Violation::render)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Apply the filter again to an already filtered set.
    pub fn refilter(&self, labels: &ViolationLabels) -> ViolationSet {
        ViolationSet {
            items: self
                .items
                .iter()
                .filter(|v| labels.contains(&v.label))
                .cloned()
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ViolationSet {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Keep the detections whose lowercased label is in `labels`, in order.
pub fn filter_violations(detections: &[Detection], labels: &ViolationLabels) -> ViolationSet {
    let items = detections
        .iter()
        .filter_map(|detection| {
            let label = detection.label.to_lowercase();
            labels.contains(&label).then(|| Violation {
                label,
                confidence: detection.confidence,
            })
        })
        .collect();
    ViolationSet { items }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(label: &str, confidence: f32) -> Detection {
        Detection::new(0, label, confidence, BoundingBox::default())
    }

    #[test]
    fn filters_case_insensitively_in_order() {
        let detections = vec![
            det("Without Helmet", 0.81),
            det("car", 0.55),
            det("Accident", 0.40),
        ];
        let set = filter_violations(&detections, &ViolationLabels::default());
        assert_eq!(
            set.as_slice(),
            &[
                Violation {
                    label: "without helmet".into(),
                    confidence: 0.81
                },
                Violation {
                    label: "accident".into(),
                    confidence: 0.40
                },
            ]
        );
        assert_eq!(set.render(), "without helmet (0.81), accident (0.40)");
    }

    #[test]
    fn empty_input_is_empty_output() {
        let set = filter_violations(&[], &ViolationLabels::default());
        assert!(set.is_empty());
        assert_eq!(set.render(), "");

        let set = filter_violations(&[], &ViolationLabels::new(["anything"]));
        assert!(set.is_empty());
    }

    #[test]
    fn refilter_is_idempotent() {
        let labels = ViolationLabels::new(["ACCIDENT", "without helmet"]);
        let detections = vec![
            det("accident", 0.9),
            det("with helmet", 0.7),
            det("WITHOUT HELMET", 0.3),
            det("accident", 0.2),
        ];
        let once = filter_violations(&detections, &labels);
        assert_eq!(once.len(), 3);
        assert_eq!(once.refilter(&labels), once);
    }

    #[test]
    fn label_set_normalises_and_dedups() {
        let labels = ViolationLabels::new([" Accident ", "accident", "", "Without Helmet"]);
        assert_eq!(labels.as_slice(), &["accident", "without helmet"]);
        assert!(labels.contains("ACCIDENT"));
        assert!(!labels.contains("helmet"));
    }

    #[test]
    fn custom_label_set_is_respected() {
        let detections = vec![det("Without Helmet", 0.81), det("car", 0.55)];
        let set = filter_violations(&detections, &ViolationLabels::new(["car"]));
        assert_eq!(set.render(), "car (0.55)");
    }

    #[test]
    fn confidence_rounds_to_two_places() {
        let set = filter_violations(&[det("accident", 0.456)], &ViolationLabels::default());
        assert_eq!(set.render(), "accident (0.46)");
    }
}
