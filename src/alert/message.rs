use chrono::{DateTime, Local, TimeZone};

use crate::media::MediaKind;
use crate::violation::ViolationSet;

/// Local timestamp format used in alerts: `2025-03-01 14:05:09`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formatted alert text for one detection run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertMessage {
    text: String,
}

impl AlertMessage {
    /// Compose the alert for a non-empty violation set.
    pub fn compose(
        kind: MediaKind,
        location: &str,
        timestamp: &str,
        violations: &ViolationSet,
    ) -> Self {
        let preamble = match kind {
            MediaKind::Image => "🚨 Helmet Violation Alert!",
            MediaKind::Video => "🚨 Helmet Violation Alert in video!",
        };
        let text = format!(
            "{}\nLocation: {}\nTime: {}\nViolations: {}",
            preamble,
            location,
            timestamp,
            violations.render()
        );
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Format a wall-clock instant for alert text.
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current local time, formatted for alert text.
pub fn local_timestamp() -> String {
    format_timestamp(&Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection};
    use crate::violation::{filter_violations, ViolationLabels};
    use chrono::{FixedOffset, NaiveDate};

    fn violations() -> ViolationSet {
        let detections = vec![
            Detection::new(1, "Without Helmet", 0.81, BoundingBox::default()),
            Detection::new(3, "car", 0.55, BoundingBox::default()),
            Detection::new(2, "Accident", 0.40, BoundingBox::default()),
        ];
        filter_violations(&detections, &ViolationLabels::default())
    }

    #[test]
    fn image_alert_layout() {
        let msg = AlertMessage::compose(
            MediaKind::Image,
            "Main Street Camera #1",
            "2025-03-01 14:05:09",
            &violations(),
        );
        assert_eq!(
            msg.as_str(),
            "🚨 Helmet Violation Alert!\n\
             Location: Main Street Camera #1\n\
             Time: 2025-03-01 14:05:09\n\
             Violations: without helmet (0.81), accident (0.40)"
        );
    }

    #[test]
    fn video_alert_has_video_preamble() {
        let msg = AlertMessage::compose(MediaKind::Video, "Gate", "2025-03-01 14:05:09", &violations());
        assert!(msg.as_str().starts_with("🚨 Helmet Violation Alert in video!\n"));
        assert!(msg.as_str().contains("without helmet (0.81), accident (0.40)"));
    }

    #[test]
    fn timestamp_uses_local_wall_clock_format() {
        let at = FixedOffset::east_opt(5 * 3600)
            .unwrap()
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2024, 1, 9)
                    .unwrap()
                    .and_hms_opt(7, 3, 2)
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(format_timestamp(&at), "2024-01-09 07:03:02");
        assert_eq!(local_timestamp().len(), 19);
    }
}
