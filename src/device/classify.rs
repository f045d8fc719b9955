use crate::device::constants::{HEART_RATE_MARKER, POWER_SOURCE_MARKER};
use crate::device::types::DeviceCategory;

/// Decides whether an advertised name belongs to a wanted device category by
/// case-sensitive substring containment of a per-category marker token.
///
/// This is a coarse vendor-naming heuristic, kept from the original setup; a
/// production classifier should also verify that the category's GATT service
/// UUID is advertised, since name matching is brittle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    heart_rate_marker: String,
    power_source_marker: String,
}

impl Classifier {
    pub fn new(heart_rate_marker: String, power_source_marker: String) -> Self {
        Classifier { heart_rate_marker, power_source_marker }
    }

    /// Devices lacking an advertised name are never candidates.
    pub fn matches(&self, category: DeviceCategory, advertised_name: &str) -> bool {
        let marker = match category {
            DeviceCategory::HeartRate => &self.heart_rate_marker,
            DeviceCategory::PowerSource => &self.power_source_marker,
        };

        !advertised_name.is_empty() && advertised_name.contains(marker.as_str())
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier::new(HEART_RATE_MARKER.to_string(), POWER_SOURCE_MARKER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_marker_for_own_category_only() {
        let classifier = Classifier::default();

        assert!(classifier.matches(DeviceCategory::HeartRate, "Polar H10"));
        assert!(!classifier.matches(DeviceCategory::HeartRate, "Think Trainer"));
        assert!(classifier.matches(DeviceCategory::PowerSource, "Think Trainer"));
        assert!(!classifier.matches(DeviceCategory::PowerSource, "Polar H10"));
    }

    #[test]
    fn empty_name_never_matches() {
        let classifier = Classifier::default();

        assert!(!classifier.matches(DeviceCategory::HeartRate, ""));
        assert!(!classifier.matches(DeviceCategory::PowerSource, ""));

        // even a degenerate empty marker must not turn nameless devices into candidates
        let degenerate = Classifier::new(String::new(), String::new());
        assert!(!degenerate.matches(DeviceCategory::HeartRate, ""));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let classifier = Classifier::default();

        assert!(!classifier.matches(DeviceCategory::HeartRate, "polar h10"));
        assert!(!classifier.matches(DeviceCategory::PowerSource, "THINK TRAINER"));
    }

    #[test]
    fn markers_are_configurable() {
        let classifier = Classifier::new("Garmin".to_string(), "Wahoo".to_string());

        assert!(classifier.matches(DeviceCategory::HeartRate, "Garmin HRM-Pro"));
        assert!(!classifier.matches(DeviceCategory::HeartRate, "Polar H10"));
        assert!(classifier.matches(DeviceCategory::PowerSource, "Wahoo KICKR"));
    }
}
