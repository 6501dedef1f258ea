use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Beanstalkd job priority.
/// Lower numerical values are reserved first; 0 is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(u32);

impl Priority {
    /// Label value for urgent jobs
    pub const HIGH: u32 = 0;

    /// Label value for medium jobs
    pub const MEDIUM: u32 = 100;

    /// Label value for background jobs
    pub const LOW: u32 = 200;

    /// Priority used when nothing else is configured
    pub const DEFAULT: u32 = 65_536;

    /// Get the raw priority value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The built-in label table (`high`, `medium`, `low`)
    pub fn default_labels() -> HashMap<String, u32> {
        HashMap::from([
            ("high".to_string(), Self::HIGH),
            ("medium".to_string(), Self::MEDIUM),
            ("low".to_string(), Self::LOW),
        ])
    }

    /// Resolve a label (case-insensitive) against a label table
    pub fn from_label(label: &str, labels: &HashMap<String, u32>) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        labels.get(&label).copied().map(Priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(label: &str, labels: &HashMap<String, u32>) -> Option<u32> {
        Priority::from_label(label, labels).map(|p| p.value())
    }

    #[test]
    fn test_priority_labels() {
        let labels = Priority::default_labels();

        assert_eq!(resolve("high", &labels), Some(Priority::HIGH));
        assert_eq!(resolve("Medium", &labels), Some(Priority::MEDIUM));
        assert_eq!(resolve(" low ", &labels), Some(Priority::LOW));
        assert_eq!(resolve("urgent", &labels), None);
    }

    #[test]
    fn test_custom_labels() {
        let labels = HashMap::from([("bulk".to_string(), 5000)]);

        assert_eq!(resolve("BULK", &labels), Some(5000));
        assert_eq!(resolve("high", &labels), None);
    }
}
