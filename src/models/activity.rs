use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const CLASS_COUNT: usize = 6;

/// Activity categories in the order of the classifier's output vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityClass {
    DownStairs,
    UpStairs,
    Walking,
    Jogging,
    Standing,
    Sitting,
}

impl ActivityClass {
    pub const ALL: [ActivityClass; CLASS_COUNT] = [
        ActivityClass::DownStairs,
        ActivityClass::UpStairs,
        ActivityClass::Walking,
        ActivityClass::Jogging,
        ActivityClass::Standing,
        ActivityClass::Sitting,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            ActivityClass::DownStairs => "dws",
            ActivityClass::UpStairs => "ups",
            ActivityClass::Walking => "wlk",
            ActivityClass::Jogging => "jog",
            ActivityClass::Standing => "std",
            ActivityClass::Sitting => "sit",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ActivityClass::DownStairs => "Down stairs",
            ActivityClass::UpStairs => "Up stairs",
            ActivityClass::Walking => "Walking",
            ActivityClass::Jogging => "Jogging",
            ActivityClass::Standing => "Standing",
            ActivityClass::Sitting => "Sitting",
        }
    }
}

/// Raw per-class scores from the classifier. Not assumed to be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub scores: [f32; CLASS_COUNT],
}

impl ModelOutput {
    pub fn new(scores: [f32; CLASS_COUNT]) -> Self {
        Self { scores }
    }

    /// Argmax over the scores. Only a strictly greater score replaces the
    /// current best, so ties resolve to the lowest index.
    pub fn predicted_class(&self) -> ActivityClass {
        let mut best_index = 0;
        let mut best_score = self.scores[0];
        for (index, &score) in self.scores.iter().enumerate().skip(1) {
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }
        ActivityClass::ALL[best_index]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowPrediction {
    pub window_index: usize,
    pub predicted_class: ActivityClass,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnalysisResult {
    pub window_results: Vec<WindowPrediction>,
}

impl SessionAnalysisResult {
    pub fn new(window_results: Vec<WindowPrediction>) -> Self {
        Self { window_results }
    }

    pub fn is_empty(&self) -> bool {
        self.window_results.is_empty()
    }

    pub fn counts(&self) -> BTreeMap<ActivityClass, usize> {
        let mut counts = BTreeMap::new();
        for prediction in &self.window_results {
            *counts.entry(prediction.predicted_class).or_insert(0) += 1;
        }
        counts
    }

    /// Share of windows per predicted class. Empty when there are no windows.
    pub fn percentages(&self) -> BTreeMap<ActivityClass, f32> {
        if self.window_results.is_empty() {
            return BTreeMap::new();
        }

        let total = self.window_results.len() as f32;
        self.counts()
            .into_iter()
            .map(|(class, count)| (class, count as f32 / total))
            .collect()
    }

    /// `"<name>: <percent>%"` per class, in class order.
    pub fn summary_lines(&self) -> Vec<String> {
        self.percentages()
            .into_iter()
            .map(|(class, share)| {
                format!("{}: {}%", class.display_name(), (share * 100.0).round() as u32)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn result_from(classes: &[ActivityClass]) -> SessionAnalysisResult {
        SessionAnalysisResult::new(
            classes
                .iter()
                .enumerate()
                .map(|(window_index, &predicted_class)| WindowPrediction {
                    window_index,
                    predicted_class,
                })
                .collect(),
        )
    }

    #[test]
    fn test_argmax_tie_prefers_first_index() {
        let output = ModelOutput::new([0.5, 0.5, 0.1, 0.1, 0.1, 0.1]);
        assert_eq!(output.predicted_class(), ActivityClass::DownStairs);
    }

    #[test]
    fn test_argmax_picks_maximum() {
        let output = ModelOutput::new([0.1, 0.2, 0.1, 0.9, 0.9, 0.1]);
        assert_eq!(output.predicted_class(), ActivityClass::Jogging);
    }

    #[test]
    fn test_argmax_all_negative_scores() {
        let output = ModelOutput::new([-3.0, -2.0, -1.5, -4.0, -0.5, -9.0]);
        assert_eq!(output.predicted_class(), ActivityClass::Standing);
    }

    #[test]
    fn test_percentages() {
        use ActivityClass::{Sitting, Standing};
        let result = result_from(&[Standing, Standing, Sitting, Standing]);
        let percentages = result.percentages();

        assert_eq!(percentages.len(), 2);
        assert_relative_eq!(percentages[&Standing], 0.75);
        assert_relative_eq!(percentages[&Sitting], 0.25);
    }

    #[test]
    fn test_percentages_empty() {
        assert!(SessionAnalysisResult::default().percentages().is_empty());
    }

    #[test]
    fn test_summary_lines() {
        use ActivityClass::{Jogging, Walking};
        let result = result_from(&[Walking, Jogging, Walking]);
        assert_eq!(result.summary_lines(), vec!["Walking: 67%", "Jogging: 33%"]);
    }

    #[test]
    fn test_class_index_round_trip() {
        for class in ActivityClass::ALL {
            assert_eq!(ActivityClass::from_index(class.index()), Some(class));
        }
        assert_eq!(ActivityClass::from_index(CLASS_COUNT), None);
    }
}
