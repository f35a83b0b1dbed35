use async_trait::async_trait;

use crate::error::BenchError;

use super::verdict::{Judge, Verdict};

const DEFAULT_TOLERANCE: f64 = 0.01;
// Absorbs binary rounding so that e.g. 10.49 vs 10.50 sits inside the tolerance.
const FLOAT_SLACK: f64 = 1e-9;

/// Local comparator: case and whitespace are ignored, numbers match within
/// an absolute tolerance, and configured paraphrases count as equal.
#[derive(Debug, Clone)]
pub struct RuleJudge {
    tolerance: f64,
    equivalences: Vec<Vec<String>>,
}

impl RuleJudge {
    pub fn new() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            equivalences: Vec::new(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    /// Adds classes of answers that are treated as interchangeable,
    /// e.g. `["16th place", "last place"]`.
    pub fn with_equivalences<I, C, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.equivalences.extend(
            classes
                .into_iter()
                .map(|class| class.into_iter().map(|s| canonical(s.as_ref())).collect()),
        );
        self
    }

    pub fn compare(&self, candidate: &str, ground_truth: &str) -> Verdict {
        let a = canonical(candidate);
        let b = canonical(ground_truth);
        if a == b {
            return Verdict::Success;
        }
        if let (Some(x), Some(y)) = (as_number(&a), as_number(&b)) {
            if (x - y).abs() <= self.tolerance + FLOAT_SLACK {
                return Verdict::Success;
            }
        }
        let equivalent = self
            .equivalences
            .iter()
            .any(|class| class.contains(&a) && class.contains(&b));
        if equivalent {
            Verdict::Success
        } else {
            Verdict::Fail
        }
    }
}

impl Default for RuleJudge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Judge for RuleJudge {
    async fn judge(
        &self,
        _query: &str,
        candidate: &str,
        ground_truth: &str,
    ) -> Result<Verdict, BenchError> {
        Ok(self.compare(candidate, ground_truth))
    }
}

fn canonical(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn as_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '%'))
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}
