use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    error::BenchError,
    judge::{Judge, Verdict},
    record::EntryRecord,
};

/// Label used in place of a verdict when the judge could not decide.
const ERROR_LABEL: &str = "error";

/// Fraction of successful trials; `0.0` when there were none.
pub fn entry_accuracy(successes: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        successes as f64 / total as f64
    }
}

/// Arithmetic mean of entry accuracies; `0.0` for an empty slice.
pub fn model_accuracy(entry_accuracies: &[f64]) -> f64 {
    if entry_accuracies.is_empty() {
        0.0
    } else {
        entry_accuracies.iter().sum::<f64>() / entry_accuracies.len() as f64
    }
}

/// One judged trial.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub model: String,
    pub run_idx: usize,
    pub question: String,
    pub ground_truth: String,
    pub final_answer: String,
    /// `None` when judging failed; see `judge_error`.
    pub verdict: Option<Verdict>,
    pub judge_error: Option<String>,
    pub reasoning_trace: String,
    pub human_trace: Option<String>,
}

impl RunRow {
    pub fn verdict_label(&self) -> &'static str {
        self.verdict.as_ref().map_or(ERROR_LABEL, Verdict::as_str)
    }
}

/// One provider × question pair.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRow {
    pub model: String,
    pub question: String,
    pub ground_truth: String,
    /// `success`, `fail` or `error` per trial, in trial order.
    pub verdicts: Vec<String>,
    pub entry_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRow {
    pub model: String,
    pub avg_correctness: f64,
}

/// Everything the evaluation tables are built from.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub questions: Vec<QuestionRow>,
    pub runs: Vec<RunRow>,
    /// Sorted by model name.
    pub models: Vec<ModelRow>,
}

impl Evaluation {
    pub fn judge_errors(&self) -> usize {
        self.runs.iter().filter(|r| r.verdict.is_none()).count()
    }
}

/// Judges every trial once and derives per-question and per-model accuracy.
pub struct Aggregator {
    judge: Arc<dyn Judge>,
}

impl Aggregator {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    /// Evaluates records in order.
    ///
    /// A judge failure only affects its own trial: the verdict is recorded as
    /// `error` and counts as unsuccessful. Configuration errors abort.
    pub async fn evaluate(&self, records: &[EntryRecord]) -> Result<Evaluation, BenchError> {
        let mut evaluation = Evaluation::default();
        let mut per_model: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for record in records {
            let mut labels = Vec::with_capacity(record.trials.len());
            let mut successes = 0;
            for trial in &record.trials {
                let (verdict, judge_error) = match self
                    .judge
                    .judge(&record.query, &trial.final_answer, &record.ground_truth)
                    .await
                {
                    Ok(verdict) => (Some(verdict), None),
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        log::warn!(
                            "[{}] could not judge run {} of '{}': {err}",
                            record.provider_name,
                            trial.trial_index,
                            record.query
                        );
                        (None, Some(err.to_string()))
                    }
                };
                if verdict.is_some_and(|v| v.is_success()) {
                    successes += 1;
                }
                let row = RunRow {
                    model: record.provider_name.clone(),
                    run_idx: trial.trial_index,
                    question: record.query.clone(),
                    ground_truth: record.ground_truth.clone(),
                    final_answer: trial.final_answer.clone(),
                    verdict,
                    judge_error,
                    reasoning_trace: trial.reasoning_trace.clone(),
                    human_trace: record.human_trace.clone(),
                };
                labels.push(row.verdict_label().to_string());
                evaluation.runs.push(row);
            }

            let accuracy = entry_accuracy(successes, record.trials.len());
            log::debug!(
                "[{}] {}: {successes}/{} correct",
                record.provider_name,
                record.query,
                record.trials.len()
            );
            per_model
                .entry(record.provider_name.clone())
                .or_default()
                .push(accuracy);
            evaluation.questions.push(QuestionRow {
                model: record.provider_name.clone(),
                question: record.query.clone(),
                ground_truth: record.ground_truth.clone(),
                verdicts: labels,
                entry_accuracy: accuracy,
            });
        }

        evaluation.models = per_model
            .into_iter()
            .map(|(model, accuracies)| {
                let avg_correctness = model_accuracy(&accuracies);
                log::info!("{model}: average correctness {avg_correctness:.4}");
                ModelRow {
                    model,
                    avg_correctness,
                }
            })
            .collect();
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::judge::RuleJudge;
    use crate::record::TrialResult;

    fn record(model: &str, question: &str, truth: &str, answers: &[&str]) -> EntryRecord {
        let mut entry = EntryRecord::new(question, truth, "images/1.png", model);
        entry.trials = answers
            .iter()
            .enumerate()
            .map(|(i, answer)| TrialResult::success(model, i + 1, *answer, "trace"))
            .collect();
        entry
    }

    /// Rule judge that refuses to rule on one particular answer.
    struct Flaky {
        inner: RuleJudge,
        refuse: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Judge for Flaky {
        async fn judge(
            &self,
            query: &str,
            candidate: &str,
            ground_truth: &str,
        ) -> Result<Verdict, BenchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if candidate == self.refuse {
                return Err(BenchError::JudgeProtocol {
                    output: "maybe".into(),
                });
            }
            self.inner.judge(query, candidate, ground_truth).await
        }
    }

    #[test]
    fn entry_accuracy_of_two_out_of_three() {
        assert!((entry_accuracy(2, 3) - 0.6667).abs() < 1e-4);
        assert_eq!(entry_accuracy(0, 0), 0.0);
    }

    #[test]
    fn model_accuracy_is_the_mean() {
        assert_eq!(model_accuracy(&[1.0, 0.5, 0.0]), 0.5);
        assert_eq!(model_accuracy(&[]), 0.0);
    }

    #[tokio::test]
    async fn computes_question_and_model_rows() {
        let records = vec![
            record("gpt", "Score?", "10.50", &["10.49", "10.30", "10.50"]),
            record("claude", "Score?", "10.50", &["10.50", "10.50"]),
            record("claude", "City?", "Paris", &["Rome", "paris"]),
        ];
        let evaluation = Aggregator::new(Arc::new(RuleJudge::new()))
            .evaluate(&records)
            .await
            .expect("evaluation");

        assert_eq!(evaluation.runs.len(), 7);
        assert_eq!(evaluation.questions[0].verdicts, vec!["success", "fail", "success"]);
        assert!((evaluation.questions[0].entry_accuracy - 0.6667).abs() < 1e-4);
        assert_eq!(evaluation.questions[2].entry_accuracy, 0.5);

        let models: Vec<_> = evaluation
            .models
            .iter()
            .map(|m| (m.model.as_str(), m.avg_correctness))
            .collect();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0], ("claude", 0.75));
        assert_eq!(models[1].0, "gpt");
        assert!((models[1].1 - 0.6667).abs() < 1e-4);
    }

    #[tokio::test]
    async fn judge_failure_is_isolated_to_its_trial() {
        let judge = Arc::new(Flaky {
            inner: RuleJudge::new(),
            refuse: "unclear",
            calls: AtomicUsize::new(0),
        });
        let records = vec![record("gpt", "City?", "Paris", &["Paris", "unclear", "Paris"])];
        let evaluation = Aggregator::new(judge.clone())
            .evaluate(&records)
            .await
            .expect("evaluation");

        assert_eq!(judge.calls.load(Ordering::SeqCst), 3);
        assert_eq!(evaluation.questions[0].verdicts, vec!["success", "error", "success"]);
        assert!((evaluation.questions[0].entry_accuracy - 0.6667).abs() < 1e-4);
        assert_eq!(evaluation.judge_errors(), 1);
        let failed = &evaluation.runs[1];
        assert_eq!(failed.verdict_label(), "error");
        assert!(failed.judge_error.as_deref().unwrap_or_default().contains("maybe"));
    }

    #[tokio::test]
    async fn error_tagged_trials_are_judged_as_empty_answers() {
        let mut entry = record("gemini", "City?", "Paris", &["Paris"]);
        entry
            .trials
            .push(TrialResult::failure("gemini", 2, "Auth error: bad key"));
        let evaluation = Aggregator::new(Arc::new(RuleJudge::new()))
            .evaluate(&[entry])
            .await
            .expect("evaluation");
        assert_eq!(evaluation.questions[0].verdicts, vec!["success", "fail"]);
        assert_eq!(evaluation.models[0].avg_correctness, 0.5);
    }

    #[tokio::test]
    async fn entry_without_trials_scores_zero() {
        let entry = EntryRecord::new("City?", "Paris", "", "gpt");
        let evaluation = Aggregator::new(Arc::new(RuleJudge::new()))
            .evaluate(&[entry])
            .await
            .expect("evaluation");
        assert!(evaluation.questions[0].verdicts.is_empty());
        assert_eq!(evaluation.questions[0].entry_accuracy, 0.0);
    }
}
