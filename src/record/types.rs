use serde::Serialize;

/// Outcome of one provider in one trial.
///
/// Serialized as one element of `model_responses`; the bookkeeping fields
/// are implied by the artifact's layout and are not written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    #[serde(skip)]
    pub provider_name: String,
    /// 1-based position of the trial for its entry.
    #[serde(skip)]
    pub trial_index: usize,
    pub final_answer: String,
    pub reasoning_trace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub attempts: usize,
    #[serde(skip)]
    pub elapsed_ms: u128,
}

impl TrialResult {
    pub fn success(
        provider_name: impl Into<String>,
        trial_index: usize,
        final_answer: impl Into<String>,
        reasoning_trace: impl Into<String>,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            trial_index,
            final_answer: final_answer.into(),
            reasoning_trace: reasoning_trace.into(),
            error: None,
            attempts: 1,
            elapsed_ms: 0,
        }
    }

    /// Error placeholder keeping the trial's slot in the artifact.
    pub fn failure(
        provider_name: impl Into<String>,
        trial_index: usize,
        error: impl Into<String>,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            trial_index,
            final_answer: String::new(),
            reasoning_trace: String::new(),
            error: Some(error.into()),
            attempts: 1,
            elapsed_ms: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// All trials of one provider for one dataset entry.
///
/// Serializes to the per-run artifact shape:
/// `{question, ground_truth, image_path, model, model_responses}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryRecord {
    #[serde(rename = "question")]
    pub query: String,
    pub ground_truth: String,
    pub image_path: String,
    #[serde(rename = "model")]
    pub provider_name: String,
    #[serde(rename = "model_responses")]
    pub trials: Vec<TrialResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_trace: Option<String>,
}

impl EntryRecord {
    pub fn new(
        query: impl Into<String>,
        ground_truth: impl Into<String>,
        image_path: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            ground_truth: ground_truth.into(),
            image_path: image_path.into(),
            provider_name: provider_name.into(),
            trials: Vec::new(),
            human_trace: None,
        }
    }

    pub fn failed_trials(&self) -> usize {
        self.trials.iter().filter(|t| t.is_error()).count()
    }
}
