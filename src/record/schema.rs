use serde_json::Value;

use super::types::{EntryRecord, TrialResult};

/// Known shapes of inference artifacts.
///
/// The shape is detected once per file and every record of that file is
/// mapped to [`EntryRecord`] through the same adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// One response per entry under `model_response`, either a plain string
    /// or a `[final_answer, reasoning_trace]` pair.
    Legacy,
    /// Repeated trials under `model_responses`.
    MultiTrial,
}

struct FieldKeys {
    question: &'static [&'static str],
    ground_truth: &'static [&'static str],
    image_path: &'static [&'static str],
    model: &'static [&'static str],
}

const LEGACY_KEYS: FieldKeys = FieldKeys {
    question: &["question", "query"],
    ground_truth: &["ground_truth", "answer"],
    image_path: &["image_path"],
    model: &["model"],
};

const MULTI_TRIAL_KEYS: FieldKeys = FieldKeys {
    question: &["question", "query"],
    ground_truth: &["ground_truth", "answer"],
    image_path: &["image_path", "image"],
    model: &["model", "provider"],
};

impl SchemaVersion {
    /// Picks the adapter for a whole file.
    pub fn detect(records: &[Value]) -> Self {
        let has = |key: &str| records.iter().any(|r| r.get(key).is_some());
        if has("model_responses") {
            SchemaVersion::MultiTrial
        } else if has("model_response") {
            SchemaVersion::Legacy
        } else {
            SchemaVersion::MultiTrial
        }
    }

    fn keys(&self) -> &'static FieldKeys {
        match self {
            SchemaVersion::Legacy => &LEGACY_KEYS,
            SchemaVersion::MultiTrial => &MULTI_TRIAL_KEYS,
        }
    }

    /// Maps one raw record to the canonical form.
    ///
    /// `model_hint` names the provider when the record does not.
    pub fn adapt(&self, record: &Value, model_hint: &str) -> EntryRecord {
        let keys = self.keys();
        let mut model = text_field(record, keys.model);
        if model.is_empty() {
            model = model_hint.to_string();
        }

        let mut entry = EntryRecord::new(
            text_field(record, keys.question),
            text_field(record, keys.ground_truth),
            text_field(record, keys.image_path),
            model.clone(),
        );
        let human_trace = text_field(record, &["human_trace"]);
        if !human_trace.is_empty() {
            entry.human_trace = Some(human_trace);
        }

        entry.trials = match self {
            SchemaVersion::Legacy => record
                .get("model_response")
                .map(|resp| vec![response_to_trial(resp, &model, 1)])
                .unwrap_or_default(),
            SchemaVersion::MultiTrial => record
                .get("model_responses")
                .and_then(Value::as_array)
                .map(|responses| {
                    responses
                        .iter()
                        .enumerate()
                        .map(|(i, resp)| response_to_trial(resp, &model, i + 1))
                        .collect()
                })
                .unwrap_or_default(),
        };
        entry
    }
}

/// First present, non-null key wins; missing fields read as "".
pub(crate) fn text_field(record: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
        .map(value_text)
        .unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(map) => map
            .get("path")
            .map(value_text)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn response_to_trial(response: &Value, model: &str, trial_index: usize) -> TrialResult {
    match response {
        Value::Array(pair) => TrialResult::success(
            model,
            trial_index,
            pair.first().map(value_text).unwrap_or_default(),
            pair.get(1).map(value_text).unwrap_or_default(),
        ),
        Value::Object(_) => {
            let mut trial = TrialResult::success(
                model,
                trial_index,
                text_field(response, &["final_answer", "answer"]),
                text_field(response, &["reasoning_trace", "trace"]),
            );
            let error = text_field(response, &["error"]);
            if !error.is_empty() {
                trial.error = Some(error);
            }
            trial
        }
        other => TrialResult::success(model, trial_index, value_text(other), ""),
    }
}
