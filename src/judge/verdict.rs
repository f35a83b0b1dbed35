use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BenchError;

/// Outcome of comparing one answer with the ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Success,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Success => "success",
            Verdict::Fail => "fail",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a judge reply, which must be exactly `success` or `fail`
/// (surrounding whitespace and case are ignored).
pub fn parse_verdict(output: &str) -> Result<Verdict, BenchError> {
    match output.trim().to_lowercase().as_str() {
        "success" => Ok(Verdict::Success),
        "fail" => Ok(Verdict::Fail),
        _ => Err(BenchError::JudgeProtocol {
            output: output.to_string(),
        }),
    }
}

/// Decides whether a candidate answer matches the ground truth.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(
        &self,
        query: &str,
        candidate: &str,
        ground_truth: &str,
    ) -> Result<Verdict, BenchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("success", Verdict::Success)]
    #[case("  Success\n", Verdict::Success)]
    #[case("FAIL", Verdict::Fail)]
    fn accepts_the_two_tokens(#[case] raw: &str, #[case] expected: Verdict) {
        assert_eq!(parse_verdict(raw).expect("valid verdict"), expected);
    }

    #[rstest]
    #[case("")]
    #[case("correct")]
    #[case("success.")]
    #[case("fail: wrong year")]
    fn anything_else_is_a_protocol_error(#[case] raw: &str) {
        assert!(matches!(
            parse_verdict(raw),
            Err(BenchError::JudgeProtocol { .. })
        ));
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Verdict::Success).expect("json"),
            "\"success\""
        );
    }
}
