use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::BenchError, resilient::RetryExecutor};

use super::verdict::{parse_verdict, Judge, Verdict};

/// Text completion endpoint used by [`LlmJudge`].
#[async_trait]
pub trait JudgeBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, BenchError>;
}

/// Builds the impartial-judge prompt for one comparison.
pub fn judge_prompt(query: &str, candidate: &str, ground_truth: &str) -> String {
    format!(
        "You are an impartial judge. Given a question, a model's response, and the gold-standard answer, \
determine whether the model's response is correct. Return only \"success\" if correct, or \"fail\" if incorrect.

Comparison rules:
- Ignore case and whitespace.
- Consider numbers equal if they match within 0.01.
- Treat equivalent expressions (e.g., \"16th place\" = \"last place\") as correct.
- Do not include any explanation in your output, only \"success\" or \"fail\".

Question: {query}
Model Response: {candidate}
Ground Truth: {ground_truth}

Judge:"
    )
}

/// Judge delegating the comparison to a language model.
///
/// Transport failures of the backend go through the retry executor. A reply
/// that is neither `success` nor `fail` is a [`BenchError::JudgeProtocol`],
/// which the executor treats as terminal.
#[derive(Clone)]
pub struct LlmJudge {
    backend: Arc<dyn JudgeBackend>,
    executor: RetryExecutor,
}

impl LlmJudge {
    pub fn new(backend: Arc<dyn JudgeBackend>, executor: RetryExecutor) -> Self {
        Self { backend, executor }
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge(
        &self,
        query: &str,
        candidate: &str,
        ground_truth: &str,
    ) -> Result<Verdict, BenchError> {
        let prompt = judge_prompt(query, candidate, ground_truth);
        log::trace!("judge prompt: {prompt}");
        let backend = &self.backend;
        let prompt = prompt.as_str();
        self.executor
            .run("judge", move || async move {
                let reply = backend.complete(prompt).await?;
                log::debug!("judge reply: {}", reply.trim());
                parse_verdict(&reply)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use super::*;
    use crate::resilient::{MaxAttempts, ResilienceConfig};

    struct Replies {
        replies: Mutex<Vec<Result<String, BenchError>>>,
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl Replies {
        fn new(replies: Vec<Result<String, BenchError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl JudgeBackend for Replies {
        async fn complete(&self, prompt: &str) -> Result<String, BenchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(BenchError::Generic("no reply scripted".into())))
        }
    }

    fn judge_with(backend: Arc<Replies>) -> LlmJudge {
        let cfg = ResilienceConfig::defaults().with_max_attempts(MaxAttempts::Finite(5));
        LlmJudge::new(backend, RetryExecutor::new(cfg))
    }

    #[tokio::test]
    async fn parses_trimmed_reply() {
        let backend = Replies::new(vec![Ok(" Success\n".into())]);
        let verdict = judge_with(backend.clone())
            .judge("score?", "10.49", "10.50")
            .await
            .expect("verdict");
        assert_eq!(verdict, Verdict::Success);

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("Question: score?"));
        assert!(prompts[0].contains("Model Response: 10.49"));
        assert!(prompts[0].contains("Ground Truth: 10.50"));
    }

    #[tokio::test]
    async fn protocol_error_is_not_retried() {
        let backend = Replies::new(vec![Ok("probably".into()), Ok("success".into())]);
        let result = judge_with(backend.clone()).judge("q", "a", "b").await;
        assert!(matches!(result, Err(BenchError::JudgeProtocol { ref output }) if output == "probably"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried() {
        let backend = Replies::new(vec![
            Err(BenchError::HttpError("connection reset".into())),
            Err(BenchError::ServerError {
                status: 503,
                message: "overloaded".into(),
            }),
            Ok("fail".into()),
        ]);
        let verdict = judge_with(backend.clone())
            .judge("q", "a", "b")
            .await
            .expect("verdict after retries");
        assert_eq!(verdict, Verdict::Fail);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }
}
