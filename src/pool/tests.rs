use std::sync::{atomic::Ordering, Arc};

use tokio::sync::Barrier;

use crate::{
    error::BenchError,
    extract::UNKNOWN_ANSWER,
    provider::{ImageRef, ProviderRegistry, RawResponse, VisionProvider},
    resilient::{ResilienceConfig, RetryExecutor},
    test_support::ScriptedProvider,
};

use super::ProviderPool;

fn pool_of(providers: Vec<(&str, Arc<dyn VisionProvider>)>) -> ProviderPool {
    let mut registry = ProviderRegistry::new();
    for (name, provider) in providers {
        registry.try_insert(name, provider).expect("unique provider");
    }
    ProviderPool::new(registry, RetryExecutor::new(ResilienceConfig::defaults()))
}

fn shared<P: VisionProvider + 'static>(provider: P) -> Arc<dyn VisionProvider> {
    Arc::new(provider)
}

fn image() -> ImageRef {
    ImageRef::new("images/1.png")
}

#[tokio::test]
async fn collects_one_result_per_provider() {
    let pool = pool_of(vec![
        ("claude", shared(ScriptedProvider::answering("claude", "It is << Paris >>."))),
        ("gpt", shared(ScriptedProvider::answering("gpt", "<< paris >>"))),
        ("gemini", shared(ScriptedProvider::answering("gemini", "no idea"))),
    ]);

    let outcome = pool.run_trial(&image(), "Which city?", 2).await;

    assert_eq!(outcome.len(), 3);
    assert_eq!(outcome["claude"].final_answer, "Paris");
    assert_eq!(outcome["gpt"].final_answer, "paris");
    assert_eq!(outcome["gemini"].final_answer, UNKNOWN_ANSWER);
    for (name, result) in &outcome {
        assert_eq!(&result.provider_name, name);
        assert_eq!(result.trial_index, 2);
        assert_eq!(result.reasoning_trace, "trace");
        assert!(result.error.is_none());
    }
}

#[tokio::test]
async fn terminal_failure_is_isolated_to_its_provider() {
    let broken = ScriptedProvider::failing("gpt", || {
        BenchError::AuthError("invalid x-api-key".into())
    });
    let broken_calls = broken.call_counter();
    let pool = pool_of(vec![
        ("claude", shared(ScriptedProvider::answering("claude", "<< 10.50 >>"))),
        ("gpt", shared(broken)),
        ("gemini", shared(ScriptedProvider::answering("gemini", "<< 10.5 >>"))),
    ]);

    let outcome = pool.run_trial(&image(), "Score?", 1).await;

    assert_eq!(outcome.len(), 3);
    assert_eq!(outcome["claude"].final_answer, "10.50");
    assert_eq!(outcome["gemini"].final_answer, "10.5");
    let failed = &outcome["gpt"];
    assert!(failed.is_error());
    assert!(failed.error.as_deref().unwrap_or_default().contains("invalid x-api-key"));
    assert_eq!(broken_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_provider_becomes_an_error_result() {
    let pool = pool_of(vec![
        ("claude", shared(ScriptedProvider::answering("claude", "<< ok >>"))),
        ("gpt", shared(ScriptedProvider::new("gpt", |_| panic!("sdk bug")))),
    ]);

    let outcome = pool.run_trial(&image(), "q", 1).await;

    assert_eq!(outcome["claude"].final_answer, "ok");
    assert!(outcome["gpt"].is_error());
    assert_eq!(outcome["gpt"].trial_index, 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_inside_the_worker() {
    let flaky = ScriptedProvider::new("gemini", |call| {
        if call < 3 {
            Err(BenchError::ServerError {
                status: 503,
                message: "unavailable".into(),
            })
        } else {
            Ok(RawResponse::new("<< 7 >>", ""))
        }
    });
    let calls = flaky.call_counter();
    let pool = pool_of(vec![
        ("claude", shared(ScriptedProvider::answering("claude", "<< 7 >>"))),
        ("gemini", shared(flaky)),
    ]);

    let outcome = pool.run_trial(&image(), "q", 1).await;

    assert_eq!(outcome["gemini"].final_answer, "7");
    assert_eq!(outcome["gemini"].attempts, 3);
    assert_eq!(outcome["claude"].attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn missing_token_is_terminal_when_required() {
    let vague = ScriptedProvider::answering("gpt", "Probably Paris");
    let calls = vague.call_counter();
    let pool = pool_of(vec![("gpt", shared(vague))]).require_answer_token(true);

    let outcome = pool.run_trial(&image(), "q", 1).await;

    assert!(outcome["gpt"]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("No delimited final answer"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

struct Rendezvous {
    barrier: Arc<Barrier>,
}

#[async_trait::async_trait]
impl VisionProvider for Rendezvous {
    async fn infer(&self, _image: &ImageRef, _query: &str) -> Result<RawResponse, BenchError> {
        self.barrier.wait().await;
        Ok(RawResponse::new("<< met >>", ""))
    }
}

#[tokio::test]
async fn providers_run_concurrently() {
    // Each provider blocks until all three are in flight at once.
    let barrier = Arc::new(Barrier::new(3));
    let pool = pool_of(
        ["claude", "gpt", "gemini"]
            .into_iter()
            .map(|name| {
                let provider = shared(Rendezvous {
                    barrier: barrier.clone(),
                });
                (name, provider)
            })
            .collect(),
    );

    let outcome = pool.run_trial(&image(), "q", 1).await;

    assert!(outcome.values().all(|r| r.final_answer == "met"));
}
