use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;

use crate::{
    error::BenchError,
    provider::{ImageRef, RawResponse, VisionProvider},
};

type Script = dyn Fn(usize) -> Result<RawResponse, BenchError> + Send + Sync;

/// Shared, ordered log of provider call boundaries.
pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

/// Provider whose answer is computed from the 1-based call number.
pub(crate) struct ScriptedProvider {
    name: String,
    script: Box<Script>,
    calls: Arc<AtomicUsize>,
    log: Option<EventLog>,
}

impl ScriptedProvider {
    pub(crate) fn new<F>(name: &str, script: F) -> Self
    where
        F: Fn(usize) -> Result<RawResponse, BenchError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            script: Box::new(script),
            calls: Arc::new(AtomicUsize::new(0)),
            log: None,
        }
    }

    pub(crate) fn answering(name: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::new(name, move |_| Ok(RawResponse::new(text.clone(), "trace")))
    }

    pub(crate) fn failing<F>(name: &str, error: F) -> Self
    where
        F: Fn() -> BenchError + Send + Sync + 'static,
    {
        Self::new(name, move |_| Err(error()))
    }

    pub(crate) fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub(crate) fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn record(&self, event: &str) {
        if let Some(log) = &self.log {
            log.lock()
                .expect("event log lock")
                .push(format!("{event}:{}", self.name));
        }
    }
}

#[async_trait]
impl VisionProvider for ScriptedProvider {
    async fn infer(&self, _image: &ImageRef, _query: &str) -> Result<RawResponse, BenchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.record("start");
        tokio::task::yield_now().await;
        let outcome = (self.script)(call);
        self.record("end");
        outcome
    }
}
