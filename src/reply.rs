use crate::llm::{GenerationParams, TextGenerator};
use crate::prompt::{postprocess, PromptBuilder};
use crate::{AppError, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The `ReplyGenerator` turns a user message into a chat reply using an injected
/// text-generation engine.
pub struct ReplyGenerator {
    engine: Arc<dyn TextGenerator>,
    params: GenerationParams,
    system_prompt: String,
}

impl ReplyGenerator {
    /// Creates a new `ReplyGenerator`.
    ///
    /// # Arguments
    ///
    /// * `engine` - The loaded model every reply is generated with.
    /// * `params` - The sampling parameters of every generation.
    /// * `system_prompt` - The system turn placed before each user message.
    pub fn new(
        engine: Arc<dyn TextGenerator>,
        params: GenerationParams,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            params,
            system_prompt: system_prompt.into(),
        }
    }

    /// Generates a cleaned reply to `user_text`.
    ///
    /// # Arguments
    ///
    /// * `user_text` - The message as sent by the user.
    ///
    /// # Returns
    ///
    /// A `Result` containing the reply without markup tokens and at most 4000
    /// characters long, or the engine's error.
    pub async fn generate(&self, user_text: &str) -> Result<String> {
        let prompt = PromptBuilder::new(self.system_prompt.as_str())
            .with_user(user_text)
            .build();
        debug!("Prompt:\n{}", prompt);

        let raw = self.engine.generate(&prompt, &self.params).await?;
        Ok(postprocess(&raw))
    }
}

struct Job {
    user_text: String,
    reply: oneshot::Sender<Result<String>>,
}

/// A bounded queue in front of the `ReplyGenerator`, drained by a fixed number of
/// worker tasks.
///
/// Submissions fail fast with `AppError::QueueFull` when every slot is taken.
/// A submitter waits at most `timeout` for its reply; once it gives up, the worker
/// handling the job drops the generation.
pub struct InferenceQueue {
    sender: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    timeout: Duration,
}

impl InferenceQueue {
    /// Spawns `workers` tasks serving a queue of `capacity` pending jobs.
    /// Must be called from within a tokio runtime.
    pub fn start(
        generator: Arc<ReplyGenerator>,
        capacity: usize,
        workers: usize,
        timeout: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..workers.max(1))
            .map(|id| {
                let generator = generator.clone();
                let receiver = receiver.clone();
                tokio::spawn(run_worker(id, generator, receiver))
            })
            .collect();

        Self {
            sender,
            workers,
            timeout,
        }
    }

    /// Queues a message for generation and waits for its reply.
    pub async fn submit(&self, user_text: impl Into<String>) -> Result<String> {
        let (reply, receiver) = oneshot::channel();
        let job = Job {
            user_text: user_text.into(),
            reply,
        };

        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AppError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => AppError::QueueClosed,
        })?;

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AppError::QueueClosed),
            Err(_) => Err(AppError::GenerationTimeout(self.timeout)),
        }
    }

    /// Stops accepting jobs, lets the workers finish what is queued and waits for them.
    pub async fn shutdown(self) {
        drop(self.sender);
        for result in join_all(self.workers).await {
            if let Err(e) = result {
                error!("Inference worker failed: {}", e);
            }
        }
        info!("Inference queue stopped");
    }
}

async fn run_worker(
    id: usize,
    generator: Arc<ReplyGenerator>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
) {
    debug!("Inference worker {} started", id);

    loop {
        // The lock is released before generating so other workers can pick up jobs.
        let job = receiver.lock().await.recv().await;
        let Some(mut job) = job else {
            break;
        };

        if job.reply.is_closed() {
            debug!("Worker {}: requester gone, skipping job", id);
            continue;
        }

        let outcome = tokio::select! {
            result = generator.generate(&job.user_text) => Some(result),
            _ = job.reply.closed() => None,
        };

        match outcome {
            Some(result) => {
                if job.reply.send(result).is_err() {
                    debug!("Worker {}: reply dropped after generation", id);
                }
            }
            None => warn!("Worker {}: generation cancelled, requester gave up", id),
        }
    }

    debug!("Inference worker {} stopped", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{Notify, Semaphore};

    const PARAMS: GenerationParams = GenerationParams {
        max_new_tokens: 16,
        temperature: 0.7,
        top_p: 0.95,
    };

    /// Echoes the prompt back after an optional delay.
    struct EchoEngine {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl EchoEngine {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for EchoEngine {
        async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(format!("{prompt}<|im_end|>"))
        }
    }

    /// Blocks every generation until a permit is released.
    struct GatedEngine {
        started: Notify,
        release: Semaphore,
    }

    impl GatedEngine {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                started: Notify::new(),
                release: Semaphore::new(0),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for GatedEngine {
        async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
            self.started.notify_one();
            let _permit = self
                .release
                .acquire()
                .await
                .map_err(|e| AppError::LLMError(e.to_string()))?;
            Ok(prompt.to_string())
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl TextGenerator for FailingEngine {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            Err(AppError::LLMError("model crashed".to_string()))
        }
    }

    #[tokio::test]
    async fn test_generator_builds_prompt_and_cleans_output() {
        let engine = EchoEngine::new(Duration::ZERO);
        let generator = ReplyGenerator::new(engine.clone(), PARAMS, "Be brief.");

        let reply = generator.generate("Привет").await.unwrap();

        assert!(reply.starts_with("system\nBe brief."));
        assert!(reply.contains("user\nПривет"));
        assert!(!reply.contains("<|"));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queue_returns_reply() {
        let generator = Arc::new(ReplyGenerator::new(
            EchoEngine::new(Duration::ZERO),
            PARAMS,
            "sys",
        ));
        let queue = InferenceQueue::start(generator, 4, 2, Duration::from_secs(5));

        let reply = queue.submit("hello").await.unwrap();
        assert!(reply.contains("hello"));

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_propagates_engine_errors() {
        let generator = Arc::new(ReplyGenerator::new(Arc::new(FailingEngine), PARAMS, "sys"));
        let queue = InferenceQueue::start(generator, 4, 1, Duration::from_secs(5));

        let result = queue.submit("hello").await;
        assert!(matches!(result, Err(AppError::LLMError(_))));

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_times_out_and_cancels() {
        let engine = EchoEngine::new(Duration::from_secs(60));
        let generator = Arc::new(ReplyGenerator::new(engine.clone(), PARAMS, "sys"));
        let queue = InferenceQueue::start(generator, 4, 1, Duration::from_millis(50));

        let result = queue.submit("slow").await;
        assert!(matches!(result, Err(AppError::GenerationTimeout(_))));

        // The cancelled job frees the worker for the next one.
        tokio::time::timeout(Duration::from_secs(5), queue.shutdown())
            .await
            .expect("worker should stop after cancellation");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    /// A full queue rejects new work instead of waiting.
    #[tokio::test]
    async fn test_queue_rejects_when_full() {
        let engine = GatedEngine::new();
        let generator = Arc::new(ReplyGenerator::new(engine.clone(), PARAMS, "sys"));
        let queue = Arc::new(InferenceQueue::start(
            generator,
            1,
            1,
            Duration::from_secs(5),
        ));

        // First job occupies the worker.
        let busy = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit("first").await })
        };
        engine.started.notified().await;

        // Second job takes the only slot; polling once runs the send.
        let queued = queue.submit("second");
        tokio::pin!(queued);
        assert!(futures::poll!(&mut queued).is_pending());

        let rejected = queue.submit("third").await;
        assert!(matches!(rejected, Err(AppError::QueueFull)));

        engine.release.add_permits(1);
        assert!(busy.await.unwrap().is_ok());
        assert!(queued.await.is_ok());
    }
}
