use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Notify;

use jobforge::jobs::{
    FnHandler, JobContext, JobEngine, JobError, JobHandler, JobId, JobPriority, JobStatus, NewJob,
    ProcessOutcome, RetryPolicy,
};

fn engine_with_retries(max_retries: u32) -> JobEngine {
    JobEngine::builder()
        .retry_strategy(Arc::new(RetryPolicy::fixed(max_retries, Duration::ZERO)))
        .build()
}

/// Handler that records the `name` field of each payload it runs
fn recording_handler(job_type: &str, seen: Arc<Mutex<Vec<String>>>) -> Arc<dyn JobHandler> {
    Arc::new(FnHandler::new(job_type, Duration::from_secs(1), move |ctx| {
        let seen = Arc::clone(&seen);
        async move {
            let name = ctx.payload()["name"].as_str().unwrap_or_default().to_string();
            seen.lock().unwrap().push(name);
            Ok(())
        }
    }))
}

async fn drain(engine: &JobEngine, job_type: &str) {
    while let ProcessOutcome::Completed(_) = engine.process_next_job(job_type).await.unwrap() {}
}

#[tokio::test]
async fn test_higher_priority_runs_first() {
    let engine = engine_with_retries(0);
    let seen = Arc::new(Mutex::new(Vec::new()));
    engine
        .register_handler(recording_handler("work", Arc::clone(&seen)))
        .unwrap();

    for (name, priority) in [
        ("low", JobPriority::Low),
        ("urgent", JobPriority::Urgent),
        ("normal", JobPriority::Normal),
        ("high", JobPriority::High),
    ] {
        engine
            .submit("work", json!({ "name": name }), priority)
            .await
            .unwrap();
    }

    drain(&engine, "work").await;
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["urgent", "high", "normal", "low"]
    );
}

#[tokio::test]
async fn test_equal_priority_is_fifo() {
    let engine = engine_with_retries(0);
    let seen = Arc::new(Mutex::new(Vec::new()));
    engine
        .register_handler(recording_handler("work", Arc::clone(&seen)))
        .unwrap();

    for name in ["first", "second", "third"] {
        engine
            .submit("work", json!({ "name": name }), JobPriority::Normal)
            .await
            .unwrap();
    }

    drain(&engine, "work").await;
    assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_queues_are_isolated_per_type() {
    let engine = engine_with_retries(0);
    let seen = Arc::new(Mutex::new(Vec::new()));
    engine
        .register_handler(recording_handler("a", Arc::clone(&seen)))
        .unwrap();
    engine
        .register_handler(recording_handler("b", Arc::clone(&seen)))
        .unwrap();

    engine
        .submit("b", json!({ "name": "b1" }), JobPriority::Urgent)
        .await
        .unwrap();
    engine
        .submit("a", json!({ "name": "a1" }), JobPriority::Low)
        .await
        .unwrap();

    drain(&engine, "a").await;
    assert_eq!(*seen.lock().unwrap(), vec!["a1"]);
    assert_eq!(engine.queue_size("b"), 1);
}

#[tokio::test]
async fn test_retry_budget_exhausted() {
    let engine = engine_with_retries(2);
    engine
        .register(FnHandler::new("flaky", Duration::from_secs(1), |_ctx| async {
            anyhow::bail!("upstream unavailable")
        }))
        .unwrap();

    let job = engine
        .submit("flaky", json!({}), JobPriority::Normal)
        .await
        .unwrap();

    for expected_retry_count in 1..=2 {
        let err = engine.process_next_job("flaky").await.unwrap_err();
        assert!(matches!(err, JobError::Handler { .. }));

        let current = engine.get_job(job.id).await.unwrap();
        assert_eq!(current.status, JobStatus::Retrying);
        assert_eq!(current.retry_count, expected_retry_count);
        assert!(current.scheduled_for.is_some());

        let report = engine
            .promote_due(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(report.promoted, vec![job.id]);
    }

    assert!(engine.process_next_job("flaky").await.is_err());
    let failed = engine.get_job(job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.retry_count, 2);
    assert!(failed.last_error.unwrap().contains("upstream unavailable"));

    let metrics = engine.get_job_metrics("flaky");
    assert_eq!(metrics.total_executed, 3);
    assert_eq!(metrics.total_retried, 2);
    assert_eq!(metrics.total_failed, 1);
    assert_eq!(metrics.total_succeeded, 0);
}

#[tokio::test]
async fn test_retry_then_success() {
    let engine = engine_with_retries(3);
    engine
        .register(FnHandler::new("eventually", Duration::from_secs(1), |ctx| async move {
            if ctx.attempt() < 1 {
                anyhow::bail!("first attempt fails");
            }
            Ok(())
        }))
        .unwrap();

    let job = engine
        .submit("eventually", json!({}), JobPriority::Normal)
        .await
        .unwrap();

    assert!(engine.process_next_job("eventually").await.is_err());
    engine
        .promote_due(Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(
        engine.process_next_job("eventually").await.unwrap(),
        ProcessOutcome::Completed(job.id)
    );

    let done = engine.get_job(job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.retry_count, 1);

    let metrics = engine.get_job_metrics("eventually");
    assert_eq!(metrics.total_executed, 2);
    assert_eq!(metrics.total_succeeded, 1);
    assert_eq!(metrics.total_retried, 1);
}

#[tokio::test]
async fn test_timeout_cancels_handler() {
    let engine = JobEngine::builder()
        .retry_strategy(Arc::new(
            RetryPolicy::fixed(3, Duration::ZERO).with_retry_on_timeout(false),
        ))
        .build();

    let captured: Arc<Mutex<Option<JobContext>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&captured);
    engine
        .register(FnHandler::new(
            "slow",
            Duration::from_millis(100),
            move |ctx: JobContext| {
                let slot = Arc::clone(&slot);
                async move {
                    *slot.lock().unwrap() = Some(ctx.clone());
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(())
                }
            },
        ))
        .unwrap();

    let job = engine
        .submit("slow", json!({}), JobPriority::Normal)
        .await
        .unwrap();

    let started = Instant::now();
    let err = engine.process_next_job("slow").await.unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(err.is_timeout());

    let ctx = captured.lock().unwrap().take().expect("handler started");
    assert!(ctx.is_cancelled());

    let failed = engine.get_job(job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(engine.get_job_metrics("slow").total_failed, 1);
}

#[tokio::test]
async fn test_timeout_is_retried_by_default() {
    let engine = engine_with_retries(1);
    engine
        .register(FnHandler::new(
            "slow",
            Duration::from_millis(50),
            |ctx: JobContext| async move {
                ctx.cancelled().await;
                Ok(())
            },
        ))
        .unwrap();

    let job = engine
        .submit("slow", json!({}), JobPriority::Normal)
        .await
        .unwrap();
    assert!(engine.process_next_job("slow").await.unwrap_err().is_timeout());
    assert_eq!(
        engine.get_job(job.id).await.unwrap().status,
        JobStatus::Retrying
    );
}

#[tokio::test]
async fn test_cancel_queued_job() {
    let engine = engine_with_retries(0);
    let seen = Arc::new(Mutex::new(Vec::new()));
    engine
        .register_handler(recording_handler("work", Arc::clone(&seen)))
        .unwrap();

    let job = engine
        .submit("work", json!({ "name": "never" }), JobPriority::Normal)
        .await
        .unwrap();

    let cancelled = engine.cancel_job(job.id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert_eq!(
        engine.process_next_job("work").await.unwrap(),
        ProcessOutcome::Empty
    );
    assert!(seen.lock().unwrap().is_empty());

    // Terminal states cannot be cancelled again
    assert!(matches!(
        engine.cancel_job(job.id).await,
        Err(JobError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_cancel_scheduled_job_is_never_promoted() {
    let engine = engine_with_retries(0);
    let job = engine
        .schedule_job_in(
            "work",
            json!({}),
            chrono::Duration::minutes(5),
            JobPriority::Normal,
        )
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Scheduled);

    let cancelled = engine.cancel_job(job.id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(engine.get_scheduled_jobs().await.unwrap().is_empty());
    assert_eq!(engine.next_due(), None);

    let report = engine
        .promote_due(Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();
    assert!(report.promoted.is_empty());
    assert_eq!(engine.queue_size("work"), 0);
    assert_eq!(
        engine.get_job(job.id).await.unwrap().status,
        JobStatus::Cancelled
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_workers_run_each_job_once() {
    const JOBS: usize = 200;
    const WORKERS: usize = 8;

    let engine = Arc::new(engine_with_retries(0));
    let runs: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
    let counter = Arc::clone(&runs);
    engine
        .register(FnHandler::new("work", Duration::from_secs(5), move |ctx| {
            let counter = Arc::clone(&counter);
            async move {
                let name = ctx.payload()["name"].as_str().unwrap_or_default().to_string();
                *counter.lock().unwrap().entry(name).or_default() += 1;
                tokio::task::yield_now().await;
                Ok(())
            }
        }))
        .unwrap();

    let mut ids = Vec::with_capacity(JOBS);
    for i in 0..JOBS {
        let priority = match i % 4 {
            0 => JobPriority::Low,
            1 => JobPriority::Normal,
            2 => JobPriority::High,
            _ => JobPriority::Urgent,
        };
        let job = engine
            .submit("work", json!({ "name": format!("job-{i}") }), priority)
            .await
            .unwrap();
        ids.push(job.id);
    }

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let mut completed = Vec::new();
                while let ProcessOutcome::Completed(id) =
                    engine.process_next_job("work").await.unwrap()
                {
                    completed.push(id);
                }
                completed
            })
        })
        .collect();

    let mut completed = Vec::with_capacity(JOBS);
    for worker in workers {
        completed.extend(worker.await.unwrap());
    }
    assert_eq!(completed.len(), JOBS);
    completed.sort();
    completed.dedup();
    assert_eq!(completed.len(), JOBS);

    let runs = runs.lock().unwrap();
    assert_eq!(runs.len(), JOBS);
    assert!(runs.values().all(|&n| n == 1));

    for id in ids {
        assert_eq!(
            engine.get_job(id).await.unwrap().status,
            JobStatus::Completed
        );
    }
    assert_eq!(engine.get_job_metrics("work").total_succeeded, JOBS as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_workers_is_consistent() {
    let engine = Arc::new(engine_with_retries(0));
    engine
        .register(FnHandler::new("work", Duration::from_secs(5), |_ctx| async {
            Ok(())
        }))
        .unwrap();

    let mut ids = Vec::new();
    for _ in 0..100 {
        let job = engine
            .submit("work", json!({}), JobPriority::Normal)
            .await
            .unwrap();
        ids.push(job.id);
    }

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { drain_shared(&engine).await })
        })
        .collect();

    let mut cancelled = Vec::new();
    for id in ids.iter().rev() {
        if let Ok(job) = engine.cancel_job(*id).await {
            cancelled.push(job.id);
        }
    }

    let mut completed = Vec::new();
    for worker in workers {
        completed.extend(worker.await.unwrap());
    }

    // Every job ends up exactly once in one of the two outcomes
    assert_eq!(completed.len() + cancelled.len(), ids.len());
    for id in ids {
        let status = engine.get_job(id).await.unwrap().status;
        if cancelled.contains(&id) {
            assert_eq!(status, JobStatus::Cancelled);
        } else {
            assert_eq!(status, JobStatus::Completed);
            assert!(completed.contains(&id));
        }
    }
}

async fn drain_shared(engine: &JobEngine) -> Vec<JobId> {
    let mut completed = Vec::new();
    while let ProcessOutcome::Completed(id) = engine.process_next_job("work").await.unwrap() {
        completed.push(id);
    }
    completed
}

#[tokio::test]
async fn test_cancel_running_job_is_rejected() {
    let engine = Arc::new(engine_with_retries(0));
    let release = Arc::new(Notify::new());
    let gate = Arc::clone(&release);
    engine
        .register(FnHandler::new("blocking", Duration::from_secs(5), move |_ctx| {
            let gate = Arc::clone(&gate);
            async move {
                gate.notified().await;
                Ok(())
            }
        }))
        .unwrap();

    let job = engine
        .submit("blocking", json!({}), JobPriority::Normal)
        .await
        .unwrap();

    let worker = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.process_next_job("blocking").await })
    };

    for _ in 0..100 {
        if engine.get_job(job.id).await.unwrap().status == JobStatus::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    match engine.cancel_job(job.id).await {
        Err(JobError::InvalidTransition { from, to, .. }) => {
            assert_eq!(from, JobStatus::Running);
            assert_eq!(to, JobStatus::Cancelled);
        }
        other => panic!("Expected InvalidTransition, got {other:?}"),
    }

    release.notify_one();
    let outcome = worker.await.unwrap().unwrap();
    assert_eq!(outcome, ProcessOutcome::Completed(job.id));
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let engine = engine_with_retries(0);
    let seen = Arc::new(Mutex::new(Vec::new()));
    engine
        .register_handler(recording_handler("work", Arc::clone(&seen)))
        .unwrap();

    let err = engine
        .register_handler(recording_handler("work", seen))
        .unwrap_err();
    assert!(matches!(err, JobError::AlreadyRegistered(ref t) if t == "work"));
}

#[tokio::test]
async fn test_missing_handler_fails_job() {
    let engine = engine_with_retries(3);
    let job = engine
        .submit("orphan", json!({}), JobPriority::Normal)
        .await
        .unwrap();

    let err = engine.process_next_job("orphan").await.unwrap_err();
    assert!(matches!(err, JobError::HandlerNotFound(_)));
    assert_eq!(
        engine.get_job(job.id).await.unwrap().status,
        JobStatus::Failed
    );
}

#[tokio::test]
async fn test_create_then_enqueue() {
    let engine = engine_with_retries(0);
    let job = engine
        .create_job(NewJob::new("work", json!({})).with_priority(JobPriority::High))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(engine.queue_size("work"), 0);

    let queued = engine.enqueue_job(job.id).await.unwrap();
    assert_eq!(queued.status, JobStatus::Queued);
    assert_eq!(engine.peek_job("work").await.unwrap().map(|j| j.id), Some(job.id));
}

#[tokio::test]
async fn test_invalid_input_rejected() {
    let engine = engine_with_retries(0);
    assert!(matches!(
        engine.submit("", json!({}), JobPriority::Normal).await,
        Err(JobError::Validation { .. })
    ));
    assert!(matches!(
        engine
            .schedule_job_in(
                "work",
                json!({}),
                chrono::Duration::seconds(-5),
                JobPriority::Normal
            )
            .await,
        Err(JobError::Validation { ref field, .. }) if field == "delay"
    ));
}

// ----------------------------------------------------------------------------
// Email scenario
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EmailPayload {
    to: String,
    subject: String,
}

#[derive(Default)]
struct EmailHandler {
    outbox: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl JobHandler for EmailHandler {
    fn job_type(&self) -> &str {
        "email"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(2)
    }

    async fn handle(&self, ctx: JobContext) -> anyhow::Result<()> {
        let email: EmailPayload = ctx.payload_as()?;
        if !email.to.contains('@') {
            anyhow::bail!("invalid recipient: {}", email.to);
        }
        self.outbox
            .lock()
            .unwrap()
            .push((email.to.clone(), email.subject));
        ctx.set_metadata("delivered_to", email.to);
        Ok(())
    }
}

#[tokio::test]
async fn test_email_end_to_end() {
    let engine = engine_with_retries(0);
    let handler = Arc::new(EmailHandler::default());
    engine
        .register_handler(Arc::clone(&handler) as Arc<dyn JobHandler>)
        .unwrap();

    let welcome = engine
        .submit(
            "email",
            json!({ "to": "ada@example.com", "subject": "Welcome" }),
            JobPriority::High,
        )
        .await
        .unwrap();
    let broken = engine
        .submit(
            "email",
            json!({ "to": "nobody", "subject": "Oops" }),
            JobPriority::Low,
        )
        .await
        .unwrap();

    assert_eq!(
        engine.process_next_job("email").await.unwrap(),
        ProcessOutcome::Completed(welcome.id)
    );
    assert!(engine.process_next_job("email").await.is_err());

    let sent = engine.get_job(welcome.id).await.unwrap();
    assert_eq!(sent.status, JobStatus::Completed);
    assert_eq!(sent.metadata.get("delivered_to"), Some(&json!("ada@example.com")));
    assert_eq!(
        engine.get_job(broken.id).await.unwrap().status,
        JobStatus::Failed
    );
    assert_eq!(
        *handler.outbox.lock().unwrap(),
        vec![("ada@example.com".to_string(), "Welcome".to_string())]
    );

    let metrics = engine.get_job_metrics("email");
    assert_eq!(metrics.total_executed, 2);
    assert_eq!(metrics.total_succeeded, 1);
    assert_eq!(metrics.total_failed, 1);
    assert_eq!(
        metrics.total_executed,
        metrics.total_succeeded + metrics.total_failed + metrics.total_retried
    );
    assert_eq!(
        engine.get_jobs_by_status(JobStatus::Completed).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_delayed_job_promoted_when_due() {
    let engine = engine_with_retries(0);
    let seen = Arc::new(Mutex::new(Vec::new()));
    engine
        .register_handler(recording_handler("work", Arc::clone(&seen)))
        .unwrap();

    let run_at = Utc::now() + chrono::Duration::hours(1);
    let job = engine
        .schedule_job("work", json!({ "name": "later" }), run_at, JobPriority::Normal)
        .await
        .unwrap();
    assert_eq!(engine.get_scheduled_jobs().await.unwrap().len(), 1);
    assert_eq!(engine.next_due(), Some(run_at));

    let early = engine.promote_due(Utc::now()).await.unwrap();
    assert!(early.promoted.is_empty());

    let due = engine.promote_due(run_at).await.unwrap();
    assert_eq!(due.promoted, vec![job.id]);

    drain(&engine, "work").await;
    assert_eq!(*seen.lock().unwrap(), vec!["later"]);
}
