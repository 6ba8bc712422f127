//! Bounded, detached forwarding of approved messages to the AI endpoint.
//!
//! Jobs enter a bounded queue; a single loop task pulls them and runs each
//! under a semaphore permit, so at most `workers` forwards are in flight.
//! A full queue drops the job instead of blocking the HTTP handler.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, watch, Semaphore},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    ai::{AiForwarder, ChatRequest, ForwardError},
    config::ForwardConfig,
    metrics::GatewayMetrics,
};

/// Why [`ForwardDispatcher::submit`] refused a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("forward queue full")]
    QueueFull,
    #[error("forward dispatcher closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct ForwardJob {
    pub msg_id: String,
    pub request: ChatRequest,
}

/// Producer side, cloned into every request handler.
#[derive(Clone)]
pub struct ForwardDispatcher {
    tx: mpsc::Sender<ForwardJob>,
    metrics: Arc<GatewayMetrics>,
}

/// Consumer side. Call [`DispatchWorker::drain`] on shutdown.
pub struct DispatchWorker {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl ForwardDispatcher {
    pub fn spawn(
        forwarder: Arc<dyn AiForwarder>,
        config: &ForwardConfig,
        metrics: Arc<GatewayMetrics>,
    ) -> (Self, DispatchWorker) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = u32::try_from(config.workers.max(1)).unwrap_or(u32::MAX);

        let handle = tokio::spawn(run_loop(
            rx,
            forwarder,
            workers,
            config.dispatch_timeout(),
            Arc::clone(&metrics),
            shutdown_rx,
        ));

        (
            Self { tx, metrics },
            DispatchWorker {
                handle,
                shutdown_tx,
            },
        )
    }

    /// Enqueue without waiting. Never blocks the caller.
    pub fn submit(&self, job: ForwardJob) -> Result<(), DispatchError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.metrics.forwards_dropped.inc();
                warn!(msg_id = %job.msg_id, "forward queue full, dropping message");
                Err(DispatchError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(msg_id = %job.msg_id, "forward dispatcher closed, dropping message");
                Err(DispatchError::Closed)
            }
        }
    }
}

impl DispatchWorker {
    /// Stop accepting jobs, finish queued and in-flight ones.
    ///
    /// Returns false if `timeout` elapsed first; remaining jobs are abandoned.
    pub async fn drain(self, timeout: Duration) -> bool {
        let _ = self.shutdown_tx.send(true);
        let mut handle = self.handle;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(_) => true,
            Err(_) => {
                warn!(?timeout, "forward dispatcher did not drain in time");
                handle.abort();
                false
            }
        }
    }
}

async fn run_loop(
    mut rx: mpsc::Receiver<ForwardJob>,
    forwarder: Arc<dyn AiForwarder>,
    workers: u32,
    job_timeout: Duration,
    metrics: Arc<GatewayMetrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    let permits = Arc::new(Semaphore::new(workers as usize));
    let mut closing = false;

    loop {
        let job = tokio::select! {
            job = rx.recv() => job,
            _ = shutdown.changed(), if !closing => {
                // Buffered jobs are still delivered after close.
                closing = true;
                rx.close();
                continue;
            }
        };
        let Some(job) = job else { break };

        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let forwarder = Arc::clone(&forwarder);
        let metrics = Arc::clone(&metrics);
        tokio::spawn(async move {
            run_job(forwarder.as_ref(), job, job_timeout, &metrics).await;
            drop(permit);
        });
    }

    // All permits back means every spawned job has finished.
    let _ = permits.acquire_many(workers).await;
    info!("forward dispatcher drained");
}

async fn run_job(forwarder: &dyn AiForwarder, job: ForwardJob, job_timeout: Duration, metrics: &GatewayMetrics) {
    debug!(msg_id = %job.msg_id, user_id = %job.request.user_id, "forwarding message");
    match tokio::time::timeout(job_timeout, forwarder.forward(&job.request)).await {
        Ok(Ok(resp)) => {
            metrics.forwards_succeeded.inc();
            info!(
                msg_id = %job.msg_id,
                user_id = %job.request.user_id,
                reply_len = resp.reply.len(),
                "AI replied"
            );
        }
        Ok(Err(e)) => {
            metrics.forwards_failed.inc();
            warn!(msg_id = %job.msg_id, error = %e, "forward failed");
        }
        Err(_) => {
            metrics.forwards_failed.inc();
            warn!(msg_id = %job.msg_id, error = %ForwardError::Timeout(job_timeout), "forward failed");
        }
    }
}
