//! Runtime — the background loops that drive dispatching and automations.
//!
//! Three loops run as tokio tasks:
//!
//! - the task dispatcher, ticking every `dispatch_interval`
//! - the schedule sweeper, polling every `sweep_interval`
//! - the event listener, draining the event bus
//!
//! [`Runtime::shutdown`] flips a `watch` channel; each loop finishes the
//! tick it is in, exits, and is awaited. The event listener first processes
//! every event still buffered on the bus.
//!
//! The bus is bounded. A listener that falls more than its capacity behind
//! loses the oldest events; the loss is logged with the number skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use funnelhub_domain::event::RecordEvent;

use crate::automation_engine::AutomationEngine;
use crate::dispatcher::Dispatcher;
use crate::ports::{
    AutomationRepository, LeadConverter, Mailer, RecordRepository, TaskRepository, WebhookClient,
};

/// Loop cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub dispatch_interval: Duration,
    pub sweep_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dispatch_interval: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Owns the background loops and their shutdown signal.
pub struct Runtime {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    #[must_use]
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    /// Start every loop with the given cadences.
    pub fn start<AR, RR, TR, M, LC, W>(
        config: RuntimeConfig,
        dispatcher: Arc<Dispatcher<TR>>,
        engine: Arc<AutomationEngine<AR, RR, TR, M, LC, W>>,
        events: broadcast::Receiver<RecordEvent>,
    ) -> Self
    where
        AR: AutomationRepository + 'static,
        RR: RecordRepository + 'static,
        TR: TaskRepository + 'static,
        M: Mailer + 'static,
        LC: LeadConverter + 'static,
        W: WebhookClient + 'static,
    {
        let mut runtime = Self::new();
        runtime.spawn_dispatcher(dispatcher, config.dispatch_interval);
        runtime.spawn_sweeper(engine.clone(), config.sweep_interval);
        runtime.spawn_event_listener(engine, events);
        tracing::info!(
            dispatch_interval_secs = config.dispatch_interval.as_secs(),
            sweep_interval_secs = config.sweep_interval.as_secs(),
            "runtime started"
        );
        runtime
    }

    pub fn spawn_dispatcher<TR>(&mut self, dispatcher: Arc<Dispatcher<TR>>, every: Duration)
    where
        TR: TaskRepository + 'static,
    {
        let mut shutdown = self.shutdown.subscribe();
        self.handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        match dispatcher.tick().await {
                            Ok(report) if !report.claimed.is_empty() => tracing::debug!(
                                claimed = report.claimed.len(),
                                completed = report.completed.len(),
                                failed = report.failed.len(),
                                "dispatch tick"
                            ),
                            Ok(_) => {}
                            Err(err) => tracing::error!(%err, "dispatch tick failed"),
                        }
                    }
                }
            }
            tracing::debug!("dispatcher loop stopped");
        }));
    }

    pub fn spawn_sweeper<AR, RR, TR, M, LC, W>(
        &mut self,
        engine: Arc<AutomationEngine<AR, RR, TR, M, LC, W>>,
        every: Duration,
    ) where
        AR: AutomationRepository + 'static,
        RR: RecordRepository + 'static,
        TR: TaskRepository + 'static,
        M: Mailer + 'static,
        LC: LeadConverter + 'static,
        W: WebhookClient + 'static,
    {
        let mut shutdown = self.shutdown.subscribe();
        self.handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        match engine.tick_schedule().await {
                            Ok(Some(reports)) => tracing::debug!(cycles = reports.len(), "schedule sweep"),
                            Ok(None) => {}
                            Err(err) => tracing::error!(%err, "schedule sweep failed"),
                        }
                    }
                }
            }
            tracing::debug!("sweeper loop stopped");
        }));
    }

    pub fn spawn_event_listener<AR, RR, TR, M, LC, W>(
        &mut self,
        engine: Arc<AutomationEngine<AR, RR, TR, M, LC, W>>,
        mut events: broadcast::Receiver<RecordEvent>,
    ) where
        AR: AutomationRepository + 'static,
        RR: RecordRepository + 'static,
        TR: TaskRepository + 'static,
        M: Mailer + 'static,
        LC: LeadConverter + 'static,
        W: WebhookClient + 'static,
    {
        let mut shutdown = self.shutdown.subscribe();
        self.handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    received = events.recv() => match received {
                        Ok(event) => process_event(&engine, &event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::error!(skipped, "event listener lagged, events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            let mut drained = 0_usize;
            loop {
                match events.try_recv() {
                    Ok(event) => {
                        process_event(&engine, &event).await;
                        drained += 1;
                    }
                    Err(TryRecvError::Lagged(skipped)) => {
                        tracing::error!(skipped, "event listener lagged, events dropped");
                    }
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
            tracing::debug!(drained, "event listener stopped");
        }));
    }

    /// Signal every loop to stop after its current tick and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::error!(%err, "runtime loop ended abnormally");
            }
        }
        tracing::info!("runtime stopped");
    }
}

async fn process_event<AR, RR, TR, M, LC, W>(
    engine: &AutomationEngine<AR, RR, TR, M, LC, W>,
    event: &RecordEvent,
) where
    AR: AutomationRepository,
    RR: RecordRepository,
    TR: TaskRepository,
    M: Mailer,
    LC: LeadConverter,
    W: WebhookClient,
{
    if let Err(err) = engine.process_event(event).await {
        tracing::error!(%err, record_id = %event.record.id(), event = %event.event, "failed to process record event");
    }
}
