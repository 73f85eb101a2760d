//! Event system for sync batches.
//!
//! The engine reports batch lifecycle and per-resource decisions as
//! [`SyncEvent`]s. Handlers registered on the [`EventDispatcher`] observe them
//! without being able to influence the batch: a failing handler is logged and
//! the remaining handlers still run.

use crate::sync::progress::SyncReport;
use crate::sync::types::{ResourceKey, SyncError};

use std::sync::Arc;
use tokio::sync::watch;

/// Events that occur while running a sync batch
#[derive(Debug, Clone)]
pub enum SyncEvent {
	BatchStarted {
		jobs: usize,
	},
	/// A digest-gated resource was unchanged and will not be fetched
	ResourceSkipped {
		key: ResourceKey,
	},
	/// A resource's mutation was committed
	ResourceRefreshed {
		name: &'static str,
		key: Option<ResourceKey>,
	},
	BatchCommitted {
		report: SyncReport,
	},
	/// The batch was aborted; nothing was applied
	BatchFailed {
		error: String,
	},
}

/// Trait for handling sync events.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
	async fn handle(&self, event: &SyncEvent) -> Result<(), SyncError>;

	/// Get the name of this handler for logging and diagnostics.
	fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in the order they are registered.
#[derive(Default, Clone)]
pub struct EventDispatcher {
	handlers: Vec<Arc<dyn SyncEventHandler>>,
}

impl EventDispatcher {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register_handler(&mut self, handler: Arc<dyn SyncEventHandler>) {
		self.handlers.push(handler);
	}

	/// Dispatch an event to all registered handlers.
	///
	/// Errors from handlers are logged, but do not stop other handlers from running.
	pub async fn dispatch(&self, event: &SyncEvent) {
		for handler in &self.handlers {
			if let Err(e) = handler.handle(event).await {
				tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
			}
		}
	}
}

/// Latest known state of the sync machinery, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
	#[default]
	Idle,
	Running,
	Succeeded(SyncReport),
	Failed(String),
}

/// Publishes batch outcomes on a watch channel for the presentation layer.
pub struct StatusHandler {
	status: watch::Sender<SyncStatus>,
}

impl StatusHandler {
	pub fn new() -> (Self, watch::Receiver<SyncStatus>) {
		let (status, receiver) = watch::channel(SyncStatus::Idle);
		(Self { status }, receiver)
	}
}

#[async_trait::async_trait]
impl SyncEventHandler for StatusHandler {
	async fn handle(&self, event: &SyncEvent) -> Result<(), SyncError> {
		let next = match event {
			SyncEvent::BatchStarted { .. } => SyncStatus::Running,
			SyncEvent::BatchCommitted { report } => SyncStatus::Succeeded(report.clone()),
			SyncEvent::BatchFailed { error } => SyncStatus::Failed(error.clone()),
			_ => return Ok(()),
		};
		self.status.send_replace(next);
		Ok(())
	}

	fn name(&self) -> &'static str {
		"StatusHandler"
	}
}
