//! Background write-through of store mutations.
//!
//! Services hand changed entities to a [`PersistenceHandle`]; a single
//! writer task drains the bounded channel into PostgreSQL in order. A
//! second task mirrors the [`ActivityBus`] into the activity log, and a
//! third prunes old activity rows.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::models::Record;
use super::postgres::PostgresPersistence;
use crate::domain::{ActivityBus, StoreState};

/// One unit of work for the writer task.
#[derive(Debug)]
pub enum PersistCommand {
    /// Insert or replace an entity.
    Upsert(Record),
    /// Remove an entity.
    Delete {
        /// Record kind.
        kind: &'static str,
        /// Record key.
        id: String,
    },
}

/// Sending side of the persistence channel.
///
/// A disabled handle (persistence off, or tests) accepts and drops every
/// command.
#[derive(Debug, Clone, Default)]
pub struct PersistenceHandle {
    sender: Option<mpsc::Sender<PersistCommand>>,
}

impl PersistenceHandle {
    /// A handle that discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Creates a connected handle and the receiving end of its channel.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PersistCommand>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Queues an upsert, waiting for channel capacity.
    pub async fn save(&self, record: Record) {
        self.send(PersistCommand::Upsert(record)).await;
    }

    /// Queues a delete, waiting for channel capacity.
    pub async fn delete(&self, kind: &'static str, id: String) {
        self.send(PersistCommand::Delete { kind, id }).await;
    }

    async fn send(&self, command: PersistCommand) {
        if let Some(sender) = &self.sender
            && sender.send(command).await.is_err()
        {
            tracing::error!("persistence writer stopped; change not persisted");
        }
    }
}

/// Spawns the writer task draining `receiver` into `db`.
///
/// Failures are logged and the writer moves on; the in-memory store stays
/// authoritative for the running process.
pub fn spawn_writer(
    db: PostgresPersistence,
    mut receiver: mpsc::Receiver<PersistCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = receiver.recv().await {
            let result = match &command {
                PersistCommand::Upsert(record) => db.upsert_record(record).await,
                PersistCommand::Delete { kind, id } => db.delete_record(kind, id).await.map(|_| ()),
            };
            if let Err(e) = result {
                tracing::error!(error = %e, ?command, "failed to persist change");
            }
        }
        tracing::info!("persistence writer stopped");
    })
}

/// Waits up to `within` for the writer to flush its queue and stop.
///
/// The writer only stops once every [`PersistenceHandle`] clone is dropped,
/// so callers drop the application state first. Returns `false` if the
/// deadline passed or the task failed.
pub async fn drain_writer(writer: JoinHandle<()>, within: Duration) -> bool {
    match tokio::time::timeout(within, writer).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "persistence writer task failed");
            false
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = within.as_secs(),
                "persistence writer did not drain in time; queued changes may be lost"
            );
            false
        }
    }
}

/// Spawns the task appending every published activity to the activity log.
pub fn spawn_activity_logger(db: PostgresPersistence, bus: &ActivityBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(activity) => {
                    let payload = match serde_json::to_value(&activity) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to serialize activity");
                            continue;
                        }
                    };
                    if let Err(e) = db
                        .append_activity(
                            *activity.event_id().as_uuid(),
                            activity.activity_type_str(),
                            &payload,
                        )
                        .await
                    {
                        tracing::error!(error = %e, "failed to append activity");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "activity logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Spawns the periodic activity-log pruning task.
pub fn spawn_retention(
    db: PostgresPersistence,
    retention_days: u64,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match db.delete_old_activities(retention_days).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(deleted = n, retention_days, "pruned activity log"),
                Err(e) => tracing::warn!(error = %e, "activity log pruning failed"),
            }
        }
    })
}

/// Rebuilds in-memory state from stored records.
pub fn restore(state: &mut StoreState, records: Vec<Record>) {
    for record in records {
        match record {
            Record::User(v) => {
                state.users.insert(v.id, v);
            }
            Record::Event(v) => {
                state.events.insert(v.id, v);
            }
            Record::Registration(v) => {
                state.registrations.insert(v.id, v);
            }
            Record::Payment(v) => {
                state.payments.insert(v.id, v);
            }
            Record::Ticket(v) => {
                state.tickets.insert(v.id, v);
            }
            Record::Scan(v) => state.scans.push(v),
            Record::Profile(v) => {
                state.profiles.insert(v.user_id, v);
            }
            Record::Message(v) => {
                state.messages.insert(v.id, v);
            }
            Record::Connection(v) => {
                state.connections.insert(v.id, v);
            }
            Record::SiteConfig(map) => state.site_config = map.into_iter().collect(),
        }
    }
    state.scans.sort_by_key(|s| s.scanned_at);
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::event::tests::sample_event;

    #[tokio::test]
    async fn disabled_handle_drops_commands() {
        let handle = PersistenceHandle::disabled();
        assert!(handle.sender.is_none());
        handle.save(Record::Event(sample_event())).await;
    }

    #[tokio::test]
    async fn enabled_handle_forwards_in_order() {
        let (handle, mut rx) = PersistenceHandle::channel(4);
        let event = sample_event();
        handle.save(Record::Event(event.clone())).await;
        handle.delete("event", event.id.to_string()).await;

        let Some(PersistCommand::Upsert(Record::Event(saved))) = rx.recv().await else {
            panic!("expected upsert first");
        };
        assert_eq!(saved.id, event.id);
        let Some(PersistCommand::Delete { kind, id }) = rx.recv().await else {
            panic!("expected delete second");
        };
        assert_eq!(kind, "event");
        assert_eq!(id, event.id.to_string());
    }

    #[tokio::test]
    async fn drain_waits_for_queued_commands_after_senders_drop() {
        let (handle, mut rx) = PersistenceHandle::channel(8);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
                let _ = done_tx.send(command);
            }
        });

        let event = sample_event();
        for _ in 0..3 {
            handle.save(Record::Event(event.clone())).await;
        }
        handle.delete("event", event.id.to_string()).await;
        drop(handle);

        assert!(drain_writer(writer, Duration::from_secs(5)).await);
        let mut written = 0;
        while done_rx.try_recv().is_ok() {
            written += 1;
        }
        assert_eq!(written, 4);
    }

    #[tokio::test]
    async fn drain_gives_up_while_a_sender_is_alive() {
        let (handle, mut rx) = PersistenceHandle::channel(1);
        let writer = tokio::spawn(async move { while rx.recv().await.is_some() {} });
        assert!(!drain_writer(writer, Duration::from_millis(50)).await);
        drop(handle);
    }

    #[test]
    fn restore_populates_state() {
        let mut state = StoreState::default();
        let event = sample_event();
        let mut config = serde_json::Map::new();
        config.insert("site_name".to_string(), serde_json::json!("Alumni"));
        restore(
            &mut state,
            vec![Record::Event(event.clone()), Record::SiteConfig(config)],
        );
        assert!(state.events.contains_key(&event.id));
        assert_eq!(
            state.site_config.get("site_name"),
            Some(&serde_json::json!("Alumni"))
        );
    }
}
