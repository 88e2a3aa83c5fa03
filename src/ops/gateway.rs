//! Optimistic mutation gateway.
//!
//! Every create, update and delete goes through [`Gateway::mutate`]: the local
//! store is changed first, synchronously, and the remote call runs afterwards
//! on the current thread's `LocalSet`. When it completes the gateway
//! reconciles: an authoritative record from the server overwrites the
//! optimistic one, and a failure is handled according to the configured
//! [`ReconciliationPolicy`].
//!
//! Mutations are never queued or coalesced. Two in-flight mutations on the
//! same task both apply immediately, and whichever reconciliation finishes
//! last decides what the store ends up holding.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};

use crate::model::task::{Task, TaskId};
use crate::ops::remote::RemoteMutationError;
use crate::ops::store::{InvalidTaskError, TaskStore};

/// The store shared by the gateway, its reconciliation tails and readers
pub type SharedStore = Rc<RefCell<TaskStore>>;

const EVENT_CAPACITY: usize = 256;

/// What a failed remote call does to the optimistic local state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// The user keeps seeing their change; the failure is only reported
    #[default]
    KeepOptimistic,
    /// The target task is put back the way it was before the mutation
    Rollback,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationPolicy {
    pub on_failure: FailurePolicy,
}

impl ReconciliationPolicy {
    pub fn keep_optimistic() -> Self {
        ReconciliationPolicy {
            on_failure: FailurePolicy::KeepOptimistic,
        }
    }

    pub fn rollback() -> Self {
        ReconciliationPolicy {
            on_failure: FailurePolicy::Rollback,
        }
    }
}

/// Which task a mutation targets and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "kebab-case")]
pub enum MutationIntent {
    /// Carries the placeholder id of the task being created
    Create(TaskId),
    Update(TaskId),
    Delete(TaskId),
}

impl MutationIntent {
    pub fn target(&self) -> &TaskId {
        match self {
            MutationIntent::Create(id) | MutationIntent::Update(id) | MutationIntent::Delete(id) => id,
        }
    }
}

/// Lifecycle of a single mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationPhase {
    Idle,
    Applied,
    RemotePending,
    Reconciled,
    FailureIgnored,
    RolledBack,
}

/// Published on every phase change after the local apply
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEvent {
    pub seq: u64,
    pub intent: MutationIntent,
    pub phase: MutationPhase,
    pub error: Option<RemoteMutationError>,
}

/// How a mutation ended
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// The remote accepted; its record (if it sent one) is now in the store
    Reconciled(Option<Task>),
    /// The remote failed and the optimistic state was kept
    FailureIgnored(RemoteMutationError),
    /// The remote failed and the target was restored
    RolledBack(RemoteMutationError),
}

impl MutationOutcome {
    pub fn phase(&self) -> MutationPhase {
        match self {
            MutationOutcome::Reconciled(_) => MutationPhase::Reconciled,
            MutationOutcome::FailureIgnored(_) => MutationPhase::FailureIgnored,
            MutationOutcome::RolledBack(_) => MutationPhase::RolledBack,
        }
    }

    pub fn error(&self) -> Option<&RemoteMutationError> {
        match self {
            MutationOutcome::Reconciled(_) => None,
            MutationOutcome::FailureIgnored(e) | MutationOutcome::RolledBack(e) => Some(e),
        }
    }
}

/// A remote failure, kept for inspection after the fact
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub seq: u64,
    pub intent: MutationIntent,
    pub error: RemoteMutationError,
}

/// Handle to a mutation whose remote call may still be in flight.
///
/// Dropping the handle does not cancel anything; the reconciliation still
/// lands in the store.
#[derive(Debug)]
pub struct MutationHandle {
    seq: u64,
    intent: MutationIntent,
    join: JoinHandle<MutationOutcome>,
}

impl MutationHandle {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn intent(&self) -> &MutationIntent {
        &self.intent
    }

    pub fn is_settled(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the reconciliation to finish.
    pub async fn settled(self) -> Result<MutationOutcome, JoinError> {
        self.join.await
    }
}

pub struct Gateway {
    store: SharedStore,
    policy: ReconciliationPolicy,
    events: broadcast::Sender<MutationEvent>,
    failures: Rc<RefCell<Vec<FailureRecord>>>,
    next_seq: Cell<u64>,
    next_placeholder: Cell<u64>,
}

impl Gateway {
    pub fn new(store: SharedStore, policy: ReconciliationPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Gateway {
            store,
            policy,
            events,
            failures: Rc::new(RefCell::new(Vec::new())),
            next_seq: Cell::new(1),
            next_placeholder: Cell::new(1),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn policy(&self) -> ReconciliationPolicy {
        self.policy
    }

    /// Receive lifecycle events for mutations issued after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.events.subscribe()
    }

    /// Every remote failure seen so far, oldest first
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.failures.borrow().clone()
    }

    /// A placeholder id unique for the lifetime of this gateway
    pub fn next_placeholder(&self) -> TaskId {
        let n = self.next_placeholder.get();
        self.next_placeholder.set(n + 1);
        TaskId::Placeholder(n)
    }

    /// Apply a mutation locally, then run `remote_call` in the background and
    /// reconcile with its result.
    ///
    /// `apply` runs before this returns. If it fails the store is left as
    /// `apply` left it and no remote call is made. `remote_call` resolves to
    /// the server's copy of the record, or `None` when there is nothing to
    /// reconcile (deletes).
    ///
    /// Must be called from inside a `tokio::task::LocalSet`.
    pub fn mutate<A, R, Fut>(
        &self,
        intent: MutationIntent,
        apply: A,
        remote_call: R,
    ) -> Result<MutationHandle, InvalidTaskError>
    where
        A: FnOnce(&mut TaskStore) -> Result<(), InvalidTaskError>,
        R: FnOnce() -> Fut + 'static,
        Fut: Future<Output = Result<Option<Task>, RemoteMutationError>> + 'static,
    {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);

        let before = {
            let store = self.store.borrow();
            store
                .position(intent.target())
                .map(|pos| (pos, store.all()[pos].clone()))
        };

        apply(&mut *self.store.borrow_mut())?;
        tracing::debug!(seq, target = %intent.target(), "mutation applied");

        let reconciler = Reconciler {
            seq,
            intent: intent.clone(),
            before,
            store: Rc::clone(&self.store),
            policy: self.policy,
            events: self.events.clone(),
            failures: Rc::clone(&self.failures),
        };
        reconciler.publish(MutationPhase::Applied, None);

        let join = tokio::task::spawn_local(async move {
            reconciler.publish(MutationPhase::RemotePending, None);
            let result = remote_call().await;
            reconciler.reconcile(result)
        });

        Ok(MutationHandle { seq, intent, join })
    }
}

/// Everything the background half of a mutation needs
struct Reconciler {
    seq: u64,
    intent: MutationIntent,
    /// Position and record of the target before `apply`
    before: Option<(usize, Task)>,
    store: SharedStore,
    policy: ReconciliationPolicy,
    events: broadcast::Sender<MutationEvent>,
    failures: Rc<RefCell<Vec<FailureRecord>>>,
}

impl Reconciler {
    fn publish(&self, phase: MutationPhase, error: Option<RemoteMutationError>) {
        // No subscribers is fine
        let _ = self.events.send(MutationEvent {
            seq: self.seq,
            intent: self.intent.clone(),
            phase,
            error,
        });
    }

    fn reconcile(&self, result: Result<Option<Task>, RemoteMutationError>) -> MutationOutcome {
        match result {
            Ok(authoritative) => {
                if let Some(record) = &authoritative {
                    self.overwrite_with(record.clone());
                }
                tracing::debug!(seq = self.seq, target = %self.intent.target(), "mutation reconciled");
                self.publish(MutationPhase::Reconciled, None);
                MutationOutcome::Reconciled(authoritative)
            }
            Err(error) => {
                tracing::warn!(
                    seq = self.seq,
                    target = %self.intent.target(),
                    error = %error,
                    "remote mutation failed"
                );
                self.failures.borrow_mut().push(FailureRecord {
                    seq: self.seq,
                    intent: self.intent.clone(),
                    error: error.clone(),
                });
                match self.policy.on_failure {
                    FailurePolicy::KeepOptimistic => {
                        self.publish(MutationPhase::FailureIgnored, Some(error.clone()));
                        MutationOutcome::FailureIgnored(error)
                    }
                    FailurePolicy::Rollback => {
                        self.roll_back();
                        self.publish(MutationPhase::RolledBack, Some(error.clone()));
                        MutationOutcome::RolledBack(error)
                    }
                }
            }
        }
    }

    fn overwrite_with(&self, record: Task) {
        let mut store = self.store.borrow_mut();
        let result = match &self.intent {
            MutationIntent::Create(placeholder) => store.replace(placeholder, record),
            MutationIntent::Update(_) => store.upsert(record),
            MutationIntent::Delete(_) => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(
                seq = self.seq,
                error = %e,
                "server record rejected by the store, keeping optimistic state"
            );
        }
    }

    fn roll_back(&self) {
        let mut store = self.store.borrow_mut();
        let target = self.intent.target();
        let result = match &self.before {
            Some((pos, before)) => {
                if store.position(target).is_some() {
                    store.upsert(before.clone())
                } else {
                    store.restore(*pos, before.clone())
                }
            }
            None => {
                store.remove(target);
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::warn!(seq = self.seq, error = %e, "rollback failed");
        }
    }
}
