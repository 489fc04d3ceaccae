//! The unit of work.
//!
//! A [`UnitOfWork`] wraps the processing of one message. It moves through a
//! fixed set of phases and runs the callbacks registered for each phase in
//! registration order:
//!
//! ```text
//! Started ─┬─> PrepareCommit ─┬─> Commit ─> AfterCommit ─┐
//!          │                  └─────────────┐            ├─> Cleanup ─> Closed
//!          └──────────────────────────────> Rollback ────┘
//! ```
//!
//! Units of work nest: [`UnitOfWork::start_nested`] borrows the parent for as
//! long as the nested unit lives, which suspends the parent. A nested unit
//! that completes hands its commit, after-commit, rollback and cleanup
//! callbacks to the parent, so they run when the parent commits or rolls back.
//! A nested unit that fails rolls back immediately.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::Arc;

use courier_core::{Argument, DispatchError, Failure, Message};
use thiserror::Error;
use tracing::{debug, debug_span, trace, warn};

use crate::resolver::ResourceScope;

// ============================================================================
// Phases and outcomes
// ============================================================================

/// Lifecycle phase of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Started,
    PrepareCommit,
    Commit,
    Rollback,
    AfterCommit,
    Cleanup,
    Closed,
}

impl Phase {
    /// Returns `true` while the unit of work has neither committed nor rolled back.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Started | Self::PrepareCommit)
    }
}

/// How a unit of work ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    Committed,
    RolledBack(Failure),
    /// A nested unit completed; its commit runs when the parent commits.
    Deferred,
}

impl Outcome {
    pub fn is_rolled_back(&self) -> bool {
        matches!(self, Self::RolledBack(_))
    }

    /// The rollback cause, if the unit rolled back.
    pub fn cause(&self) -> Option<&Failure> {
        match self {
            Self::RolledBack(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Rollback cause used when a unit of work is dropped before it completed.
#[derive(Debug, Error)]
#[error("unit of work for '{0}' was dropped before it completed")]
pub struct Abandoned(String);

/// What a phase callback gets to see.
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext<'a> {
    message: &'a Message,
    phase: Phase,
    cause: Option<&'a Failure>,
}

impl<'a> PhaseContext<'a> {
    fn new(message: &'a Message, phase: Phase, cause: Option<&'a Failure>) -> Self {
        Self {
            message,
            phase,
            cause,
        }
    }

    /// The message of the unit of work that registered the callback.
    pub fn message(&self) -> &'a Message {
        self.message
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The rollback cause, during rollback and the cleanup that follows it.
    pub fn cause(&self) -> Option<&'a Failure> {
        self.cause
    }
}

// ============================================================================
// Callbacks
// ============================================================================

type Callback = Box<dyn FnOnce(&PhaseContext<'_>)>;
type PrepareCallback = Box<dyn FnOnce(&PhaseContext<'_>) -> Result<(), Failure>>;

fn callback<F>(f: F) -> Callback
where
    F: FnOnce(&PhaseContext<'_>) + 'static,
{
    Box::new(f)
}

fn run_callbacks(callbacks: Vec<Callback>, ctx: &PhaseContext<'_>) {
    for callback in callbacks {
        callback(ctx);
    }
}

#[derive(Default)]
struct Callbacks {
    prepare_commit: Vec<PrepareCallback>,
    commit: Vec<Callback>,
    after_commit: Vec<Callback>,
    rollback: Vec<Callback>,
    cleanup: Vec<Callback>,
}

/// Callbacks a finished nested unit hands to its parent.
struct Deferred {
    message: Message,
    commit: Vec<Callback>,
    after_commit: Vec<Callback>,
    rollback: Vec<Callback>,
    cleanup: Vec<Callback>,
}

impl Deferred {
    fn new(message: Message) -> Self {
        Self {
            message,
            commit: Vec::new(),
            after_commit: Vec::new(),
            rollback: Vec::new(),
            cleanup: Vec::new(),
        }
    }
}

/// The view a nested unit has of its parent.
trait ParentUnit {
    fn lookup(&self, key: &str) -> Option<Argument>;
    fn adopt(&mut self, deferred: Deferred);
}

// ============================================================================
// UnitOfWork
// ============================================================================

/// Lifecycle, callbacks and resources for the processing of one message.
///
/// # Example
///
/// ```rust,ignore
/// let mut uow = UnitOfWork::start(Message::new(OrderPlaced { id: 1 }));
/// uow.on_commit(|ctx| println!("committed {}", ctx.message().label()));
/// let result = uow.execute_with_result(|uow| adapter.handle(uow));
/// ```
pub struct UnitOfWork<'p> {
    message: Message,
    phase: Phase,
    outcome: Option<Outcome>,
    callbacks: Callbacks,
    resources: HashMap<String, Argument>,
    executing: bool,
    parent: Option<&'p mut dyn ParentUnit>,
}

impl<'p> UnitOfWork<'p> {
    /// Starts a root unit of work for `message`.
    pub fn start(message: Message) -> Self {
        trace!(message_id = %message.id(), "Starting unit of work");
        Self {
            message,
            phase: Phase::Started,
            outcome: None,
            callbacks: Callbacks::default(),
            resources: HashMap::new(),
            executing: false,
            parent: None,
        }
    }

    /// Starts a unit of work nested in this one.
    ///
    /// This unit is suspended until the nested one is dropped.
    pub fn start_nested(&mut self, message: Message) -> UnitOfWork<'_> {
        trace!(
            message_id = %message.id(),
            parent_id = %self.message.id(),
            "Starting nested unit of work"
        );
        UnitOfWork {
            message,
            phase: Phase::Started,
            outcome: None,
            callbacks: Callbacks::default(),
            resources: HashMap::new(),
            executing: false,
            parent: Some(self),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// How the unit ended, once it has.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn is_nested(&self) -> bool {
        self.parent.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Runs `task` and completes the unit of work with its result.
    ///
    /// On success the unit commits and the task's value is returned. On
    /// error the unit rolls back with the error's cause and the error is
    /// returned unchanged. A unit of work executes at most once.
    pub fn execute_with_result<R, F>(&mut self, task: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut Self) -> Result<R, DispatchError>,
    {
        if self.executing || self.phase != Phase::Started {
            return Err(DispatchError::illegal_state(format!(
                "unit of work for '{}' cannot execute in phase {:?}",
                self.message.label(),
                self.phase
            )));
        }
        self.executing = true;

        let span = debug_span!(
            "unit_of_work",
            message_id = %self.message.id(),
            payload = %self.message.label(),
            nested = self.is_nested()
        );
        let _entered = span.enter();

        let result = task(&mut *self);
        self.executing = false;

        match result {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(error) => {
                if self.phase.is_active() {
                    self.roll_back(error.cause());
                }
                Err(error)
            }
        }
    }

    /// Commits the unit of work.
    ///
    /// Prepare-commit callbacks may veto; the unit then rolls back and
    /// [`DispatchError::Commit`] carries the veto.
    pub fn commit(&mut self) -> Result<(), DispatchError> {
        if self.phase != Phase::Started {
            return Err(self.wrong_phase("commit"));
        }

        self.phase = Phase::PrepareCommit;
        let message = self.message.clone();
        for prepare in mem::take(&mut self.callbacks.prepare_commit) {
            if let Err(failure) = prepare(&PhaseContext::new(&message, Phase::PrepareCommit, None)) {
                debug!(error = %failure, "Commit vetoed during prepare-commit");
                self.roll_back(failure.clone());
                return Err(DispatchError::Commit(failure));
            }
        }

        if self.parent.is_some() {
            let deferred = Deferred {
                message,
                commit: mem::take(&mut self.callbacks.commit),
                after_commit: mem::take(&mut self.callbacks.after_commit),
                rollback: mem::take(&mut self.callbacks.rollback),
                cleanup: mem::take(&mut self.callbacks.cleanup),
            };
            if let Some(parent) = self.parent.as_deref_mut() {
                parent.adopt(deferred);
            }
            self.outcome = Some(Outcome::Deferred);
            self.close();
            debug!("Nested unit of work completed, commit deferred to parent");
            return Ok(());
        }

        self.phase = Phase::Commit;
        run_callbacks(
            mem::take(&mut self.callbacks.commit),
            &PhaseContext::new(&message, Phase::Commit, None),
        );
        self.outcome = Some(Outcome::Committed);

        self.phase = Phase::AfterCommit;
        run_callbacks(
            mem::take(&mut self.callbacks.after_commit),
            &PhaseContext::new(&message, Phase::AfterCommit, None),
        );
        self.callbacks.rollback.clear();

        self.clean_up(None);
        debug!("Unit of work committed");
        Ok(())
    }

    /// Rolls the unit of work back with `cause`.
    pub fn rollback(&mut self, cause: impl Into<Failure>) -> Result<(), DispatchError> {
        if !self.phase.is_active() {
            return Err(self.wrong_phase("roll back"));
        }
        self.roll_back(cause.into());
        Ok(())
    }

    fn roll_back(&mut self, cause: Failure) {
        self.phase = Phase::Rollback;
        let message = self.message.clone();
        run_callbacks(
            mem::take(&mut self.callbacks.rollback),
            &PhaseContext::new(&message, Phase::Rollback, Some(&cause)),
        );
        self.callbacks.prepare_commit.clear();
        self.callbacks.commit.clear();
        self.callbacks.after_commit.clear();
        self.outcome = Some(Outcome::RolledBack(cause.clone()));
        debug!(error = %cause, "Unit of work rolled back");

        if self.parent.is_some() {
            let mut deferred = Deferred::new(message);
            deferred.cleanup = mem::take(&mut self.callbacks.cleanup);
            if let Some(parent) = self.parent.as_deref_mut() {
                parent.adopt(deferred);
            }
            self.close();
        } else {
            self.clean_up(Some(&cause));
        }
    }

    fn clean_up(&mut self, cause: Option<&Failure>) {
        self.phase = Phase::Cleanup;
        let message = self.message.clone();
        run_callbacks(
            mem::take(&mut self.callbacks.cleanup),
            &PhaseContext::new(&message, Phase::Cleanup, cause),
        );
        self.close();
    }

    fn close(&mut self) {
        self.resources.clear();
        self.phase = Phase::Closed;
    }

    fn wrong_phase(&self, action: &str) -> DispatchError {
        DispatchError::illegal_state(format!(
            "cannot {action} unit of work for '{}' in phase {:?}",
            self.message.label(),
            self.phase
        ))
    }

    // ========================================================================
    // Callback registration
    // ========================================================================

    fn accepts_callbacks(&self, kind: &str) -> bool {
        if self.phase == Phase::Started {
            return true;
        }
        warn!(
            phase = ?self.phase,
            callback = kind,
            "Ignoring callback registered after the unit of work left the started phase"
        );
        false
    }

    /// Registers a callback that may veto the commit by returning an error.
    pub fn on_prepare_commit<F>(&mut self, f: F)
    where
        F: FnOnce(&PhaseContext<'_>) -> Result<(), Failure> + 'static,
    {
        if self.accepts_callbacks("prepare_commit") {
            self.callbacks.prepare_commit.push(Box::new(f));
        }
    }

    pub fn on_commit<F>(&mut self, f: F)
    where
        F: FnOnce(&PhaseContext<'_>) + 'static,
    {
        if self.accepts_callbacks("commit") {
            self.callbacks.commit.push(Box::new(f));
        }
    }

    pub fn after_commit<F>(&mut self, f: F)
    where
        F: FnOnce(&PhaseContext<'_>) + 'static,
    {
        if self.accepts_callbacks("after_commit") {
            self.callbacks.after_commit.push(Box::new(f));
        }
    }

    /// Registers a callback that receives the rollback cause.
    pub fn on_rollback<F>(&mut self, f: F)
    where
        F: FnOnce(&PhaseContext<'_>) + 'static,
    {
        if self.accepts_callbacks("rollback") {
            self.callbacks.rollback.push(Box::new(f));
        }
    }

    /// Registers a callback that runs last, whatever the outcome.
    pub fn on_cleanup<F>(&mut self, f: F)
    where
        F: FnOnce(&PhaseContext<'_>) + 'static,
    {
        if self.accepts_callbacks("cleanup") {
            self.callbacks.cleanup.push(Box::new(f));
        }
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// Stores `value` under `key`, returning the previous value.
    pub fn put_resource<T: Any + Send + Sync>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Option<Argument> {
        self.put_shared_resource(key, Arc::new(value))
    }

    pub fn put_shared_resource(&mut self, key: impl Into<String>, value: Argument) -> Option<Argument> {
        self.resources.insert(key.into(), value)
    }

    /// Stores `value` under the full type name of `T`, where
    /// [`Scoped<T>`](crate::Scoped) parameters look for it.
    pub fn provide<T: Any + Send + Sync>(&mut self, value: T) -> Option<Argument> {
        self.put_resource(std::any::type_name::<T>(), value)
    }

    /// Returns the resource under `key`, falling back to the parent units.
    pub fn resource(&self, key: &str) -> Option<Argument> {
        self.lookup_resource(key)
    }

    /// Returns the resource under `key` as `T`.
    pub fn resource_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.lookup_resource(key)?.downcast::<T>().ok()
    }

    /// Removes a resource held by this unit itself.
    pub fn remove_resource(&mut self, key: &str) -> Option<Argument> {
        self.resources.remove(key)
    }

    fn lookup_resource(&self, key: &str) -> Option<Argument> {
        self.resources
            .get(key)
            .cloned()
            .or_else(|| self.parent.as_deref().and_then(|parent| parent.lookup(key)))
    }
}

impl ParentUnit for UnitOfWork<'_> {
    fn lookup(&self, key: &str) -> Option<Argument> {
        self.lookup_resource(key)
    }

    fn adopt(&mut self, deferred: Deferred) {
        let Deferred {
            message,
            commit,
            after_commit,
            rollback,
            cleanup,
        } = deferred;

        if !commit.is_empty() {
            let message = message.clone();
            self.callbacks.commit.push(callback(move |_| {
                run_callbacks(commit, &PhaseContext::new(&message, Phase::Commit, None));
            }));
        }
        if !after_commit.is_empty() {
            let message = message.clone();
            self.callbacks.after_commit.push(callback(move |_| {
                run_callbacks(after_commit, &PhaseContext::new(&message, Phase::AfterCommit, None));
            }));
        }
        if !rollback.is_empty() {
            let message = message.clone();
            self.callbacks.rollback.push(callback(move |ctx| {
                run_callbacks(rollback, &PhaseContext::new(&message, Phase::Rollback, ctx.cause()));
            }));
        }
        if !cleanup.is_empty() {
            self.callbacks.cleanup.push(callback(move |ctx| {
                run_callbacks(cleanup, &PhaseContext::new(&message, Phase::Cleanup, ctx.cause()));
            }));
        }
    }
}

impl ResourceScope for UnitOfWork<'_> {
    fn resource(&self, key: &str) -> Option<Argument> {
        self.lookup_resource(key)
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        match self.phase {
            Phase::Started | Phase::PrepareCommit => {
                let label = self.message.label();
                warn!(payload = %label, "Unit of work dropped before completion, rolling back");
                self.roll_back(Failure::new(Abandoned(label)));
            }
            // A commit, after-commit or rollback callback unwound.
            Phase::Commit | Phase::AfterCommit | Phase::Rollback => {
                warn!(phase = ?self.phase, "Unit of work interrupted, running cleanup");
                let cause = self.outcome.as_ref().and_then(Outcome::cause).cloned();
                self.clean_up(cause.as_ref());
            }
            Phase::Cleanup => self.close(),
            Phase::Closed => {}
        }
    }
}

impl fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("message", &self.message)
            .field("phase", &self.phase)
            .field("outcome", &self.outcome)
            .field("nested", &self.is_nested())
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn note(journal: &Journal, entry: &'static str) -> impl FnOnce(&PhaseContext<'_>) + 'static {
        let journal = Arc::clone(journal);
        move |_ctx: &PhaseContext<'_>| journal.lock().push(entry.to_string())
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().clone()
    }

    #[test]
    fn test_commit_runs_phases_in_order() {
        let log = journal();
        let mut uow = UnitOfWork::start(Message::new(1u8));
        uow.on_cleanup(note(&log, "cleanup"));
        uow.after_commit(note(&log, "after_commit"));
        uow.on_commit(note(&log, "commit-1"));
        uow.on_commit(note(&log, "commit-2"));
        uow.on_rollback(note(&log, "rollback"));
        let prepared = Arc::clone(&log);
        uow.on_prepare_commit(move |_| {
            prepared.lock().push("prepare".into());
            Ok(())
        });

        let result = uow.execute_with_result(|_| Ok(42));

        assert_eq!(result.unwrap(), 42);
        assert_eq!(
            entries(&log),
            vec!["prepare", "commit-1", "commit-2", "after_commit", "cleanup"]
        );
        assert!(matches!(uow.outcome(), Some(Outcome::Committed)));
        assert_eq!(uow.phase(), Phase::Closed);
    }

    #[test]
    fn test_failure_rolls_back_with_original_cause() {
        let failure = Failure::msg("handler broke");
        let seen = Arc::new(Mutex::new(None::<Failure>));
        let log = journal();

        let mut uow = UnitOfWork::start(Message::new(1u8));
        let seen_in_rollback = Arc::clone(&seen);
        uow.on_rollback(move |ctx| *seen_in_rollback.lock() = ctx.cause().cloned());
        uow.on_commit(note(&log, "commit"));
        uow.on_cleanup(note(&log, "cleanup"));

        let raised = failure.clone();
        let err = uow
            .execute_with_result::<(), _>(|_| Err(DispatchError::HandlerExecution(raised)))
            .unwrap_err();

        assert!(err.cause().ptr_eq(&failure));
        assert!(seen.lock().as_ref().unwrap().ptr_eq(&failure));
        assert!(uow.outcome().unwrap().cause().unwrap().ptr_eq(&failure));
        assert_eq!(entries(&log), vec!["cleanup"]);
        assert_eq!(uow.phase(), Phase::Closed);
    }

    #[test]
    fn test_rollback_releases_resources() {
        let log = journal();
        let mut uow = UnitOfWork::start(Message::new(1u8));
        uow.put_resource("connection", "db-1".to_string());
        uow.on_cleanup(note(&log, "cleanup"));

        let result = uow.execute_with_result::<(), _>(|uow| {
            assert!(uow.resource("connection").is_some());
            Err(DispatchError::HandlerExecution(Failure::msg("handler broke")))
        });

        assert!(result.is_err());
        assert!(uow.resource("connection").is_none());
        assert_eq!(entries(&log), vec!["cleanup"]);
    }

    #[test]
    fn test_prepare_commit_can_veto() {
        let log = journal();
        let mut uow = UnitOfWork::start(Message::new(1u8));
        uow.put_resource("connection", "db-1".to_string());
        uow.on_prepare_commit(|_| Err(Failure::msg("constraint violated")));
        uow.on_commit(note(&log, "commit"));
        uow.on_rollback(note(&log, "rollback"));
        uow.on_cleanup(note(&log, "cleanup"));

        let err = uow.execute_with_result(|_| Ok(())).unwrap_err();

        assert!(matches!(err, DispatchError::Commit(_)));
        assert_eq!(entries(&log), vec!["rollback", "cleanup"]);
        assert!(uow.outcome().unwrap().is_rolled_back());
        assert!(uow.resource("connection").is_none());
        assert_eq!(uow.phase(), Phase::Closed);
    }

    #[test]
    fn test_cleanup_runs_when_a_commit_callback_panics() {
        let log = journal();
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut uow = UnitOfWork::start(Message::new(1u8));
            uow.on_commit(|_| panic!("commit callback failed"));
            uow.after_commit(note(&log, "after_commit"));
            uow.on_cleanup(note(&log, "cleanup"));
            let _ = uow.execute_with_result(|_| Ok(()));
        }));

        assert!(panicked.is_err());
        assert_eq!(entries(&log), vec!["cleanup"]);
    }

    #[test]
    fn test_cleanup_runs_when_a_rollback_callback_panics() {
        let seen = Arc::new(Mutex::new(None::<String>));
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut uow = UnitOfWork::start(Message::new(1u8));
            uow.on_rollback(|_| panic!("rollback callback failed"));
            let seen = Arc::clone(&seen);
            uow.on_cleanup(move |ctx| {
                *seen.lock() = Some(format!("{:?}", ctx.phase()));
            });
            let _ = uow.execute_with_result::<(), _>(|_| {
                Err(DispatchError::HandlerExecution(Failure::msg("handler broke")))
            });
        }));

        assert!(panicked.is_err());
        assert_eq!(seen.lock().as_deref(), Some("Cleanup"));
    }

    #[test]
    fn test_executes_at_most_once() {
        let mut uow = UnitOfWork::start(Message::new(1u8));
        uow.execute_with_result(|_| Ok(())).unwrap();
        let err = uow.execute_with_result(|_| Ok(())).unwrap_err();
        assert!(matches!(err, DispatchError::IllegalState(_)));

        let mut reentrant = UnitOfWork::start(Message::new(2u8));
        let inner = reentrant
            .execute_with_result(|uow| Ok(uow.execute_with_result(|_| Ok(())).is_err()))
            .unwrap();
        assert!(inner);
    }

    #[test]
    fn test_nested_commit_waits_for_parent() {
        let log = journal();
        let mut root = UnitOfWork::start(Message::new("outer"));
        root.on_commit(note(&log, "root-commit"));

        root.execute_with_result(|root| {
            {
                let mut nested = root.start_nested(Message::new("inner"));
                nested.on_commit(note(&log, "nested-commit"));
                nested.on_cleanup(note(&log, "nested-cleanup"));
                nested.execute_with_result(|_| Ok(()))?;
                assert!(matches!(nested.outcome(), Some(Outcome::Deferred)));
            }
            log.lock().push("root-task-done".into());
            Ok(())
        })
        .unwrap();

        assert_eq!(
            entries(&log),
            vec!["root-task-done", "root-commit", "nested-commit", "nested-cleanup"]
        );
    }

    #[test]
    fn test_parent_rollback_rolls_back_completed_nested_units() {
        let log = journal();
        let mut root = UnitOfWork::start(Message::new("outer"));

        let err = root
            .execute_with_result::<(), _>(|root| {
                {
                    let mut nested = root.start_nested(Message::new("inner"));
                    nested.on_commit(note(&log, "nested-commit"));
                    nested.on_rollback(note(&log, "nested-rollback"));
                    nested.execute_with_result(|_| Ok(()))?;
                }
                Err(DispatchError::HandlerExecution(Failure::msg("outer failed")))
            })
            .unwrap_err();

        assert!(matches!(err, DispatchError::HandlerExecution(_)));
        assert_eq!(entries(&log), vec!["nested-rollback"]);
    }

    #[test]
    fn test_nested_failure_rolls_back_immediately() {
        let log = journal();
        let mut root = UnitOfWork::start(Message::new("outer"));
        root.on_commit(note(&log, "root-commit"));

        root.execute_with_result(|root| {
            {
                let mut nested = root.start_nested(Message::new("inner"));
                nested.on_rollback(note(&log, "nested-rollback"));
                nested.on_cleanup(note(&log, "nested-cleanup"));
                let result = nested.execute_with_result::<(), _>(|_| {
                    Err(DispatchError::HandlerExecution(Failure::msg("inner failed")))
                });
                assert!(result.is_err());
            }
            log.lock().push("root-continues".into());
            Ok(())
        })
        .unwrap();

        assert_eq!(
            entries(&log),
            vec!["nested-rollback", "root-continues", "root-commit", "nested-cleanup"]
        );
    }

    #[test]
    fn test_resources_fall_back_to_parent_and_are_released() {
        let mut root = UnitOfWork::start(Message::new(()));
        root.put_resource("tenant", "acme".to_string());
        root.provide(7u32);

        {
            let mut nested = root.start_nested(Message::new(()));
            nested.put_resource("tenant", "override".to_string());
            assert_eq!(*nested.resource_as::<String>("tenant").unwrap(), "override");
            assert_eq!(
                *nested.resource_as::<u32>(std::any::type_name::<u32>()).unwrap(),
                7
            );
            nested.execute_with_result(|_| Ok(())).unwrap();
            assert!(nested.resource("tenant").is_some(), "parent still holds it");
        }

        assert_eq!(*root.resource_as::<String>("tenant").unwrap(), "acme");
        root.execute_with_result(|_| Ok(())).unwrap();
        assert!(root.resource("tenant").is_none());
    }

    #[test]
    fn test_dropping_an_active_unit_rolls_back() {
        let seen = Arc::new(Mutex::new(None::<String>));
        {
            let mut uow = UnitOfWork::start(Message::new(1u8));
            let seen = Arc::clone(&seen);
            uow.on_rollback(move |ctx| {
                *seen.lock() = ctx.cause().map(ToString::to_string);
            });
        }
        let cause = seen.lock().clone().unwrap();
        assert!(cause.contains("dropped before it completed"));
    }

    #[test]
    fn test_late_callbacks_are_ignored() {
        let log = journal();
        let mut uow = UnitOfWork::start(Message::new(1u8));
        uow.execute_with_result(|_| Ok(())).unwrap();
        uow.on_commit(note(&log, "too-late"));
        assert!(entries(&log).is_empty());
    }
}
