//! Message handlers and interceptor chains.
//!
//! A [`MessageHandlerInterceptor`] wraps the handling of a message: it gets
//! the unit of work and an [`InterceptorChain`], and decides whether (and
//! when) to [`proceed`](InterceptorChain::proceed). Because `proceed`
//! consumes the chain, an interceptor can continue at most once; returning
//! without proceeding short-circuits the rest of the chain and the handler.
//!
//! ```rust,ignore
//! let interceptors = Interceptors::new()
//!     .with(LoggingInterceptor::new())
//!     .with(interceptor_fn(|uow, chain| {
//!         uow.provide(Tenant::current());
//!         chain.proceed(uow)
//!     }));
//! let result = interceptors.execute(&mut uow, &adapter);
//! ```

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use courier_core::{DispatchResult, Message};
use tracing::trace;

use crate::unit_of_work::UnitOfWork;

// ============================================================================
// MessageHandler
// ============================================================================

/// The end of an interceptor chain.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, unit_of_work: &mut UnitOfWork<'_>) -> DispatchResult;
}

impl<T: MessageHandler + ?Sized> MessageHandler for Arc<T> {
    fn handle(&self, unit_of_work: &mut UnitOfWork<'_>) -> DispatchResult {
        (**self).handle(unit_of_work)
    }
}

/// A [`MessageHandler`] backed by a closure. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F>(F);

/// Wraps a closure as a [`MessageHandler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut UnitOfWork<'_>) -> DispatchResult + Send + Sync,
{
    HandlerFn(f)
}

impl<F> MessageHandler for HandlerFn<F>
where
    F: Fn(&mut UnitOfWork<'_>) -> DispatchResult + Send + Sync,
{
    fn handle(&self, unit_of_work: &mut UnitOfWork<'_>) -> DispatchResult {
        (self.0)(unit_of_work)
    }
}

// ============================================================================
// MessageHandlerInterceptor
// ============================================================================

/// Wraps the handling of a message.
pub trait MessageHandlerInterceptor: Send + Sync {
    fn handle(&self, unit_of_work: &mut UnitOfWork<'_>, chain: InterceptorChain<'_>) -> DispatchResult;
}

/// A shared interceptor, as stored in a chain.
pub type BoxedInterceptor = Arc<dyn MessageHandlerInterceptor>;

/// A [`MessageHandlerInterceptor`] backed by a closure. See [`interceptor_fn`].
#[derive(Clone)]
pub struct InterceptorFn<F>(F);

/// Wraps a closure as a [`MessageHandlerInterceptor`].
pub fn interceptor_fn<F>(f: F) -> InterceptorFn<F>
where
    F: Fn(&mut UnitOfWork<'_>, InterceptorChain<'_>) -> DispatchResult + Send + Sync,
{
    InterceptorFn(f)
}

impl<F> MessageHandlerInterceptor for InterceptorFn<F>
where
    F: Fn(&mut UnitOfWork<'_>, InterceptorChain<'_>) -> DispatchResult + Send + Sync,
{
    fn handle(&self, unit_of_work: &mut UnitOfWork<'_>, chain: InterceptorChain<'_>) -> DispatchResult {
        (self.0)(unit_of_work, chain)
    }
}

/// The rest of an interceptor chain, ending in the handler.
pub struct InterceptorChain<'a> {
    interceptors: &'a [BoxedInterceptor],
    handler: &'a dyn MessageHandler,
    reached: &'a Cell<bool>,
}

impl InterceptorChain<'_> {
    /// Passes control to the next interceptor, or to the handler.
    pub fn proceed(self, unit_of_work: &mut UnitOfWork<'_>) -> DispatchResult {
        match self.interceptors.split_first() {
            Some((next, rest)) => next.handle(
                unit_of_work,
                InterceptorChain {
                    interceptors: rest,
                    handler: self.handler,
                    reached: self.reached,
                },
            ),
            None => {
                self.reached.set(true);
                self.handler.handle(unit_of_work)
            }
        }
    }

    /// Number of interceptors still ahead of the handler.
    pub fn remaining(&self) -> usize {
        self.interceptors.len()
    }
}

impl fmt::Debug for InterceptorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("remaining", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Interceptors
// ============================================================================

/// Progress of one chain execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Created,
    Running,
    /// The handler ran and succeeded.
    Succeeded,
    /// The handler or an interceptor failed.
    Failed,
    /// An interceptor returned without proceeding; the handler never ran.
    ShortCircuited,
}

/// Result of [`Interceptors::execute_traced`].
#[derive(Debug)]
pub struct ChainOutcome {
    pub state: ChainState,
    pub result: DispatchResult,
}

/// An ordered list of interceptors; the first one added runs outermost.
#[derive(Clone, Default)]
pub struct Interceptors {
    chain: Vec<BoxedInterceptor>,
}

impl Interceptors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interceptor, innermost so far.
    pub fn with(mut self, interceptor: impl MessageHandlerInterceptor + 'static) -> Self {
        self.chain.push(Arc::new(interceptor));
        self
    }

    pub fn push(&mut self, interceptor: BoxedInterceptor) {
        self.chain.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Runs the chain around `handler` and returns its result.
    pub fn execute(&self, unit_of_work: &mut UnitOfWork<'_>, handler: &dyn MessageHandler) -> DispatchResult {
        self.execute_traced(unit_of_work, handler).result
    }

    /// Runs the chain and also reports how it ended.
    pub fn execute_traced(
        &self,
        unit_of_work: &mut UnitOfWork<'_>,
        handler: &dyn MessageHandler,
    ) -> ChainOutcome {
        let reached = Cell::new(false);
        let chain = InterceptorChain {
            interceptors: &self.chain,
            handler,
            reached: &reached,
        };
        trace!(state = ?ChainState::Created, interceptors = self.chain.len(), "Interceptor chain created");

        trace!(state = ?ChainState::Running, "Interceptor chain running");
        let result = chain.proceed(unit_of_work);

        let state = match (&result, reached.get()) {
            (_, false) => ChainState::ShortCircuited,
            (Ok(_), true) => ChainState::Succeeded,
            (Err(_), true) => ChainState::Failed,
        };
        trace!(state = ?state, "Interceptor chain finished");
        ChainOutcome { state, result }
    }
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors")
            .field("len", &self.chain.len())
            .finish()
    }
}

// ============================================================================
// Dispatch interceptors
// ============================================================================

/// Sees (and may replace) a message before it is dispatched.
pub trait MessageDispatchInterceptor: Send + Sync {
    fn handle(&self, message: Message) -> Message;

    /// Returns `true` if [`handle`](Self::handle) already writes the
    /// incoming-message line, so the handling side can skip its own.
    fn logs_incoming(&self) -> bool {
        false
    }
}

/// An ordered list of dispatch interceptors.
#[derive(Clone, Default)]
pub struct DispatchInterceptors {
    chain: Vec<Arc<dyn MessageDispatchInterceptor>>,
}

impl DispatchInterceptors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, interceptor: impl MessageDispatchInterceptor + 'static) -> Self {
        self.chain.push(Arc::new(interceptor));
        self
    }

    pub fn push(&mut self, interceptor: Arc<dyn MessageDispatchInterceptor>) {
        self.chain.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Returns `true` if any interceptor writes the incoming-message line.
    pub fn logs_incoming(&self) -> bool {
        self.chain.iter().any(|interceptor| interceptor.logs_incoming())
    }

    /// Passes `message` through every interceptor in order.
    pub fn apply(&self, message: Message) -> Message {
        self.chain
            .iter()
            .fold(message, |message, interceptor| interceptor.handle(message))
    }

    /// Applies the chain to each message of a batch.
    pub fn apply_all(&self, messages: Vec<Message>) -> Vec<Message> {
        messages.into_iter().map(|m| self.apply(m)).collect()
    }
}

impl fmt::Debug for DispatchInterceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchInterceptors")
            .field("len", &self.chain.len())
            .finish()
    }
}
