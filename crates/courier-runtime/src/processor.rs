//! Message processing: a handler adapter behind interceptor chains, one unit
//! of work per message.
//!
//! ```rust,ignore
//! use courier_runtime::MessageProcessor;
//!
//! let processor = MessageProcessor::from_config_file(adapter, "courier.toml")?;
//! let result = processor.dispatch_and_process(Message::new(OrderPlaced { id: 7 }))?;
//! processor.prepare_reset()?;
//! tracing::info!(stats = %processor.stats(), "Replay finished");
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use courier_core::{DispatchError, DispatchResult, Message};
use courier_framework::{
    DispatchInterceptors, HandlerAdapter, INCOMING_LOGGED, Interceptors, LoggingInterceptor,
    MessageDispatchInterceptor, MessageHandlerInterceptor, NoResources, ResourceScope,
    UnitOfWork,
};
use serde::Serialize;
use tracing::{debug, debug_span, info};

use crate::config::{CourierConfig, load_config_from_file};
use crate::error::RuntimeResult;
use crate::logging;

/// Counters of a [`MessageProcessor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorStats {
    /// Messages handed to a unit of work.
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Completed `prepare_reset` runs.
    pub resets: u64,
}

impl fmt::Display for ProcessorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Messages: {} processed ({} succeeded, {} failed), {} resets",
            self.processed, self.succeeded, self.failed, self.resets
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    resets: AtomicU64,
}

/// Runs messages through the interceptor chains into one [`HandlerAdapter`].
///
/// Immutable after construction and safe to share between threads; each
/// call drives its own unit of work on the calling thread.
pub struct MessageProcessor {
    name: String,
    adapter: Arc<HandlerAdapter>,
    interceptors: Interceptors,
    dispatch_interceptors: DispatchInterceptors,
    counters: Counters,
}

impl MessageProcessor {
    pub fn builder(adapter: HandlerAdapter) -> ProcessorBuilder {
        ProcessorBuilder::new(Arc::new(adapter))
    }

    /// Builds a processor with the interceptors `config` enables.
    pub fn from_config(adapter: HandlerAdapter, config: &CourierConfig) -> Self {
        Self::builder(adapter).configure(config).build()
    }

    /// Loads `path`, installs the configured subscriber and builds the
    /// processor.
    pub fn from_config_file(
        adapter: HandlerAdapter,
        path: impl AsRef<Path>,
    ) -> RuntimeResult<Self> {
        let config = load_config_from_file(path)?;
        logging::init_from_config(&config.logging);
        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            "Processor initialized from configuration"
        );
        Ok(Self::from_config(adapter, &config))
    }

    /// Handles `message` in a fresh unit of work.
    ///
    /// The unit commits when the chain succeeds and rolls back with the
    /// error's cause otherwise; the error is returned unchanged.
    pub fn process(&self, message: Message) -> DispatchResult {
        let mut unit_of_work = UnitOfWork::start(message);
        self.process_in(&mut unit_of_work)
    }

    /// Handles `message` in a unit nested in `parent`.
    ///
    /// Commit callbacks of the nested unit run when `parent` commits.
    pub fn process_nested(&self, parent: &mut UnitOfWork<'_>, message: Message) -> DispatchResult {
        let mut nested = parent.start_nested(message);
        self.process_in(&mut nested)
    }

    /// Handles the message of an already started unit of work.
    ///
    /// Callers use this to register callbacks or resources first.
    pub fn process_in(&self, unit_of_work: &mut UnitOfWork<'_>) -> DispatchResult {
        let span = debug_span!(
            "process",
            processor = %self.name,
            message_id = %unit_of_work.message().id()
        );
        let _entered = span.enter();

        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        let adapter = self.adapter.as_ref();
        let result = unit_of_work
            .execute_with_result(|uow| self.interceptors.execute(uow, adapter));

        match &result {
            Ok(_) => self.counters.succeeded.fetch_add(1, Ordering::Relaxed),
            Err(error) => {
                debug!(%error, "Message processing failed");
                self.counters.failed.fetch_add(1, Ordering::Relaxed)
            }
        };
        result
    }

    /// Passes `message` through the dispatch interceptors.
    pub fn dispatch(&self, message: Message) -> Message {
        self.dispatch_interceptors.apply(message)
    }

    pub fn dispatch_all(&self, messages: Vec<Message>) -> Vec<Message> {
        self.dispatch_interceptors.apply_all(messages)
    }

    /// Dispatches `message`, then processes what the interceptors produced.
    ///
    /// An incoming line written on dispatch is not repeated by the handling
    /// side for the same message.
    pub fn dispatch_and_process(&self, message: Message) -> DispatchResult {
        let mut unit_of_work = UnitOfWork::start(self.dispatch(message));
        if self.dispatch_interceptors.logs_incoming() {
            let message_id = unit_of_work.message().id();
            unit_of_work.put_resource(INCOMING_LOGGED, message_id);
        }
        self.process_in(&mut unit_of_work)
    }

    /// Runs the adapter's reset handlers with no resources in scope.
    pub fn prepare_reset(&self) -> Result<(), DispatchError> {
        self.prepare_reset_with(&NoResources)
    }

    /// Runs the adapter's reset handlers, resolving scoped resources from
    /// `scope`.
    pub fn prepare_reset_with(&self, scope: &dyn ResourceScope) -> Result<(), DispatchError> {
        let _entered = debug_span!("prepare_reset", processor = %self.name).entered();
        self.adapter.prepare_reset(scope)?;
        self.counters.resets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            processed: self.counters.processed.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            resets: self.counters.resets.load(Ordering::Relaxed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adapter(&self) -> &Arc<HandlerAdapter> {
        &self.adapter
    }

    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    pub fn dispatch_interceptors(&self) -> &DispatchInterceptors {
        &self.dispatch_interceptors
    }
}

impl fmt::Debug for MessageProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageProcessor")
            .field("name", &self.name)
            .field("adapter", &self.adapter)
            .field("interceptors", &self.interceptors)
            .field("dispatch_interceptors", &self.dispatch_interceptors)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Builder for [`MessageProcessor`].
///
/// Interceptors run in the order they are added, the first outermost.
pub struct ProcessorBuilder {
    name: Option<String>,
    adapter: Arc<HandlerAdapter>,
    interceptors: Interceptors,
    dispatch_interceptors: DispatchInterceptors,
}

impl ProcessorBuilder {
    /// Starts from an adapter that may be shared with other processors.
    pub fn new(adapter: Arc<HandlerAdapter>) -> Self {
        Self {
            name: None,
            adapter,
            interceptors: Interceptors::new(),
            dispatch_interceptors: DispatchInterceptors::new(),
        }
    }

    /// Defaults to the adapter's name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn interceptor(mut self, interceptor: impl MessageHandlerInterceptor + 'static) -> Self {
        self.interceptors = self.interceptors.with(interceptor);
        self
    }

    pub fn dispatch_interceptor(
        mut self,
        interceptor: impl MessageDispatchInterceptor + 'static,
    ) -> Self {
        self.dispatch_interceptors = self.dispatch_interceptors.with(interceptor);
        self
    }

    /// Adds the interceptors enabled in `config`.
    pub fn configure(self, config: &CourierConfig) -> Self {
        let logging = &config.interceptors.logging;
        if !logging.enabled {
            return self;
        }
        let interceptor = LoggingInterceptor::named(logging.logger.clone());
        self.dispatch_interceptor(interceptor.clone())
            .interceptor(interceptor)
    }

    pub fn build(self) -> MessageProcessor {
        let name = self
            .name
            .unwrap_or_else(|| self.adapter.name().to_string());
        debug!(
            processor = %name,
            handlers = self.adapter.handler_count(),
            interceptors = self.interceptors.len(),
            dispatch_interceptors = self.dispatch_interceptors.len(),
            "Message processor built"
        );
        MessageProcessor {
            name,
            adapter: self.adapter,
            interceptors: self.interceptors,
            dispatch_interceptors: self.dispatch_interceptors,
            counters: Counters::default(),
        }
    }
}
