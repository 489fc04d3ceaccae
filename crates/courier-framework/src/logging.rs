//! The logging interceptor.
//!
//! [`LoggingInterceptor`] writes one line when a message comes in and one
//! when its handling ends:
//!
//! ```text
//! INFO  Incoming message: [OrderPlaced]
//! INFO  [OrderPlaced] executed successfully with a [null] return value
//! WARN  [OrderPlaced] execution failed        (with the failure attached)
//! ```
//!
//! Lines go to a [`LogSink`]. The default sink emits `tracing` events; a
//! [`RecordingLogSink`] keeps them in memory instead.

use std::fmt;
use std::sync::Arc;

use courier_core::{DispatchResult, Failure, Message, MessageId, result_label};
use parking_lot::Mutex;
use tracing::Level;

use crate::interceptor::{InterceptorChain, MessageDispatchInterceptor, MessageHandlerInterceptor};
use crate::unit_of_work::UnitOfWork;

/// Logger name used when none is given.
pub const DEFAULT_LOGGER: &str = "courier::logging_interceptor";

/// Unit-of-work resource holding the [`MessageId`] whose incoming line was
/// already written on dispatch.
pub const INCOMING_LOGGED: &str = "courier.logging.incoming_logged";

// ============================================================================
// LogRecord / LogSink
// ============================================================================

/// One line produced by the logging interceptor.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    /// The failure that ended the handling, for failure lines.
    pub cause: Option<Failure>,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.cause = Some(cause);
        self
    }
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    /// Returns `true` if records at `level` would be kept.
    fn is_enabled(&self, level: Level) -> bool;

    /// Writes a record. Errors are reported but never fail the handling.
    fn log(&self, record: LogRecord) -> Result<(), Failure>;
}

// ============================================================================
// TracingLogSink
// ============================================================================

/// Emits records as `tracing` events carrying a `logger` field.
#[derive(Debug, Clone)]
pub struct TracingLogSink {
    logger: String,
}

impl TracingLogSink {
    pub fn new() -> Self {
        Self::named(DEFAULT_LOGGER)
    }

    /// Uses `logger` as the value of the `logger` field. The event target is
    /// unchanged, see [`LoggingInterceptor::named`].
    pub fn named(logger: impl Into<String>) -> Self {
        Self {
            logger: logger.into(),
        }
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }
}

impl Default for TracingLogSink {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! emit {
    ($level:ident, $logger:ident, $message:ident, $cause:ident) => {
        match $cause {
            Some(cause) => tracing::$level!(logger = $logger, cause = %cause, "{}", $message),
            None => tracing::$level!(logger = $logger, "{}", $message),
        }
    };
}

impl LogSink for TracingLogSink {
    fn is_enabled(&self, level: Level) -> bool {
        match level {
            Level::ERROR => tracing::enabled!(Level::ERROR),
            Level::WARN => tracing::enabled!(Level::WARN),
            Level::INFO => tracing::enabled!(Level::INFO),
            Level::DEBUG => tracing::enabled!(Level::DEBUG),
            _ => tracing::enabled!(Level::TRACE),
        }
    }

    fn log(&self, record: LogRecord) -> Result<(), Failure> {
        let logger = self.logger.as_str();
        let message = record.message.as_str();
        let cause = record.cause.as_ref();
        match record.level {
            Level::ERROR => emit!(error, logger, message, cause),
            Level::WARN => emit!(warn, logger, message, cause),
            Level::INFO => emit!(info, logger, message, cause),
            Level::DEBUG => emit!(debug, logger, message, cause),
            _ => emit!(trace, logger, message, cause),
        }
        Ok(())
    }
}

// ============================================================================
// RecordingLogSink
// ============================================================================

/// Keeps records in memory.
///
/// Clones share the same records. Useful for tests and for diagnostics
/// endpoints that show recent activity.
#[derive(Clone)]
pub struct RecordingLogSink {
    records: Arc<Mutex<Vec<LogRecord>>>,
    max_level: Level,
    failing: bool,
}

impl RecordingLogSink {
    /// Records everything up to `TRACE`.
    pub fn new() -> Self {
        Self::with_max_level(Level::TRACE)
    }

    /// Records only levels at least as severe as `max_level`.
    pub fn with_max_level(max_level: Level) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            max_level,
            failing: false,
        }
    }

    /// A sink that rejects every record.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// The messages of the records at `level`.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .map(|r| r.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Default for RecordingLogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for RecordingLogSink {
    fn is_enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }

    fn log(&self, record: LogRecord) -> Result<(), Failure> {
        if self.failing {
            return Err(Failure::msg("recording sink rejects all records"));
        }
        self.records.lock().push(record);
        Ok(())
    }
}

impl fmt::Debug for RecordingLogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingLogSink")
            .field("records", &self.records.lock().len())
            .field("max_level", &self.max_level)
            .field("failing", &self.failing)
            .finish()
    }
}

// ============================================================================
// LoggingInterceptor
// ============================================================================

/// Logs incoming messages and how their handling ended.
///
/// Works both as a handler interceptor and as a dispatch interceptor; on
/// dispatch only the incoming line is written. The result of the chain is
/// always returned unchanged.
#[derive(Clone)]
pub struct LoggingInterceptor {
    sink: Arc<dyn LogSink>,
}

impl LoggingInterceptor {
    /// Logs through `tracing` under [`DEFAULT_LOGGER`].
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingLogSink::new()))
    }

    /// Logs through `tracing` under the given logger name.
    ///
    /// The name travels as the `logger` field of each event; the event
    /// target stays this module's path. `EnvFilter` directives select on
    /// targets, so a filter cannot address the logger name itself. Filter
    /// on `courier_framework::logging` or use a custom [`LogSink`].
    pub fn named(logger: impl Into<String>) -> Self {
        Self::with_sink(Arc::new(TracingLogSink::named(logger)))
    }

    pub fn with_sink(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    fn write(&self, record: LogRecord) {
        if let Err(error) = self.sink.log(record) {
            tracing::debug!(%error, "Log sink rejected a record");
        }
    }

    fn log_incoming(&self, message: &Message) {
        if self.sink.is_enabled(Level::INFO) {
            self.write(LogRecord::new(
                Level::INFO,
                format!("Incoming message: [{}]", message.label()),
            ));
        }
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHandlerInterceptor for LoggingInterceptor {
    fn handle(&self, unit_of_work: &mut UnitOfWork<'_>, chain: InterceptorChain<'_>) -> DispatchResult {
        let label = unit_of_work.message().label();
        let message_id = unit_of_work.message().id();
        let already_logged = unit_of_work
            .resource_as::<MessageId>(INCOMING_LOGGED)
            .is_some_and(|logged| *logged == message_id);
        if !already_logged {
            self.log_incoming(unit_of_work.message());
        }

        let result = chain.proceed(unit_of_work);

        match &result {
            Ok(value) if self.sink.is_enabled(Level::INFO) => {
                self.write(LogRecord::new(
                    Level::INFO,
                    format!(
                        "[{label}] executed successfully with a [{}] return value",
                        result_label(value.as_ref())
                    ),
                ));
            }
            Ok(_) => {}
            Err(error) => {
                if self.sink.is_enabled(Level::WARN) {
                    self.write(
                        LogRecord::new(Level::WARN, format!("[{label}] execution failed"))
                            .with_cause(error.cause()),
                    );
                }
            }
        }
        result
    }
}

impl MessageDispatchInterceptor for LoggingInterceptor {
    fn handle(&self, message: Message) -> Message {
        self.log_incoming(&message);
        message
    }

    fn logs_incoming(&self) -> bool {
        true
    }
}

impl fmt::Debug for LoggingInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingInterceptor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use courier_core::{DispatchError, ReturnValue};

    use super::*;
    use crate::interceptor::{Interceptors, handler_fn};
    use crate::unit_of_work::Outcome;

    struct StubMessage;

    fn run(sink: &RecordingLogSink, outcome: DispatchResult) -> (DispatchResult, UnitOfWork<'static>) {
        let interceptors =
            Interceptors::new().with(LoggingInterceptor::with_sink(Arc::new(sink.clone())));
        let handler = handler_fn(move |_uow| outcome.clone());
        let mut uow = UnitOfWork::start(Message::new(StubMessage));
        let result = uow.execute_with_result(|uow| interceptors.execute(uow, &handler));
        (result, uow)
    }

    #[test]
    fn test_success_with_absent_result_logs_two_lines() {
        let sink = RecordingLogSink::new();
        let (result, _) = run(&sink, Ok(None));

        assert!(result.unwrap().is_none());
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "Incoming message: [StubMessage]");
        assert_eq!(
            records[1].message,
            "[StubMessage] executed successfully with a [null] return value"
        );
        assert!(records.iter().all(|r| r.level == Level::INFO));
    }

    #[test]
    fn test_success_line_names_the_result_type() {
        let sink = RecordingLogSink::new();
        run(&sink, Ok(Some(ReturnValue::new("done".to_string())))).0.unwrap();
        assert_eq!(
            sink.messages_at(Level::INFO)[1],
            "[StubMessage] executed successfully with a [String] return value"
        );
    }

    #[test]
    fn test_failure_logs_original_cause_and_rolls_back() {
        let sink = RecordingLogSink::new();
        let failure = Failure::msg("handler exploded");

        let (result, uow) = run(&sink, Err(DispatchError::HandlerExecution(failure.clone())));

        assert!(result.unwrap_err().cause().ptr_eq(&failure));
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "Incoming message: [StubMessage]");
        assert_eq!(records[1].level, Level::WARN);
        assert_eq!(records[1].message, "[StubMessage] execution failed");
        assert!(records[1].cause.as_ref().unwrap().ptr_eq(&failure));
        assert!(matches!(uow.outcome(), Some(Outcome::RolledBack(_))));
    }

    #[test]
    fn test_nothing_is_logged_when_info_is_disabled() {
        let sink = RecordingLogSink::with_max_level(Level::WARN);
        let (result, _) = run(&sink, Ok(None));
        assert!(result.is_ok());
        assert!(sink.records().is_empty());

        run(&sink, Err(DispatchError::HandlerExecution(Failure::msg("x")))).0.unwrap_err();
        assert_eq!(sink.messages_at(Level::WARN), vec!["[StubMessage] execution failed"]);
    }

    #[test]
    fn test_sink_errors_do_not_affect_the_result() {
        let sink = RecordingLogSink::failing();
        let (result, _) = run(&sink, Ok(Some(ReturnValue::new(5u8))));
        assert_eq!(result.unwrap().unwrap().downcast_ref::<u8>(), Some(&5));
    }

    #[test]
    fn test_dispatch_logs_only_the_incoming_line() {
        let sink = RecordingLogSink::new();
        let interceptor = LoggingInterceptor::with_sink(Arc::new(sink.clone()));
        let message = Message::new(StubMessage);

        let passed = MessageDispatchInterceptor::handle(&interceptor, message.clone());

        assert_eq!(passed.id(), message.id());
        assert_eq!(sink.messages_at(Level::INFO), vec!["Incoming message: [StubMessage]"]);
        assert_eq!(sink.records().len(), 1);
        assert!(MessageDispatchInterceptor::logs_incoming(&interceptor));
    }

    #[test]
    fn test_incoming_line_skipped_when_logged_on_dispatch() {
        let sink = RecordingLogSink::new();
        let interceptors =
            Interceptors::new().with(LoggingInterceptor::with_sink(Arc::new(sink.clone())));
        let handler = handler_fn(|_uow| Ok(None));

        let mut uow = UnitOfWork::start(Message::new(StubMessage));
        let id = uow.message().id();
        uow.put_resource(INCOMING_LOGGED, id);
        uow.execute_with_result(|uow| interceptors.execute(uow, &handler))
            .unwrap();

        assert_eq!(
            sink.messages_at(Level::INFO),
            vec!["[StubMessage] executed successfully with a [null] return value"]
        );

        let mut other = UnitOfWork::start(Message::new(StubMessage));
        other.put_resource(INCOMING_LOGGED, id);
        other
            .execute_with_result(|uow| interceptors.execute(uow, &handler))
            .unwrap();
        assert_eq!(sink.records().len(), 3, "a different message logs its incoming line");
    }
}
