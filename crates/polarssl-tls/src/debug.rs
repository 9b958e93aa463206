//! Debug/trace sink shared by sessions.
//!
//! Levels follow the mbedTLS convention: 1 error, 2 state change,
//! 3 informational, 4 verbose. A message is delivered when
//! `0 < level <= threshold`; the default threshold of 0 disables output.

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use polarssl_types::SslError;

/// Receives `(level, file, line, message)` for every delivered trace line.
pub type DebugCallback = Arc<dyn Fn(u32, &str, u32, &str) + Send + Sync>;

#[derive(Default)]
struct DebugInner {
    threshold: u32,
    /// `None` selects the stderr writer.
    callback: Option<DebugCallback>,
}

/// Threshold plus callback, shared by every session that traces into it.
#[derive(Default)]
pub struct DebugContext {
    inner: RwLock<DebugInner>,
}

static SHARED: OnceLock<Arc<DebugContext>> = OnceLock::new();

impl DebugContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide context, created on first use.
    pub fn shared() -> Arc<DebugContext> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(DebugContext::new())))
    }

    pub fn threshold(&self) -> u32 {
        self.read().threshold
    }

    pub fn set_threshold(&self, level: u32) {
        self.write().threshold = level;
    }

    /// Replace the stderr writer with `callback`.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(u32, &str, u32, &str) + Send + Sync + 'static,
    {
        self.write().callback = Some(Arc::new(callback));
    }

    /// Go back to the stderr writer.
    pub fn clear_callback(&self) {
        self.write().callback = None;
    }

    /// Threshold 0 and the stderr writer.
    pub fn reset(&self) {
        *self.write() = DebugInner::default();
    }

    /// Whether a message at `level` would be delivered.
    pub fn enabled(&self, level: u32) -> bool {
        let threshold = self.read().threshold;
        level != 0 && threshold != 0 && level <= threshold
    }

    /// Deliver one trace line if `level` passes the threshold.
    pub fn emit(&self, level: u32, file: &str, line: u32, message: &str) {
        let callback = {
            let inner = self.read();
            if level == 0 || inner.threshold == 0 || level > inner.threshold {
                return;
            }
            inner.callback.clone()
        };
        // the lock is released so a callback may reconfigure the context
        match callback {
            Some(cb) => cb(level, file, line, message),
            None => eprintln!("{}", format_line(level, file, line, message)),
        }
    }

    /// Route `log` records (including the TLS engine's) into this context.
    ///
    /// Fails if another logger is already installed for the process.
    pub fn install_log_bridge(self: &Arc<Self>) -> Result<(), SslError> {
        log::set_boxed_logger(Box::new(LogBridge {
            context: Arc::clone(self),
        }))
        .map_err(|e| SslError::Config(format!("log bridge: {e}")))?;
        log::set_max_level(log::LevelFilter::Trace);
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, DebugInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DebugInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DebugContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("DebugContext")
            .field("threshold", &inner.threshold)
            .field("callback", &inner.callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Default rendering: `<level>: <file>:<line>: <message>`.
pub fn format_line(level: u32, file: &str, line: u32, message: &str) -> String {
    format!("{level}: {file}:{line}: {}", message.trim_end_matches('\n'))
}

/// Debug level for a `log` record level.
pub fn level_for(level: log::Level) -> u32 {
    match level {
        log::Level::Error => 1,
        log::Level::Warn => 2,
        log::Level::Info => 3,
        log::Level::Debug | log::Level::Trace => 4,
    }
}

struct LogBridge {
    context: Arc<DebugContext>,
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        self.context.enabled(level_for(metadata.level()))
    }

    fn log(&self, record: &log::Record<'_>) {
        let level = level_for(record.level());
        if !self.context.enabled(level) {
            return;
        }
        let file = record.file().unwrap_or_else(|| record.target());
        let message = record.args().to_string();
        self.context
            .emit(level, file, record.line().unwrap_or(0), &message);
    }

    fn flush(&self) {}
}

/// Emit a formatted trace line tagged with the caller's `file!()`/`line!()`.
///
/// ```
/// use polarssl_tls::{ssl_debug, DebugContext};
///
/// let ctx = DebugContext::new();
/// ssl_debug!(ctx, 2, "handshake state {}", 3);
/// ```
#[macro_export]
macro_rules! ssl_debug {
    ($ctx:expr, $level:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        let level: u32 = $level;
        if ctx.enabled(level) {
            ctx.emit(level, file!(), line!(), &format!($($arg)+));
        }
    }};
}
