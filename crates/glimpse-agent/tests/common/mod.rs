#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glimpse_agent::{
    AgentConfig, BreakpointId, BreakpointKind, BreakpointSpec, BreakpointStore, FrameView,
    LiveValue, LocationResolver, LogLevel, LogSink, MemoryBreakpointStorage, ProgramIndex,
    ProgramIndexBuilder, ScopeAccess,
};
use smol_str::SmolStr;

/// Program shape shared by the scenario tests: a front controller
/// with a request handler function.
///
/// ```text
/// web/index.php
///   3   require line
///   10  fn handler() {
///   12    ...
///   20    ...
///   34  }  (file-level statement after the function)
///   40  file-level statement
/// ```
pub fn web_app_index() -> Arc<ProgramIndex> {
    let mut builder = ProgramIndexBuilder::new();
    builder.file("web/index.php", 1..=60, |f| {
        f.statement(3);
        f.function("handler", 10..=30, |body| {
            body.statement(12);
            body.statement(20);
        });
        f.statement(34);
        f.statement(40);
    });
    Arc::new(builder.finish())
}

pub fn resolver() -> Arc<LocationResolver> {
    Arc::new(LocationResolver::new(web_app_index()))
}

pub fn capture_spec(id: &str, line: u32) -> BreakpointSpec {
    BreakpointSpec {
        id: BreakpointId::from(id),
        file: SmolStr::new("web/index.php"),
        line,
        kind: BreakpointKind::Capture,
        condition: None,
        log_format: None,
        log_level: LogLevel::Info,
        expires_at: None,
    }
}

pub fn log_spec(id: &str, line: u32, format: &str) -> BreakpointSpec {
    BreakpointSpec {
        log_format: Some(format.to_string()),
        kind: BreakpointKind::Log,
        ..capture_spec(id, line)
    }
}

pub fn store_over(
    storage: &Arc<MemoryBreakpointStorage>,
    config: &AgentConfig,
) -> BreakpointStore {
    let backend: Arc<dyn glimpse_agent::BreakpointStorage> = storage.clone();
    BreakpointStore::new("d-test", backend, resolver(), config)
}

/// Single-frame scope with fixed locals, standing in for the host's
/// live view at a statement boundary.
pub struct TestScope {
    pub function: Option<SmolStr>,
    pub file: SmolStr,
    pub line: u32,
    pub locals: Vec<(SmolStr, LiveValue)>,
}

impl TestScope {
    pub fn at(line: u32, locals: Vec<(&str, LiveValue)>) -> Self {
        Self {
            function: Some(SmolStr::new("handler")),
            file: SmolStr::new("web/index.php"),
            line,
            locals: locals
                .into_iter()
                .map(|(name, value)| (SmolStr::new(name), value))
                .collect(),
        }
    }
}

impl ScopeAccess for TestScope {
    fn frame_count(&self) -> usize {
        1
    }

    fn frame(&self, index: usize) -> Option<FrameView> {
        (index == 0).then(|| FrameView {
            function: self.function.clone(),
            file: self.file.clone(),
            line: self.line,
        })
    }

    fn locals(&self, index: usize) -> Vec<(SmolStr, LiveValue)> {
        if index == 0 {
            self.locals.clone()
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmittedLine {
    pub level: LogLevel,
    pub message: String,
    pub file: String,
    pub line: u32,
}

/// Sink that records every emitted log line for assertions.
#[derive(Debug, Default)]
pub struct CollectingSink {
    lines: Mutex<Vec<EmittedLine>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<EmittedLine> {
        self.lines.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .map(|line| line.message)
            .collect()
    }
}

impl LogSink for CollectingSink {
    fn emit(&self, level: LogLevel, message: &str, file: &str, line: u32) {
        self.lines.lock().unwrap().push(EmittedLine {
            level,
            message: message.to_string(),
            file: file.to_string(),
            line,
        });
    }
}

/// Route agent tracing to the test output, once per process.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Poll until `check` passes or the deadline expires.
pub fn wait_for(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if check() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}
