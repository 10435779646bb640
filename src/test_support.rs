//! Log capture and canned transport mocks for unit tests.
use crate::transport::{HttpResponse, MockHttpTransport, TransportError};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::RefCell;
use std::sync::Once;

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Records into a per-thread buffer so parallel tests do not see each other's output.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let entry = (record.level(), record.args().to_string());
        RECORDS.with(|r| r.borrow_mut().push(entry));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Install the capturing logger and clear what this thread captured so far.
pub fn capture_logs() {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|r| r.borrow_mut().clear());
}

fn count(level: Level) -> usize {
    RECORDS.with(|r| r.borrow().iter().filter(|(l, _)| *l == level).count())
}

pub fn warning_count() -> usize {
    count(Level::Warn)
}

pub fn error_count() -> usize {
    count(Level::Error)
}

/// Whether any captured entry mentions `needle`.
pub fn logged(needle: &str) -> bool {
    RECORDS.with(|r| r.borrow().iter().any(|(_, m)| m.contains(needle)))
}

/// Transport expecting exactly one post, answered with `response`.
pub fn answering(response: HttpResponse) -> MockHttpTransport {
    let mut http = MockHttpTransport::new();
    http.expect_post()
        .times(1)
        .returning(move |_| Ok(response.clone()));
    http
}

/// Transport expecting exactly one post, which fails below HTTP.
pub fn unreachable(reason: &str) -> MockHttpTransport {
    let reason = reason.to_string();
    let mut http = MockHttpTransport::new();
    http.expect_post()
        .times(1)
        .returning(move |_| Err(TransportError(reason.clone())));
    http
}

/// Transport that fails the test if anything is posted.
pub fn untouched() -> MockHttpTransport {
    let mut http = MockHttpTransport::new();
    http.expect_post().never();
    http
}
