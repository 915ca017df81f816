// In-process platform used by the unit tests: canned records per kind,
// counters for starts and built extractors, and in-flight tracking.

use std::{
  collections::HashMap,
  io,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
  time::Duration,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use crate::{
  config::{ExtractorConfig, ExtractorKind},
  extractor::{Backend, Extractor},
  Error, Result,
};

#[derive(Clone, Default)]
pub struct FakeBackend {
  state: Arc<FakeState>,
  delay: Duration,
  start_delay: Duration,
}

#[derive(Default)]
struct FakeState {
  starts: AtomicUsize,
  failing_starts: AtomicUsize,
  built: AtomicUsize,
  broken_kind: Mutex<Option<ExtractorKind>>,
  records: Mutex<HashMap<ExtractorKind, Result<Option<Value>>>>,
  targets: Mutex<Vec<String>>,
  flights: Mutex<Flights>,
}

#[derive(Default)]
struct Flights {
  current: HashMap<ExtractorKind, usize>,
  max: HashMap<ExtractorKind, usize>,
  total: usize,
  max_total: usize,
}

impl FakeBackend {
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn with_start_delay(mut self, delay: Duration) -> Self {
    self.start_delay = delay;
    self
  }

  /// The next `n` starts fail.
  pub fn fail_starts(&self, n: usize) {
    self.state.failing_starts.store(n, Ordering::SeqCst);
  }

  pub fn break_extractor(&self, kind: Option<ExtractorKind>) {
    *self.state.broken_kind.lock().unwrap() = kind;
  }

  pub fn set_record(&self, kind: ExtractorKind, record: Result<Option<Value>>) {
    self.state.records.lock().unwrap().insert(kind, record);
  }

  pub fn starts(&self) -> usize {
    self.state.starts.load(Ordering::SeqCst)
  }

  pub fn built(&self) -> usize {
    self.state.built.load(Ordering::SeqCst)
  }

  pub fn targets(&self) -> Vec<String> {
    self.state.targets.lock().unwrap().clone()
  }

  pub fn max_in_flight(&self, kind: ExtractorKind) -> usize {
    let flights = self.state.flights.lock().unwrap();
    flights.max.get(&kind).copied().unwrap_or_default()
  }

  pub fn max_in_flight_total(&self) -> usize {
    self.state.flights.lock().unwrap().max_total
  }
}

#[async_trait]
impl Backend for FakeBackend {
  fn name(&self) -> &'static str {
    "fake"
  }

  async fn start(&self) -> Result<()> {
    self.state.starts.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(self.start_delay).await;

    let failing = &self.state.failing_starts;
    if failing.load(Ordering::SeqCst) > 0 {
      failing.fetch_sub(1, Ordering::SeqCst);
      return Err(Error::Initialization("runtime unavailable".into()));
    }
    Ok(())
  }

  fn extractor(&self, config: &ExtractorConfig) -> Result<Arc<dyn Extractor>> {
    if *self.state.broken_kind.lock().unwrap() == Some(config.kind) {
      return Err(Error::Extraction(format!("cannot build {}", config.kind)));
    }

    self.state.built.fetch_add(1, Ordering::SeqCst);
    Ok(Arc::new(FakeExtractor {
      kind: config.kind,
      delay: self.delay,
      state: self.state.clone(),
    }))
  }
}

struct FakeExtractor {
  kind: ExtractorKind,
  delay: Duration,
  state: Arc<FakeState>,
}

impl FakeExtractor {
  fn enter(&self) {
    let mut flights = self.state.flights.lock().unwrap();
    let current = flights.current.entry(self.kind).or_default();
    *current += 1;
    let current = *current;
    let max = flights.max.entry(self.kind).or_default();
    *max = (*max).max(current);
    flights.total += 1;
    flights.max_total = flights.max_total.max(flights.total);
  }

  fn leave(&self) {
    let mut flights = self.state.flights.lock().unwrap();
    *flights.current.entry(self.kind).or_default() -= 1;
    flights.total -= 1;
  }
}

#[async_trait]
impl Extractor for FakeExtractor {
  async fn extract(&self, target: &str) -> Result<Option<Value>> {
    self.state.targets.lock().unwrap().push(target.to_string());
    self.enter();
    tokio::time::sleep(self.delay).await;
    self.leave();

    let record = self.state.records.lock().unwrap().get(&self.kind).cloned();
    record.unwrap_or_else(|| Ok(Some(json!({}))))
  }
}

/// Collects formatted log lines for the current thread while installed.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
  pub fn install(&self) -> DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
      .with_writer(self.clone())
      .with_ansi(false)
      .finish();
    tracing::subscriber::set_default(subscriber)
  }

  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
  }
}

impl io::Write for LogCapture {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> MakeWriter<'a> for LogCapture {
  type Writer = Self;

  fn make_writer(&'a self) -> Self::Writer {
    self.clone()
  }
}
