//! Cooperative stop signal shared by engines and servers.
//!
//! A `watch` channel rather than `broadcast`: late subscribers still see
//! a stop that already happened, and checking it never blocks.
//! `ProcessSignals` turns SIGINT / SIGTERM into a stop request.

use std::io;

use tokio::sync::watch;

/// Owner side. Dropping it also counts as a stop.
#[derive(Debug)]
pub struct ShutdownController {
  tx: watch::Sender<bool>,
}

impl ShutdownController {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(false);
    Self { tx }
  }

  pub fn subscribe(&self) -> StopSignal {
    StopSignal {
      rx: self.tx.subscribe(),
    }
  }

  /// Ask every subscriber to stop. Idempotent.
  pub fn trigger(&self) {
    self.tx.send_replace(true);
  }

  pub fn is_triggered(&self) -> bool {
    *self.tx.borrow()
  }
}

impl Default for ShutdownController {
  fn default() -> Self {
    Self::new()
  }
}

/// Subscriber side, cheap to clone into every task.
#[derive(Debug, Clone)]
pub struct StopSignal {
  rx: watch::Receiver<bool>,
}

impl StopSignal {
  /// Non-blocking check used between suspension points.
  pub fn is_stopped(&self) -> bool {
    *self.rx.borrow() || self.rx.has_changed().is_err()
  }

  /// Resolves once a stop is requested or the controller is dropped.
  pub async fn stopped(&mut self) {
    // Err means the sender is gone, which is treated as a stop.
    let _ = self.rx.wait_for(|stop| *stop).await;
  }
}

/// OS signals that request a graceful stop. Handlers are installed by
/// `install`, so a signal arriving before `recv` is polled is not lost.
#[derive(Debug)]
pub struct ProcessSignals {
  #[cfg(unix)]
  interrupt: tokio::signal::unix::Signal,
  #[cfg(unix)]
  terminate: tokio::signal::unix::Signal,
}

impl ProcessSignals {
  #[cfg(unix)]
  pub fn install() -> io::Result<Self> {
    use tokio::signal::unix::{SignalKind, signal};
    Ok(Self {
      interrupt: signal(SignalKind::interrupt())?,
      terminate: signal(SignalKind::terminate())?,
    })
  }

  #[cfg(not(unix))]
  pub fn install() -> io::Result<Self> {
    Ok(Self {})
  }

  /// Resolves with the name of the first signal received.
  #[cfg(unix)]
  pub async fn recv(&mut self) -> io::Result<&'static str> {
    tokio::select! {
      _ = self.interrupt.recv() => Ok("SIGINT"),
      _ = self.terminate.recv() => Ok("SIGTERM"),
    }
  }

  #[cfg(not(unix))]
  pub async fn recv(&mut self) -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "Ctrl-C")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_trigger_reaches_existing_and_late_subscribers() {
    let controller = ShutdownController::new();
    let mut early = controller.subscribe();
    assert!(!early.is_stopped());

    controller.trigger();
    early.stopped().await;
    assert!(early.is_stopped());

    let late = controller.subscribe();
    assert!(late.is_stopped());
  }

  #[test]
  fn test_stopped_stays_pending_until_trigger() {
    let controller = ShutdownController::new();
    let mut signal = controller.subscribe();
    let mut stopped = tokio_test::task::spawn(signal.stopped());

    tokio_test::assert_pending!(stopped.poll());
    controller.trigger();
    assert!(stopped.is_woken());
    tokio_test::assert_ready!(stopped.poll());
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn test_sigterm_is_reported_as_stop_request() {
    let mut signals = ProcessSignals::install().unwrap();
    let status = std::process::Command::new("sh")
      .arg("-c")
      .arg(format!("kill -TERM {}", std::process::id()))
      .status()
      .unwrap();
    assert!(status.success());

    let received = tokio::time::timeout(std::time::Duration::from_secs(5), signals.recv())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(received, "SIGTERM");
  }

  #[tokio::test]
  async fn test_dropped_controller_counts_as_stop() {
    let controller = ShutdownController::new();
    let mut signal = controller.subscribe();
    drop(controller);
    signal.stopped().await;
    assert!(signal.is_stopped());
  }
}
