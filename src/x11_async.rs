//! X11 readiness watcher
//!
//! Lets the async host wait for the X connection to become readable
//! without blocking a runtime thread. A blocking task polls the descriptor
//! with mio and wakes the host loop through a `Notify`.

use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{Notify, oneshot};

/// Readiness of the X connection descriptor
pub struct X11Readiness {
    notify: Arc<Notify>,
    /// Dropping this stops the polling task
    _stop: oneshot::Receiver<()>,
}

impl X11Readiness {
    /// Start watching `fd`. The descriptor must stay open while the watcher
    /// is alive.
    pub fn new(fd: RawFd) -> Result<Self> {
        let notify = Arc::new(Notify::new());
        let task_notify = notify.clone();

        let (stopped, stop) = oneshot::channel::<()>();
        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        let mut events = mio::Events::with_capacity(1);

        poll.registry()
            .register(
                &mut mio::unix::SourceFd(&fd),
                mio::Token(0),
                mio::Interest::READABLE,
            )
            .context("Failed to register X11 FD with mio")?;

        let timeout = Duration::from_millis(100);
        tokio::task::spawn_blocking(move || {
            loop {
                if stopped.is_closed() {
                    tracing::info!("X11 socket polling thread shutting down");
                    return;
                }

                if let Err(err) = poll.poll(&mut events, Some(timeout)) {
                    tracing::warn!("X11 socket poll failed: {:?}", err);
                    continue;
                }

                events
                    .iter()
                    .filter(|event| event.token() == mio::Token(0))
                    .for_each(|_| task_notify.notify_one());
            }
        });

        Ok(Self {
            notify,
            _stop: stop,
        })
    }

    /// Wait until the descriptor has become readable since the last wait
    pub async fn wait_readable(&self) {
        self.notify.notified().await;
    }
}
