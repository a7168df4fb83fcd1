//! nwm - window manager session core host
//!
//! Runs the session against the X server and bridges it to a controller
//! over stdio: notifications go out on stdout, commands come in on stdin
//! as one JSON object per line. Logs go to stderr.

use std::os::unix::io::AsRawFd;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, reload, util::SubscriberInitExt};

use nwm::config::{Config, LoggingConfig};
use nwm::wm::{Bridge, Session, X11Conn};
use nwm::x11_async::X11Readiness;
use nwm_ipc::{Command, FramedMessage, Notification};

/// How notifications are written to stdout
#[derive(Debug, Clone, Copy)]
enum Output {
    /// One JSON object per line
    Lines,
    /// Length-prefixed JSON frames
    Framed,
}

async fn write_notification(stdout: &mut Stdout, output: Output, notification: &Notification) -> Result<()> {
    let bytes = match output {
        Output::Lines => {
            let mut line = serde_json::to_vec(notification)?;
            line.push(b'\n');
            line
        }
        Output::Framed => FramedMessage::new(notification)?.encode(),
    };
    stdout.write_all(&bytes).await?;
    Ok(())
}

/// `RUST_LOG` wins over the configured filter
fn filter_directive(env: Option<&str>, logging: &LoggingConfig) -> String {
    env.unwrap_or(&logging.filter).to_string()
}

/// Apply one stdin line. Bad input and failed commands are logged.
fn handle_command(session: &mut Session<X11Conn>, line: &str) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    match serde_json::from_str::<Command>(line) {
        Ok(command) => {
            debug!("Command {:?}", command);
            if let Err(err) = session.apply(command) {
                error!("Command failed: {:#}", err);
            }
        }
        Err(err) => warn!("Ignoring malformed command {:?}: {}", line, err),
    }

    // Replies read while applying the command may have queued events
    session.drain()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Installed before the config is read so its messages are not lost
    let env_filter = std::env::var("RUST_LOG").ok();
    let initial = filter_directive(env_filter.as_deref(), &LoggingConfig::default());
    let (filter, filter_handle) = reload::Layer::new(EnvFilter::new(initial));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().context("Failed to load configuration")?;
    filter_handle
        .reload(EnvFilter::new(filter_directive(env_filter.as_deref(), &config.logging)))
        .context("Failed to apply the configured log filter")?;

    info!("Starting nwm");

    let args: Vec<String> = std::env::args().collect();
    let output = if args.iter().any(|arg| arg == "--framed") {
        Output::Framed
    } else {
        Output::Lines
    };

    let bindings = config.key_bindings()?;
    let (bridge, mut notifications) = Bridge::channel();
    let mut session = Session::open(config.session.display.as_deref(), bridge, config.session_options())?;
    for (keysym, modifier) in bindings {
        session.register_key_binding(keysym, modifier);
    }
    session.start()?;
    session.drain()?;

    let readiness = X11Readiness::new(session.as_raw_fd())?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    loop {
        while let Ok(notification) = notifications.try_recv() {
            write_notification(&mut stdout, output, &notification).await?;
        }
        stdout.flush().await?;

        tokio::select! {
            () = readiness.wait_readable() => {
                session.drain().context("X11 connection lost")?;
            }
            line = stdin.next_line() => match line? {
                Some(line) => handle_command(&mut session, &line)?,
                None => {
                    info!("Controller closed stdin, exiting");
                    break;
                }
            },
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        let logging = LoggingConfig {
            filter: "nwm=trace".to_string(),
        };
        assert_eq!(filter_directive(None, &logging), "nwm=trace");
        assert_eq!(filter_directive(Some("warn"), &logging), "warn");
        assert_eq!(filter_directive(None, &LoggingConfig::default()), "nwm=debug,info");
    }
}
