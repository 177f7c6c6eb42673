use std::io::{self, Write};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use super::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Where fired reminders end up. Permission is asked once when the user
/// turns notifications on; `display` is only called after a grant.
pub trait Notifier: Send {
    fn request_permission(&self) -> Permission;

    fn display(&self, notification: &Notification) -> Result<()>;
}

/// Prints reminders as lines of text. Interactive ones are flagged and ring
/// the terminal bell when enabled.
pub struct StdoutNotifier {
    out: Mutex<Box<dyn Write + Send>>,
    bell: bool,
    require_terminal: bool,
}

impl StdoutNotifier {
    /// Writes to stdout; permission is refused when stdout is not a terminal.
    pub fn new(bell: bool) -> Self {
        Self {
            require_terminal: true,
            ..Self::with_writer(Box::new(io::stdout()), bell)
        }
    }

    pub fn with_writer(out: Box<dyn Write + Send>, bell: bool) -> Self {
        Self {
            out: Mutex::new(out),
            bell,
            require_terminal: false,
        }
    }
}

impl Notifier for StdoutNotifier {
    fn request_permission(&self) -> Permission {
        if self.require_terminal && !atty::is(atty::Stream::Stdout) {
            return Permission::Denied;
        }
        Permission::Granted
    }

    fn display(&self, notification: &Notification) -> Result<()> {
        let mut out = self.out.lock();
        let stamp = notification.fired_at.time();
        let marker = if notification.interactive { "!" } else { "-" };
        writeln!(
            out,
            "[{:02}:{:02}] {marker} {}: {}",
            stamp.hour(),
            stamp.minute(),
            notification.title,
            notification.body
        )
        .context("writing reminder")?;
        if notification.interactive && self.bell {
            write!(out, "\x07").context("ringing terminal bell")?;
        }
        out.flush().context("flushing reminder output")?;
        Ok(())
    }
}

/// Hands reminders to the TUI event loop over a bounded channel.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: Sender<Notification>,
}

impl ChannelNotifier {
    pub fn bounded(capacity: usize) -> (Self, Receiver<Notification>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn display(&self, notification: &Notification) -> Result<()> {
        match self.tx.try_send(notification.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(filter_id = %dropped.filter_id, "reminder queue full, dropping");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                anyhow::bail!("reminder receiver disconnected")
            }
        }
    }
}
