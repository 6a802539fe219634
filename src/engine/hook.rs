//! Listener that hands each delivery to an external command.
//!
//! The payload goes to the command's stdin; the channel, message id and
//! event name are exported as `REDQ_CHANNEL`, `REDQ_MESSAGE_ID` and
//! `REDQ_EVENT`. Exit status 0 acknowledges the message.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::dispatch::Listener;
use crate::error::Result;
use crate::event::{BrokerEvent, DeliveryEvent};

#[derive(Debug, Clone)]
pub struct CommandListener {
    program: PathBuf,
    args: Vec<String>,
    kind: BrokerEvent,
}

impl CommandListener {
    pub fn new(kind: BrokerEvent, program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            kind,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Relative paths such as `./hooks/run` resolve against the process CWD;
    /// bare names are looked up on `PATH`.
    fn resolved_program(&self) -> Result<PathBuf> {
        if self.program.is_relative() && self.program.components().count() > 1 {
            Ok(std::env::current_dir()?.join(&self.program))
        } else {
            Ok(self.program.clone())
        }
    }
}

#[async_trait]
impl Listener for CommandListener {
    async fn handle(&self, event: &mut DeliveryEvent) -> Result<()> {
        let program = self.resolved_program()?;
        let start = Instant::now();

        debug!(
            command = %program.display(),
            event = %self.kind,
            channel = event.channel(),
            "running hook"
        );

        let mut child = Command::new(&program)
            .args(&self.args)
            .env("REDQ_CHANNEL", event.channel())
            .env("REDQ_MESSAGE_ID", event.message_id())
            .env("REDQ_EVENT", self.kind.name())
            .stdin(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A hook that never reads its input is fine.
            if let Err(e) = stdin.write_all(event.data().as_bytes()).await {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let status = child.wait().await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        if status.success() {
            info!(
                command = %program.display(),
                message_id = event.message_id(),
                duration_ms,
                "hook completed"
            );
            event.acknowledge();
        } else {
            warn!(
                command = %program.display(),
                message_id = event.message_id(),
                code = status.code().unwrap_or(-1),
                duration_ms,
                "hook exited with failure"
            );
        }
        Ok(())
    }
}
