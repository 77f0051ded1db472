//! Binary entrypoint: read JSON-line commands from stdin, write JSON lines to stdout.
//!
//! Each input line is one command tagged by `op`:
//! - `responder`: register or replace a responder record
//! - `report`: record a new incident and route it (outputs a DispatchResult)
//! - `status`: downstream status update (outputs the updated Incident)
//! - `redispatch`: route every queued incident again (one DispatchResult per line)
//!
//! Rejected lines produce an ErrorOutput. Logs and notification events go to stderr.

use std::io::{self, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dispatch_engine::memory::{ChannelNotifier, InMemoryIncidentStore, InMemoryResponderDirectory};
use dispatch_engine::normalize;
use dispatch_engine::types::{ErrorOutput, IncidentStatus};
use dispatch_engine::{Config, DispatchError, Dispatcher, InboundIncident, InboundResponder};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command {
  Responder(InboundResponder),
  Report(InboundIncident),
  Status { incident_id: String, status: String },
  Redispatch,
}

struct App {
  dispatcher: Dispatcher,
  directory: Arc<InMemoryResponderDirectory>,
  incidents: Arc<InMemoryIncidentStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dispatch_engine=info")),
    )
    .with_writer(io::stderr)
    .init();

  let config = Config::from_env()?;
  let directory = Arc::new(InMemoryResponderDirectory::new());
  let incidents = Arc::new(InMemoryIncidentStore::new());
  let (notifier, mut events) = ChannelNotifier::channel();

  // Delivery is out of scope here; surface events in the log stream.
  let consumer = tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      match serde_json::to_string(&event) {
        Ok(json) => info!(target: "dispatch_engine::events", event = %json, "notification"),
        Err(e) => info!(target: "dispatch_engine::events", error = %e, "unserializable event"),
      }
    }
  });

  let app = App {
    dispatcher: Dispatcher::new(config, directory.clone(), incidents.clone(), Arc::new(notifier))?,
    directory,
    incidents,
  };

  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());
  let mut lines = BufReader::new(tokio::io::stdin()).lines();

  while let Some(line) = lines.next_line().await? {
    // Skip blank lines.
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let command: Command = match serde_json::from_str(trimmed) {
      Ok(c) => c,
      Err(e) => {
        write_line(&mut out, &ErrorOutput::new(format!("json parse: {}", e)))?;
        continue;
      }
    };

    let err = match app.handle(command, &mut out).await {
      Ok(()) => None,
      // stdout is gone; nothing left to report to.
      Err(DispatchError::Io(e)) => return Err(e.into()),
      Err(DispatchError::Validation { field, reason }) => {
        Some(ErrorOutput::new(reason).with_field(field))
      }
      Err(e) => Some(ErrorOutput::new(e.to_string())),
    };
    if let Some(err) = err {
      write_line(&mut out, &err)?;
    }
    out.flush()?;
  }

  out.flush()?;
  drop(app);
  let _ = consumer.await;
  Ok(())
}

impl App {
  async fn handle(&self, command: Command, out: &mut impl Write) -> Result<(), DispatchError> {
    match command {
      Command::Responder(raw) => {
        let responder = normalize::normalize_responder(&raw, self.dispatcher.config())?;
        info!(responder_id = %responder.id, "responder registered");
        self.directory.upsert(responder)?;
      }
      Command::Report(raw) => {
        let incident = normalize::normalize_incident(&raw)?;
        self.incidents.insert(incident.clone())?;
        let result = self.dispatcher.route(&incident).await?;
        write_line(out, &result)?;
      }
      Command::Status {
        incident_id,
        status,
      } => {
        let status = IncidentStatus::from_str_loose(&status).ok_or_else(|| {
          DispatchError::validation("status", "expected in_progress|resolved|cancelled")
        })?;
        let incident = self.dispatcher.update_status(&incident_id, status).await?;
        write_line(out, &incident)?;
      }
      Command::Redispatch => {
        for result in self.dispatcher.redispatch_queued().await? {
          write_line(out, &result)?;
        }
      }
    }
    Ok(())
  }
}

fn write_line<T: Serialize>(out: &mut impl Write, value: &T) -> Result<(), DispatchError> {
  serde_json::to_writer(&mut *out, value)?;
  writeln!(out)?;
  Ok(())
}
