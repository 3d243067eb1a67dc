use crate::db::MessageLedger;
use crate::error::Result;
use crate::utils::{content_hash, is_same_calendar_day};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One message as handed over by the upstream parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub chat: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// The ledger key: the upstream id, or a fingerprint of chat and text
    /// when the source assigns none.
    pub fn ledger_id(&self) -> String {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => content_hash(format!("{}\n{}", self.chat, self.text)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Saved { id: String },
    AlreadyProcessed { id: String },
    NotToday { id: String },
}

impl IngestOutcome {
    pub fn id(&self) -> &str {
        match self {
            Self::Saved { id } | Self::AlreadyProcessed { id } | Self::NotToday { id } => id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Records inbound messages exactly once.
#[derive(Clone)]
pub struct Ingestor {
    ledger: MessageLedger,
    today_only: bool,
}

impl Ingestor {
    pub fn new(ledger: MessageLedger, today_only: bool) -> Self {
        Self { ledger, today_only }
    }

    pub fn ledger(&self) -> &MessageLedger {
        &self.ledger
    }

    pub async fn ingest(&self, msg: &InboundMessage) -> Result<IngestOutcome> {
        let id = msg.ledger_id();

        if self.today_only && !is_same_calendar_day(&msg.timestamp) {
            debug!(id = %id, timestamp = %msg.timestamp, "skipping message from another day");
            return Ok(IngestOutcome::NotToday { id });
        }

        // Cheap pre-check; the insert below is what actually decides.
        if self.ledger.is_processed(&id).await? {
            debug!(id = %id, "message already processed");
            return Ok(IngestOutcome::AlreadyProcessed { id });
        }

        match self
            .ledger
            .save(&id, &msg.chat, &msg.text, msg.timestamp)
            .await
        {
            Ok(()) => {
                info!(id = %id, chat = %msg.chat, "message saved");
                Ok(IngestOutcome::Saved { id })
            }
            Err(e) if e.is_duplicate() => {
                debug!(id = %id, "message recorded concurrently");
                Ok(IngestOutcome::AlreadyProcessed { id })
            }
            Err(e) => Err(e),
        }
    }
}
