//! The in-memory outgoing batch document (spec §3 "Batch document",
//! "current-outgoing-batch-document").
//!
//! Rather than mutating a live XML tree (as the original's libxml2-backed
//! document does), this builds a small typed accumulator and defers
//! serialization to [`OutgoingBatch::to_xml`], called once at flush time.
//! Connection contexts hold this type as their `B` parameter
//! (`TnccConnection<OutgoingBatch>` / `TncsConnection<OutgoingBatch>`).

use tnc_types::MessageType;

use crate::control::ControlMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Tncc,
    Tncs,
}

impl Recipient {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tncc => "TNCC",
            Self::Tncs => "TNCS",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TNCC" => Some(Self::Tncc),
            "TNCS" => Some(Self::Tncs),
            _ => None,
        }
    }

    /// The side that should receive what `self` was sent from.
    pub fn peer(self) -> Self {
        match self {
            Self::Tncc => Self::Tncs,
            Self::Tncs => Self::Tncc,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Envelope {
    ImcImv { msg_type: MessageType, payload: Vec<u8> },
    Control(ControlMessage),
}

#[derive(Debug, Clone)]
pub struct OutgoingBatch {
    pub batch_id: u64,
    pub recipient: Recipient,
    pub envelopes: Vec<Envelope>,
}

impl OutgoingBatch {
    pub fn new(batch_id: u64, recipient: Recipient) -> Self {
        Self {
            batch_id,
            recipient,
            envelopes: Vec::new(),
        }
    }

    pub fn push_message(&mut self, msg_type: MessageType, payload: Vec<u8>) {
        self.envelopes.push(Envelope::ImcImv { msg_type, payload });
    }

    pub fn push_control(&mut self, message: ControlMessage) {
        self.envelopes.push(Envelope::Control(message));
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }
}
