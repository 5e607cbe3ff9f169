//! TNCC-side runtime wiring (spec §4.4 `begin_session`/`receive_batch`).

use std::sync::Arc;

use tnc_batch::{ControlBody, OutgoingBatch, ParsedMessage, Recipient};
use tnc_connections::{ConnectionRegistry, TnccConnection};
use tnc_plugin_host::{connection_state_to_u32, ImcHost, ImcPort};
use tnc_router::resolve_targets;
use tnc_types::{ConnectionState, MessageType, TncError, TncResult};

use crate::sample::SampleImc;

/// TNCC-side runtime: owns the connection registry, installs itself as the
/// IMC host's outbound port, and drives the batch engine (spec §2 C4-C7).
pub struct TncClient {
    connections: Arc<ConnectionRegistry<TnccConnection<OutgoingBatch>>>,
    port: Arc<PortAdapter>,
    sample: Option<Arc<SampleImc>>,
}

impl TncClient {
    pub fn new() -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let port = Arc::new(PortAdapter { connections: connections.clone() });
        ImcHost::set_port(port.clone() as Arc<dyn ImcPort>);
        Self { connections, port, sample: None }
    }

    /// Install the in-process sample IMC (spec §10) — not a dlopen'd plugin,
    /// so it bypasses `tnc-plugin-host` and participates directly through
    /// the same `ImcPort` every real plugin is routed through.
    pub fn install_sample_imc(&mut self) {
        self.sample = Some(Arc::new(SampleImc::new()));
    }

    pub fn load_plugin(&self, path: &str) -> TncResult<u32> {
        ImcHost::load(path)
    }

    pub fn load_config(&self, path: &std::path::Path) -> i32 {
        ImcHost::load_config(path)
    }

    pub fn load_std_config(&self) -> i32 {
        ImcHost::load_std_config()
    }

    /// Spec §4.4 `begin_session`: seed `BatchId=1, Recipient=TNCS`, notify
    /// `CREATE` then `HANDSHAKE`, run `begin_handshake` on every IMC, and
    /// return the connection id plus the serialized outgoing batch.
    pub fn begin_session(&self) -> (u32, String) {
        let (id, handle) = self.connections.create(TnccConnection::new());
        let conn_id = id as u32;

        {
            let mut conn = handle.lock();
            conn.current_batch = Some(OutgoingBatch::new(1, Recipient::Tncs));
        }

        ImcHost::notify_all(conn_id, connection_state_to_u32(ConnectionState::Create));
        handle.lock().state = ConnectionState::Handshake;
        ImcHost::notify_all(conn_id, connection_state_to_u32(ConnectionState::Handshake));

        ImcHost::begin_handshake_all(conn_id);
        if let Some(sample) = &self.sample {
            sample.begin_handshake(conn_id, self.port.as_ref());
        }

        let batch = handle.lock().current_batch.take().expect("begin_session always seeds a batch");
        (conn_id, tnc_batch::serialize(&batch))
    }

    /// Spec §4.4 `receive_batch` (TNCC side). Returns `Ok(None)` when a
    /// final recommendation arrived this turn: the partially-built reply is
    /// discarded and nothing is flushed (spec: "discard any partially built
    /// reply batch and do not flush").
    pub fn receive_batch(&self, conn_id: u32, bytes: &[u8]) -> TncResult<Option<String>> {
        let handle = self
            .connections
            .get(conn_id as usize)
            .ok_or_else(|| TncError::InvalidParameter(format!("unknown connection {conn_id}")))?;

        let parsed = tnc_batch::parse(bytes, Recipient::Tncc)?;
        let reply_batch_id = parsed.batch_id + 1;
        handle.lock().current_batch = Some(OutgoingBatch::new(reply_batch_id, Recipient::Tncs));

        let subs = ImcHost::subscriptions_snapshot();

        for msg in parsed.messages {
            match msg {
                ParsedMessage::ImcImv { msg_type, payload } => {
                    let targets = resolve_targets(subs.iter().map(|(id, types)| (*id, types.as_slice())), msg_type)?;
                    for id in targets {
                        ImcHost::deliver_message(id, conn_id, msg_type, &payload);
                    }
                    if let Some(sample) = &self.sample {
                        if sample.accepts(msg_type) {
                            sample.receive_message(conn_id, msg_type, &payload, self.port.as_ref());
                        }
                    }
                }
                ParsedMessage::Control { body, .. } => match body {
                    ControlBody::Recommendation(rec) => {
                        let state = ConnectionState::from_recommendation(rec);
                        ImcHost::notify_all(conn_id, connection_state_to_u32(state));
                        ImcHost::notify_all(conn_id, connection_state_to_u32(ConnectionState::Delete));
                        handle.lock().current_batch = None;
                        return Ok(None);
                    }
                    ControlBody::Error { kind, message } => {
                        tracing::warn!(kind = %kind, message = %message, "TNCS reported an error");
                    }
                    ControlBody::ReasonStrings(pairs) => {
                        for (language, text) in pairs {
                            tracing::info!(language = %language, "{text}");
                        }
                    }
                    ControlBody::TncsContactInfo { address, port } => {
                        tracing::info!(address = %address, port = %port, "TNCS contact info");
                    }
                    ControlBody::PreferredLanguage(_) | ControlBody::VendorXml(_) | ControlBody::VendorBinary(_)
                    | ControlBody::Unrecognized => {}
                },
            }
        }

        ImcHost::batch_ending_all(conn_id);
        if let Some(sample) = &self.sample {
            sample.batch_ending(conn_id, self.port.as_ref());
        }

        let batch = handle.lock().current_batch.take().expect("seeded at the top of this call");
        Ok(Some(tnc_batch::serialize(&batch)))
    }
}

impl Default for TncClient {
    fn default() -> Self {
        Self::new()
    }
}

struct PortAdapter {
    connections: Arc<ConnectionRegistry<TnccConnection<OutgoingBatch>>>,
}

impl ImcPort for PortAdapter {
    fn send_message(&self, conn_id: u32, msg_type: MessageType, payload: &[u8]) -> TncResult<()> {
        let handle = self
            .connections
            .get(conn_id as usize)
            .ok_or_else(|| TncError::InvalidParameter(format!("unknown connection {conn_id}")))?;
        let mut conn = handle.lock();
        let batch = conn
            .current_batch
            .get_or_insert_with(|| OutgoingBatch::new(0, Recipient::Tncs));
        batch.push_message(msg_type, payload.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_session_yields_batch_id_one_to_tncs() {
        let client = TncClient::new();
        let (_id, xml) = client.begin_session();
        assert!(xml.contains(r#"BatchId="1""#));
        assert!(xml.contains(r#"Recipient="TNCS""#));
    }

    #[test]
    fn receive_batch_on_an_unknown_connection_is_invalid_parameter() {
        let client = TncClient::new();
        let err = client.receive_batch(999, b"<x/>").unwrap_err();
        assert!(matches!(err, TncError::InvalidParameter(_)));
    }
}
