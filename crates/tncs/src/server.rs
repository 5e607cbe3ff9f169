//! TNCS-side runtime wiring (spec §4.4 `receive_batch`, §4.5 aggregation).

use std::sync::Arc;

use parking_lot::Mutex;
use tnc_batch::{AttributeStore, ControlBody, ControlMessage, OutgoingBatch, ParsedMessage, Recipient};
use tnc_connections::{ConnectionRegistry, TncsConnection};
use tnc_plugin_host::{connection_state_to_u32, ImvHost, ImvPort};
use tnc_router::resolve_targets;
use tnc_types::{AttributeId, ConnectionState, MessageType, Recommendation, RecommendationPolicy, TncError, TncResult};

use crate::sample::SampleImv;

/// TNCS-side runtime: owns the connection registry and the process-global
/// attribute store, installs itself as the IMV host's outbound port, and
/// drives the aggregator (spec §2 C4-C8).
pub struct TncServer {
    connections: Arc<ConnectionRegistry<TncsConnection<OutgoingBatch>>>,
    attributes: Arc<AttributeStore>,
    port: Arc<PortAdapter>,
    policy: RecommendationPolicy,
    sample: Option<Arc<SampleImv>>,
}

impl TncServer {
    pub fn new(policy: RecommendationPolicy) -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let attributes = Arc::new(AttributeStore::new());
        let port = Arc::new(PortAdapter { connections: connections.clone(), attributes: attributes.clone() });
        ImvHost::set_port(port.clone() as Arc<dyn ImvPort>);
        Self { connections, attributes, port, policy, sample: None }
    }

    /// Parse and install the in-process sample IMV (spec §10): not a
    /// dlopen'd plugin, so it is assigned the next contiguous id after
    /// whatever real plugins are already loaded rather than going through
    /// `tnc-plugin-host`'s slot table.
    pub fn install_sample_imv(&mut self, policy_source: &str) -> TncResult<()> {
        let tree = tnc_policy::parse(policy_source)
            .map_err(|e| TncError::Fatal(format!("policy parse error: {e}")))?;
        let imv_id = ImvHost::subscriptions_snapshot().len() as u32;
        self.sample = Some(Arc::new(SampleImv::new(imv_id, tree)));
        Ok(())
    }

    pub fn load_plugin(&self, path: &str) -> TncResult<u32> {
        ImvHost::load(path)
    }

    pub fn load_config(&self, path: &std::path::Path) -> i32 {
        ImvHost::load_config(path)
    }

    pub fn load_std_config(&self) -> i32 {
        ImvHost::load_std_config()
    }

    /// Create a connection row for a freshly-accepted session and notify
    /// `CREATE` then `HANDSHAKE`, symmetric with `TncClient::begin_session`.
    /// Spec §9 open question 2: the server produces no outgoing batch of
    /// its own here — its first reply is only ever built in response to the
    /// client's first batch, inside `receive_batch`.
    pub fn accept_connection(&self) -> u32 {
        let num_imvs = ImvHost::subscriptions_snapshot().len() + self.sample.is_some() as usize;
        let (id, handle) = self.connections.create(TncsConnection::new(self.policy));
        let conn_id = id as u32;
        handle.lock().ensure_imv_capacity(num_imvs);

        ImvHost::notify_all(conn_id, connection_state_to_u32(ConnectionState::Create));
        handle.lock().state = ConnectionState::Handshake;
        ImvHost::notify_all(conn_id, connection_state_to_u32(ConnectionState::Handshake));
        conn_id
    }

    /// Spec §4.4 `receive_batch` (TNCS side) plus the end-of-batch
    /// recommendation/solicitation handling.
    pub fn receive_batch(&self, conn_id: u32, bytes: &[u8]) -> TncResult<Option<String>> {
        let handle = self
            .connections
            .get(conn_id as usize)
            .ok_or_else(|| TncError::InvalidParameter(format!("unknown connection {conn_id}")))?;

        let parsed = tnc_batch::parse(bytes, Recipient::Tncs)?;
        let reply_batch_id = parsed.batch_id + 1;
        {
            let mut conn = handle.lock();
            conn.current_batch = Some(OutgoingBatch::new(reply_batch_id, Recipient::Tncc));
            conn.imv_imc_count = 0;
        }

        let subs = ImvHost::subscriptions_snapshot();
        let mut imc_imv_count = 0u32;

        for msg in parsed.messages {
            match msg {
                ParsedMessage::ImcImv { msg_type, payload } => {
                    imc_imv_count += 1;
                    let targets = resolve_targets(subs.iter().map(|(id, types)| (*id, types.as_slice())), msg_type)?;
                    for id in targets {
                        ImvHost::deliver_message(id, conn_id, msg_type, &payload);
                    }
                    if let Some(sample) = &self.sample {
                        if sample.accepts(msg_type) {
                            sample.receive_message(conn_id, msg_type, &payload);
                        }
                    }
                }
                ParsedMessage::Control { body, .. } => match body {
                    ControlBody::Error { kind, message } => {
                        tracing::warn!(kind = %kind, message = %message, "TNCC reported an error");
                    }
                    ControlBody::PreferredLanguage(text) => {
                        self.attributes.set(AttributeId::PreferredLanguage, text.into_bytes());
                    }
                    ControlBody::Recommendation(_)
                    | ControlBody::ReasonStrings(_)
                    | ControlBody::TncsContactInfo { .. }
                    | ControlBody::VendorXml(_)
                    | ControlBody::VendorBinary(_)
                    | ControlBody::Unrecognized => {}
                },
            }
        }

        ImvHost::batch_ending_all(conn_id);
        if let Some(sample) = &self.sample {
            sample.batch_ending(conn_id, self.port.as_ref());
        }

        if let Some(xml) = self.finalize_if_ready(&handle)? {
            return Ok(Some(xml));
        }

        let imv_imc_count = handle.lock().imv_imc_count;
        if imc_imv_count == 0 || imv_imc_count == 0 {
            ImvHost::solicit_recommendation_all(conn_id);
            if let Some(sample) = &self.sample {
                sample.solicit_recommendation(conn_id, self.port.as_ref());
            }
            if let Some(xml) = self.finalize_if_ready(&handle)? {
                return Ok(Some(xml));
            }
        }

        let batch = handle.lock().current_batch.take().expect("seeded at the top of this call");
        Ok(Some(tnc_batch::serialize(&batch)))
    }

    /// If a final recommendation is ready, append it to the outgoing batch
    /// and flush; otherwise leave the batch being built untouched.
    fn finalize_if_ready(&self, handle: &Arc<Mutex<TncsConnection<OutgoingBatch>>>) -> TncResult<Option<String>> {
        let final_rec = {
            let conn = handle.lock();
            if conn.have_recommendation {
                conn.final_recommendation
            } else {
                None
            }
        };
        let Some(final_rec) = final_rec else { return Ok(None) };

        let mut conn = handle.lock();
        let batch = conn.current_batch.as_mut().expect("seeded at the top of this call");
        batch.push_control(ControlMessage::Recommendation(final_rec));
        let batch = conn.current_batch.take().expect("just pushed into it");
        Ok(Some(tnc_batch::serialize(&batch)))
    }
}

struct PortAdapter {
    connections: Arc<ConnectionRegistry<TncsConnection<OutgoingBatch>>>,
    attributes: Arc<AttributeStore>,
}

impl ImvPort for PortAdapter {
    fn send_message(&self, conn_id: u32, msg_type: MessageType, payload: &[u8]) -> TncResult<()> {
        let handle = self
            .connections
            .get(conn_id as usize)
            .ok_or_else(|| TncError::InvalidParameter(format!("unknown connection {conn_id}")))?;
        let mut conn = handle.lock();
        let batch = conn
            .current_batch
            .get_or_insert_with(|| OutgoingBatch::new(0, Recipient::Tncc));
        batch.push_message(msg_type, payload.to_vec());
        conn.imv_imc_count += 1;
        Ok(())
    }

    fn provide_recommendation(&self, imv_id: u32, conn_id: u32, recommendation: Recommendation, evaluation: i32) -> TncResult<()> {
        let handle = self
            .connections
            .get(conn_id as usize)
            .ok_or_else(|| TncError::InvalidParameter(format!("unknown connection {conn_id}")))?;
        if tnc_aggregator::provide_recommendation(&handle, imv_id, recommendation).is_some() {
            handle.lock().evaluation = evaluation;
        }
        Ok(())
    }

    fn get_attribute(&self, _conn_id: u32, attribute: AttributeId) -> TncResult<Vec<u8>> {
        self.attributes
            .get(attribute)
            .ok_or_else(|| TncError::InvalidParameter("attribute not set".into()))
    }

    fn set_attribute(&self, _conn_id: u32, attribute: AttributeId, value: &[u8]) -> TncResult<()> {
        self.attributes.set(attribute, value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_connection_starts_in_handshake() {
        let server = TncServer::new(RecommendationPolicy::All);
        let conn_id = server.accept_connection();
        let handle = server.connections.get(conn_id as usize).unwrap();
        assert_eq!(handle.lock().state, ConnectionState::Handshake);
    }

    #[test]
    fn receive_batch_on_an_unknown_connection_is_invalid_parameter() {
        let server = TncServer::new(RecommendationPolicy::All);
        let err = server.receive_batch(999, b"<x/>").unwrap_err();
        assert!(matches!(err, TncError::InvalidParameter(_)));
    }
}
