//! An in-process stand-in for a dlopen'd sample IMV (spec §10), grounded on
//! `examples/original_source/src/src/sample/sample_imv.c`. It loads a
//! `tnc-policy` tree and evaluates it against a per-connection posture
//! cache, requesting missing data from the IMC side through the same
//! `ImvPort` every real plugin is routed through.

use std::collections::HashMap;

use parking_lot::Mutex;
use tnc_plugin_host::ImvPort;
use tnc_policy::{
    system_message_type, PolicyNode, PolicySink, PostureCache, OSC_VENDOR_ID, SUBTYPE_EXTCOMMAND_REQUEST,
    SUBTYPE_FILE_STATUS_REQUEST, SUBTYPE_PACKAGE_STATUS_REQUEST, SUBTYPE_REGISTRY_REQUEST,
};
use tnc_types::{MessageType, Recommendation, Severity};

pub struct SampleImv {
    imv_id: u32,
    policy: PolicyNode,
    caches: Mutex<HashMap<u32, PostureCache>>,
    /// Which `(subsystem, arg)` a pending request was for, keyed by
    /// connection then system name, so an answering `receive_message` can
    /// write the reply under the same posture-cache key the predicate reads
    /// (the wire only carries the system's message type and a value, spec
    /// §4.6).
    pending: Mutex<HashMap<u32, HashMap<String, (String, String)>>>,
}

impl SampleImv {
    pub fn new(imv_id: u32, policy: PolicyNode) -> Self {
        Self {
            imv_id,
            policy,
            caches: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn accepts(&self, msg_type: MessageType) -> bool {
        msg_type.vendor == OSC_VENDOR_ID
    }

    pub fn solicit_recommendation(&self, conn_id: u32, port: &dyn ImvPort) {
        self.evaluate(conn_id, port);
    }

    /// Record the collector's answer under the posture-cache key the
    /// matching pending request was issued for. The policy itself is only
    /// re-run once per batch, at `batch_ending`/`solicit_recommendation`
    /// (spec §4.6 invariant 9: at most one outstanding request per
    /// `(system, arg)` per batch — re-evaluating on every message would
    /// re-request anything still missing).
    pub fn receive_message(&self, conn_id: u32, msg_type: MessageType, payload: &[u8]) {
        let Some(system) = system_for_subtype(msg_type.subtype) else { return };
        let value = String::from_utf8_lossy(payload).into_owned();
        let target = self.pending.lock().get_mut(&conn_id).and_then(|m| m.remove(system));
        let (subsystem, arg) = target.unwrap_or_else(|| ("sample".to_string(), "status".to_string()));
        let mut caches = self.caches.lock();
        let cache = caches.entry(conn_id).or_default();
        cache.set(system, &subsystem, &arg, value);
    }

    pub fn batch_ending(&self, conn_id: u32, port: &dyn ImvPort) {
        self.evaluate(conn_id, port);
    }

    fn evaluate(&self, conn_id: u32, port: &dyn ImvPort) {
        let mut caches = self.caches.lock();
        let cache = caches.entry(conn_id).or_default();
        let mut sink = ImvSink { sample: self, conn_id, port, recommended: None };
        self.policy.evaluate(cache, &mut sink);
        drop(caches);
        if let Some(rec) = sink.recommended {
            let _ = port.provide_recommendation(self.imv_id, conn_id, rec, 0);
        }
    }
}

fn system_for_subtype(subtype: u8) -> Option<&'static str> {
    match subtype {
        SUBTYPE_PACKAGE_STATUS_REQUEST => Some("Package"),
        SUBTYPE_FILE_STATUS_REQUEST => Some("File"),
        SUBTYPE_REGISTRY_REQUEST => Some("Registry"),
        SUBTYPE_EXTCOMMAND_REQUEST => Some("Extcommand"),
        _ => None,
    }
}

struct ImvSink<'a> {
    sample: &'a SampleImv,
    conn_id: u32,
    port: &'a dyn ImvPort,
    recommended: Option<Recommendation>,
}

impl PolicySink for ImvSink<'_> {
    fn recommend(&mut self, rec: Recommendation) {
        self.recommended = Some(rec);
    }

    fn log(&mut self, severity: Severity, message: &str) {
        let imv = self.sample.imv_id;
        match severity {
            Severity::Err => tracing::error!(imv, conn = self.conn_id, "{message}"),
            Severity::Warning => tracing::warn!(imv, conn = self.conn_id, "{message}"),
            Severity::Notice | Severity::Info => tracing::info!(imv, conn = self.conn_id, "{message}"),
            Severity::Debug => tracing::debug!(imv, conn = self.conn_id, "{message}"),
        }
    }

    fn user_message(&mut self, message: &str) {
        tracing::info!(target: "tnc::usermessage", conn = self.conn_id, "{message}");
    }

    /// Ask the IMC side for the missing posture item (spec §4.6's
    /// system-to-message-type table); an unknown system is logged and
    /// otherwise ignored, since there is no collector that would answer it.
    fn request_data(&mut self, system: &str, subsystem: &str, arg: &str) {
        match system_message_type(system) {
            Some(msg_type) => {
                self.sample
                    .pending
                    .lock()
                    .entry(self.conn_id)
                    .or_default()
                    .insert(system.to_string(), (subsystem.to_string(), arg.to_string()));
                let _ = self.port.send_message(self.conn_id, msg_type, arg.as_bytes());
            }
            None => {
                tracing::debug!(system, subsystem, arg, "policy requested data from an unknown system");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingPort {
        sent: std::sync::Mutex<Vec<(u32, MessageType)>>,
        recommendations: std::sync::Mutex<Vec<(u32, u32, Recommendation)>>,
    }

    impl ImvPort for RecordingPort {
        fn send_message(&self, conn_id: u32, msg_type: MessageType, _payload: &[u8]) -> tnc_types::TncResult<()> {
            self.sent.lock().unwrap().push((conn_id, msg_type));
            Ok(())
        }
        fn provide_recommendation(
            &self,
            imv_id: u32,
            conn_id: u32,
            recommendation: Recommendation,
            _evaluation: i32,
        ) -> tnc_types::TncResult<()> {
            self.recommendations.lock().unwrap().push((imv_id, conn_id, recommendation));
            Ok(())
        }
        fn get_attribute(&self, _conn_id: u32, _attribute: tnc_types::AttributeId) -> tnc_types::TncResult<Vec<u8>> {
            Ok(Vec::new())
        }
        fn set_attribute(&self, _conn_id: u32, _attribute: tnc_types::AttributeId, _value: &[u8]) -> tnc_types::TncResult<()> {
            Ok(())
        }
    }

    fn port() -> RecordingPort {
        RecordingPort { sent: Default::default(), recommendations: Default::default() }
    }

    #[test]
    fn missing_data_is_requested_from_the_imc_side() {
        let tree = tnc_policy::parse(r#"if File.x.status eq "0" { recommend allow }"#).unwrap();
        let sample = SampleImv::new(0, tree);
        let port = port();
        sample.solicit_recommendation(1, &port);
        let sent = port.sent.into_inner().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, MessageType::new(OSC_VENDOR_ID, SUBTYPE_FILE_STATUS_REQUEST));
        assert!(port.recommendations.into_inner().unwrap().is_empty());
    }

    #[test]
    fn an_answered_request_lets_the_predicate_fire() {
        let tree = tnc_policy::parse(r#"if File.x.status eq "0" { recommend allow }"#).unwrap();
        let sample = SampleImv::new(0, tree);
        let port = port();
        sample.solicit_recommendation(1, &port);
        sample.receive_message(1, MessageType::new(OSC_VENDOR_ID, SUBTYPE_FILE_STATUS_REQUEST), b"0");
        sample.batch_ending(1, &port);
        let recs = port.recommendations.into_inner().unwrap();
        assert_eq!(recs, vec![(0, 1, Recommendation::Allow)]);
    }
}
