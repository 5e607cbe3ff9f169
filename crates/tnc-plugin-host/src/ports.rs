//! Outbound ports the plugin host calls into, and the runtime crate
//! (`tncc`/`tncs`) adapts — the same driven-port shape the teacher uses in
//! `qc-07-bloom-filters/src/ports/outbound.rs` to keep a core crate ignorant
//! of the adapters that eventually back it.
//!
//! Plugin-host depends on these traits, never on `tnc-batch` or
//! `tnc-aggregator` directly: those crates would otherwise need to depend
//! back on plugin-host to drive `notify_all`/`begin_handshake_all`, which
//! would make the workspace graph circular.

use tnc_types::{AttributeId, MessageType, Recommendation, TncResult};

/// Driven port for the IMC side: the only thing an IMC can ask the host to
/// do on its behalf is hand a message to the outgoing batch.
pub trait ImcPort: Send + Sync {
    fn send_message(&self, conn_id: u32, msg_type: MessageType, payload: &[u8]) -> TncResult<()>;
}

/// Driven port for the IMV side: message sending plus the two TNCS-specific
/// capabilities, recommendation and the attribute store.
pub trait ImvPort: Send + Sync {
    fn send_message(&self, conn_id: u32, msg_type: MessageType, payload: &[u8]) -> TncResult<()>;

    fn provide_recommendation(
        &self,
        imv_id: u32,
        conn_id: u32,
        recommendation: Recommendation,
        evaluation: i32,
    ) -> TncResult<()>;

    fn get_attribute(&self, conn_id: u32, attribute: AttributeId) -> TncResult<Vec<u8>>;

    fn set_attribute(&self, conn_id: u32, attribute: AttributeId, value: &[u8]) -> TncResult<()>;
}
