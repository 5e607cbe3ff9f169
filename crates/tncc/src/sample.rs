//! An in-process stand-in for a dlopen'd sample IMC (spec §10), grounded on
//! `examples/original_source/src/src/sample/sample_imc.c`. Nothing here is
//! compiled to a shared object — it reports one canned posture value and
//! answers every OSC status request with it, which is enough to drive the
//! missing-data handshake loop end to end without a real posture probe
//! (those stay out of scope).

use tnc_plugin_host::ImcPort;
use tnc_policy::OSC_VENDOR_ID;
use tnc_types::MessageType;

/// The value this sample always reports, regardless of which OSC subsystem
/// asked (`sample_imc.c` hard-codes a single status string the same way).
const CANNED_STATUS: &str = "1";

pub struct SampleImc;

impl SampleImc {
    pub fn new() -> Self {
        Self
    }

    /// True for any OSC-vendor message, matching the vendor id this sample
    /// claims (spec §4.6, `sample_imv.c`'s explicit warning against reusing
    /// 9048 for anything but this sample pairing).
    pub fn accepts(&self, msg_type: MessageType) -> bool {
        msg_type.vendor == OSC_VENDOR_ID
    }

    /// Report the canned status proactively at handshake start, the same
    /// way `sample_imc.c`'s `BeginHandshake` sends its first status message
    /// without waiting to be asked.
    pub fn begin_handshake(&self, conn_id: u32, port: &dyn ImcPort) {
        let msg_type = MessageType::new(OSC_VENDOR_ID, 1);
        let _ = port.send_message(conn_id, msg_type, CANNED_STATUS.as_bytes());
    }

    /// Answer any OSC `*_REQUEST` with the same canned value, echoing the
    /// subtype back so the IMV side can tell which system asked.
    pub fn receive_message(&self, conn_id: u32, msg_type: MessageType, _payload: &[u8], port: &dyn ImcPort) {
        if !self.accepts(msg_type) {
            return;
        }
        let _ = port.send_message(conn_id, msg_type, CANNED_STATUS.as_bytes());
    }

    pub fn batch_ending(&self, _conn_id: u32, _port: &dyn ImcPort) {}
}

impl Default for SampleImc {
    fn default() -> Self {
        Self::new()
    }
}
