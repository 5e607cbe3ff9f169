//! TNCC-side connection context (spec §3 "Connection (TNCC side)").

use tnc_types::ConnectionState;

/// One TNCC-side connection. Generic over the batch-document representation
/// `B` so this crate never has to depend on `tnc-batch` — the runtime crate
/// picks the concrete document type when it instantiates the registry.
pub struct TnccConnection<B> {
    /// Opaque caller data threaded through the handshake, untouched by this
    /// crate.
    pub app_data: Option<Vec<u8>>,
    /// The batch currently being assembled for this connection, if any.
    pub current_batch: Option<B>,
    pub state: ConnectionState,
}

impl<B> TnccConnection<B> {
    pub fn new() -> Self {
        Self {
            app_data: None,
            current_batch: None,
            state: ConnectionState::Create,
        }
    }
}

impl<B> Default for TnccConnection<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_create_state_with_no_batch() {
        let conn: TnccConnection<()> = TnccConnection::new();
        assert_eq!(conn.state, ConnectionState::Create);
        assert!(conn.current_batch.is_none());
    }
}
