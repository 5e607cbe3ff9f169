//! Batch-level rejection scenarios (spec.md §8 S4, S5): a malformed
//! `Recipient` attribute is `Fatal` with no outgoing batch, and a
//! fully-wildcard incoming message type is refused before any plugin runs.

#[cfg(test)]
mod tests {
    use tnc_batch::{OutgoingBatch, Recipient};
    use tnc_router::resolve_targets;
    use tnc_types::{RecommendationPolicy, TncError, MessageType, SUBTYPE_ANY, VENDOR_ANY};
    use tncs::TncServer;

    /// S4: `Recipient="BOGUS"` is not a value `Recipient::from_str` accepts,
    /// so parsing (and therefore `receive_batch`) fails fatally and no
    /// outgoing batch is produced.
    #[test]
    fn a_batch_with_an_invalid_recipient_is_rejected() {
        let server = TncServer::new(RecommendationPolicy::All);
        let conn_id = server.accept_connection();

        let xml = format!(
            "<TNCCS-Batch BatchId=\"1\" Recipient=\"BOGUS\" xmlns=\"{}\"></TNCCS-Batch>",
            tnc_batch::NS_TNCCS
        );

        let err = server.receive_batch(conn_id, xml.as_bytes()).unwrap_err();
        assert!(matches!(err, TncError::Fatal(_)));
    }

    /// S5: the router itself refuses to resolve targets for a fully
    /// wildcard incoming type — this is what keeps a malicious or malformed
    /// `(VENDOR_ANY, SUBTYPE_ANY)` message from ever reaching a plugin.
    #[test]
    fn a_fully_wildcard_incoming_message_is_never_routed() {
        let subscribed = [MessageType::new(VENDOR_ANY, SUBTYPE_ANY)];
        let err = resolve_targets([(0u32, subscribed.as_slice())], MessageType::new(VENDOR_ANY, SUBTYPE_ANY))
            .unwrap_err();
        assert!(matches!(err, TncError::InvalidParameter(_)));
    }

    /// The same refusal holds for a batch built and serialized through the
    /// normal `OutgoingBatch` path, confirming the wire round trip carries
    /// the wildcard type through unchanged rather than coercing it.
    #[test]
    fn a_serialized_wildcard_message_type_round_trips_and_is_still_rejected() {
        let mut batch = OutgoingBatch::new(1, Recipient::Tncc);
        batch.push_message(MessageType::new(VENDOR_ANY, SUBTYPE_ANY), b"x".to_vec());
        let xml = tnc_batch::serialize(&batch);

        let parsed = tnc_batch::parse(xml.as_bytes(), Recipient::Tncc).unwrap();
        let msg_type = match &parsed.messages[0] {
            tnc_batch::ParsedMessage::ImcImv { msg_type, .. } => *msg_type,
            other => panic!("expected an IMC-IMV-Message, got {other:?}"),
        };
        assert!(msg_type.is_fully_wildcard());

        let err = resolve_targets(std::iter::empty::<(u32, &[MessageType])>(), msg_type).unwrap_err();
        assert!(matches!(err, TncError::InvalidParameter(_)));
    }
}
