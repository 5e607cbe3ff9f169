//! End-to-end TNCC/TNCS handshake scenarios (spec.md §8 S1, S3, S6), driven
//! entirely through the public `tncc`/`tncs` runtime API with the
//! in-process sample IMC/IMV standing in for dlopen'd plugins.

#[cfg(test)]
mod tests {
    use tnc_types::RecommendationPolicy;
    use tncc::TncClient;
    use tncs::TncServer;

    /// S1/S3 combined: the sample IMV's policy needs a posture item the
    /// sample IMC hasn't reported yet, so the first round trip is a data
    /// request; the second round trip, with the canned status echoed back,
    /// satisfies the predicate and reaches a final `allow` recommendation.
    #[test]
    fn sample_imc_and_imv_converge_on_allow() {
        let mut client = TncClient::new();
        client.install_sample_imc();

        let mut server = TncServer::new(RecommendationPolicy::All);
        server
            .install_sample_imv(r#"if File.x.status eq "1" { recommend allow }"#)
            .unwrap();

        let (client_conn, first_batch) = client.begin_session();
        let server_conn = server.accept_connection();

        // Round 1: TNCS asks the IMC side for File status; no recommendation yet.
        let reply = server
            .receive_batch(server_conn, first_batch.as_bytes())
            .unwrap()
            .expect("no recommendation yet, a data request is pending");
        assert!(reply.contains("IMC-IMV-Message"));
        assert!(!reply.contains("TNCCS-Recommendation"));

        // Round 2: the client answers with the canned status, predicate fires.
        let reply = client.receive_batch(client_conn, reply.as_bytes()).unwrap().expect(
            "the client's own reply to a data request is never a final recommendation",
        );
        let final_reply = server
            .receive_batch(server_conn, reply.as_bytes())
            .unwrap()
            .expect("predicate should now be satisfied");
        assert!(final_reply.contains(r#"TNCCS-Recommendation type="allow""#));

        // The client's own processing of the final batch ends the session
        // (spec §4.4: discard the partial reply, no further batch is sent).
        let outcome = client.receive_batch(client_conn, final_reply.as_bytes()).unwrap();
        assert!(outcome.is_none());
    }

    /// S6: a failed plugin load must not corrupt global host state, and a
    /// session must still proceed normally afterward.
    #[test]
    fn a_failed_plugin_load_does_not_block_the_session() {
        let client = TncClient::new();
        assert!(client.load_plugin("/no/such/imc.so").is_err());

        // The session proceeds even though no real IMC ever loaded.
        let (_conn_id, batch) = client.begin_session();
        assert!(batch.contains(r#"BatchId="1""#));
    }
}
