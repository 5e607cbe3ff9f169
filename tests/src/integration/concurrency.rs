//! Spec.md §5 "Concurrency & resource model": distinct connections may be
//! driven from separate threads concurrently, and the per-connection state
//! each handshake touches (the aggregator's vote vector, the sample IMV's
//! posture cache and pending-request map) never leaks across connection ids.

#[cfg(test)]
mod tests {
    use tncc::TncClient;
    use tncs::TncServer;
    use tnc_types::RecommendationPolicy;

    /// `N` independently-driven client/server pairs running on their own
    /// thread, each converging on `allow`. A shared global (the plugin
    /// host's slot table) staying empty throughout is exactly what spec §5
    /// promises when no real plugin is loaded: nothing but each pair's own
    /// sample IMC/IMV and its own connection id is touched.
    #[test]
    fn parallel_threads_drive_independent_connections_without_interference() {
        const WORKERS: usize = 8;

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..WORKERS)
                .map(|i| {
                    scope.spawn(move || {
                        let mut client = TncClient::new();
                        client.install_sample_imc();

                        let mut server = TncServer::new(RecommendationPolicy::All);
                        server
                            .install_sample_imv(r#"if File.x.status eq "1" { recommend allow }"#)
                            .unwrap();

                        let (client_conn, first_batch) = client.begin_session();
                        let server_conn = server.accept_connection();

                        let reply = server
                            .receive_batch(server_conn, first_batch.as_bytes())
                            .unwrap()
                            .expect("a data request is pending, not a final recommendation yet");

                        let reply = client
                            .receive_batch(client_conn, reply.as_bytes())
                            .unwrap()
                            .expect("client still has a reply to send back");

                        let final_reply = server
                            .receive_batch(server_conn, reply.as_bytes())
                            .unwrap()
                            .expect("predicate is satisfied by now");

                        (i, final_reply)
                    })
                })
                .collect();

            for handle in handles {
                let (i, final_reply) = handle.join().expect("worker thread panicked");
                assert!(
                    final_reply.contains(r#"TNCCS-Recommendation type="allow""#),
                    "worker {i} did not converge on allow: {final_reply}"
                );
            }
        });
    }

    /// The same property against a single shared `TncServer`: concurrent
    /// connections accepted on one server instance must not cross-pollinate
    /// the aggregator vote vectors or the sample IMV's per-connection posture
    /// cache that `conn_id` keys into.
    #[test]
    fn one_server_handles_concurrent_connections_independently() {
        const WORKERS: usize = 8;

        let mut server = TncServer::new(RecommendationPolicy::All);
        server
            .install_sample_imv(r#"if File.x.status eq "1" { recommend allow }"#)
            .unwrap();

        let server = &server;

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..WORKERS)
                .map(|i| {
                    scope.spawn(move || {
                        let mut client = TncClient::new();
                        client.install_sample_imc();

                        let (client_conn, first_batch) = client.begin_session();
                        let server_conn = server.accept_connection();

                        let reply = server
                            .receive_batch(server_conn, first_batch.as_bytes())
                            .unwrap()
                            .expect("a data request is pending, not a final recommendation yet");

                        let reply = client
                            .receive_batch(client_conn, reply.as_bytes())
                            .unwrap()
                            .expect("client still has a reply to send back");

                        let final_reply = server
                            .receive_batch(server_conn, reply.as_bytes())
                            .unwrap()
                            .expect("predicate is satisfied by now");

                        (i, server_conn, final_reply)
                    })
                })
                .collect();

            let mut seen_conn_ids = std::collections::HashSet::new();
            for handle in handles {
                let (i, server_conn, final_reply) = handle.join().expect("worker thread panicked");
                assert!(
                    final_reply.contains(r#"TNCCS-Recommendation type="allow""#),
                    "worker {i} did not converge on allow: {final_reply}"
                );
                assert!(seen_conn_ids.insert(server_conn), "connection id {server_conn} was handed out twice");
            }
        });
    }
}
