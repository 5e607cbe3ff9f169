//! Recommendation-aggregation convergence under both policies (spec.md §8
//! S2), driven directly against `tnc-aggregator` and `TncsConnection`'s vote
//! storage rather than through a full batch round trip.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tnc_aggregator::provide_recommendation;
    use tnc_connections::TncsConnection;
    use tnc_types::{Recommendation, RecommendationPolicy};

    fn connection(policy: RecommendationPolicy) -> Arc<Mutex<TncsConnection<()>>> {
        let conn = TncsConnection::new(policy);
        Arc::new(Mutex::new(conn))
    }

    /// S2: three IMVs vote `{NO_ACCESS, ALLOW, ISOLATE}`. Under `ANY` the
    /// dissenting `NO_ACCESS`/`ISOLATE` votes are overridden by the single
    /// `ALLOW`; under `ALL` the disagreement collapses to `NO_ACCESS`.
    #[test]
    fn any_policy_lets_a_single_allow_vote_win() {
        let conn = connection(RecommendationPolicy::Any);
        conn.lock().ensure_imv_capacity(3);

        assert_eq!(provide_recommendation(&conn, 0, Recommendation::NoAccess), None);
        assert_eq!(provide_recommendation(&conn, 1, Recommendation::Allow), None);
        let final_rec = provide_recommendation(&conn, 2, Recommendation::Isolate);

        assert_eq!(final_rec, Some(Recommendation::Allow));
        assert_eq!(conn.lock().final_recommendation, Some(Recommendation::Allow));
    }

    #[test]
    fn all_policy_collapses_disagreement_to_no_access() {
        let conn = connection(RecommendationPolicy::All);
        conn.lock().ensure_imv_capacity(3);

        assert_eq!(provide_recommendation(&conn, 0, Recommendation::NoAccess), None);
        assert_eq!(provide_recommendation(&conn, 1, Recommendation::Allow), None);
        let final_rec = provide_recommendation(&conn, 2, Recommendation::Isolate);

        assert_eq!(final_rec, Some(Recommendation::NoAccess));
    }

    #[test]
    fn all_policy_agrees_when_every_vote_matches() {
        let conn = connection(RecommendationPolicy::All);
        conn.lock().ensure_imv_capacity(2);

        assert_eq!(provide_recommendation(&conn, 0, Recommendation::Allow), None);
        let final_rec = provide_recommendation(&conn, 1, Recommendation::Allow);

        assert_eq!(final_rec, Some(Recommendation::Allow));
    }

    /// Once finalized, a repeat vote updates the stored value but does not
    /// re-trigger finalization (spec §4.5 step 3).
    #[test]
    fn a_repeat_vote_after_finalization_is_not_reported_again() {
        let conn = connection(RecommendationPolicy::Any);
        conn.lock().ensure_imv_capacity(1);

        assert_eq!(provide_recommendation(&conn, 0, Recommendation::Allow), Some(Recommendation::Allow));
        assert_eq!(provide_recommendation(&conn, 0, Recommendation::Isolate), None);
        assert_eq!(conn.lock().final_recommendation, Some(Recommendation::Allow));
    }
}
