//! # tnc-aggregator
//!
//! IMV recommendation aggregation (spec §2 C8, §4.5). Operates directly on
//! [`TncsConnection`]'s vote storage rather than keeping a parallel table,
//! per spec §6's note that the vote arrays live on the connection context.
//! Finalization happens under the *connection's* lock, never a global one —
//! two different connections converge independently and concurrently.

use parking_lot::Mutex;
use std::sync::Arc;
use tnc_connections::TncsConnection;
use tnc_types::{Recommendation, RecommendationPolicy};

/// Record one IMV's vote and, if every known IMV slot has now voted at
/// least once, finalize and return the aggregate recommendation.
///
/// Spec §4.5 step 3: a repeat vote from the same IMV updates the stored
/// value but does not recompute an already-final decision — callers that
/// want the reference behavior should stop calling this once they've
/// observed `Some(_)` for a connection.
pub fn provide_recommendation<B>(
    conn: &Arc<Mutex<TncsConnection<B>>>,
    imv_id: u32,
    rec: Recommendation,
) -> Option<Recommendation> {
    let mut guard = conn.lock();
    guard.record_vote(imv_id as usize, rec);

    if guard.have_recommendation {
        return None;
    }
    if !guard.all_voted() {
        return None;
    }

    let final_rec = finalize(guard.policy, guard.votes());
    guard.final_recommendation = Some(final_rec);
    guard.have_recommendation = true;
    Some(final_rec)
}

fn finalize(policy: RecommendationPolicy, votes: &[Recommendation]) -> Recommendation {
    match policy {
        // Spec §4.5: all stored recommendations identical -> that value,
        // otherwise NO_ACCESS.
        RecommendationPolicy::All => {
            let first = votes[0];
            if votes.iter().all(|&v| v == first) {
                first
            } else {
                Recommendation::NoAccess
            }
        }
        // Spec §4.5: left-fold upgrade order ALLOW > ISOLATE > NO_ACCESS.
        RecommendationPolicy::Any => {
            if votes.iter().any(|&v| v == Recommendation::Allow) {
                Recommendation::Allow
            } else if votes.iter().any(|&v| v == Recommendation::Isolate) {
                Recommendation::Isolate
            } else {
                Recommendation::NoAccess
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(policy: RecommendationPolicy) -> Arc<Mutex<TncsConnection<()>>> {
        Arc::new(Mutex::new(TncsConnection::new(policy)))
    }

    #[test]
    fn does_not_finalize_before_every_imv_has_voted() {
        let c = conn(RecommendationPolicy::All);
        c.lock().ensure_imv_capacity(2);
        assert_eq!(provide_recommendation(&c, 0, Recommendation::Allow), None);
    }

    #[test]
    fn all_policy_requires_unanimity() {
        let c = conn(RecommendationPolicy::All);
        c.lock().ensure_imv_capacity(2);
        assert_eq!(provide_recommendation(&c, 0, Recommendation::Allow), None);
        assert_eq!(
            provide_recommendation(&c, 1, Recommendation::Isolate),
            Some(Recommendation::NoAccess)
        );
    }

    #[test]
    fn all_policy_agrees_when_unanimous() {
        let c = conn(RecommendationPolicy::All);
        c.lock().ensure_imv_capacity(2);
        provide_recommendation(&c, 0, Recommendation::Allow);
        assert_eq!(
            provide_recommendation(&c, 1, Recommendation::Allow),
            Some(Recommendation::Allow)
        );
    }

    #[test]
    fn any_policy_upgrades_to_allow_over_isolate() {
        let c = conn(RecommendationPolicy::Any);
        c.lock().ensure_imv_capacity(2);
        provide_recommendation(&c, 0, Recommendation::Isolate);
        assert_eq!(
            provide_recommendation(&c, 1, Recommendation::Allow),
            Some(Recommendation::Allow)
        );
    }

    #[test]
    fn any_policy_falls_back_to_no_access() {
        let c = conn(RecommendationPolicy::Any);
        c.lock().ensure_imv_capacity(2);
        provide_recommendation(&c, 0, Recommendation::NoAccess);
        assert_eq!(
            provide_recommendation(&c, 1, Recommendation::NoAccess),
            Some(Recommendation::NoAccess)
        );
    }

    #[test]
    fn a_single_imv_finalizes_immediately() {
        let c = conn(RecommendationPolicy::All);
        c.lock().ensure_imv_capacity(1);
        assert_eq!(
            provide_recommendation(&c, 0, Recommendation::Allow),
            Some(Recommendation::Allow)
        );
    }

    #[test]
    fn repeat_vote_after_finalization_does_not_recompute() {
        let c = conn(RecommendationPolicy::All);
        c.lock().ensure_imv_capacity(1);
        provide_recommendation(&c, 0, Recommendation::Allow);
        assert_eq!(provide_recommendation(&c, 0, Recommendation::NoAccess), None);
        assert_eq!(c.lock().final_recommendation, Some(Recommendation::Allow));
    }
}
