//! TNCS-side connection context (spec §3 "Connection (TNCS side)", §4.5).
//!
//! Carries the aggregator's per-IMV vote storage directly, per spec §6
//! ("TNCS-side context carries the aggregator's per-IMV vote storage,
//! driven by `tnc-aggregator`") — `tnc-aggregator` operates on this struct
//! through `&mut` rather than owning a parallel table of its own.

use tnc_types::{ConnectionState, Recommendation, RecommendationPolicy};

pub struct TncsConnection<B> {
    pub app_data: Option<Vec<u8>>,
    pub current_batch: Option<B>,
    pub state: ConnectionState,
    pub policy: RecommendationPolicy,
    pub have_recommendation: bool,
    pub final_recommendation: Option<Recommendation>,
    pub evaluation: i32,
    /// Vote count per IMV slot id; `0` means that IMV has not voted yet.
    have_recommendations: Vec<u32>,
    /// Last recommendation stored per IMV slot id.
    recommendations: Vec<Recommendation>,
    /// Outgoing IMV-to-IMC message count for the turn in progress, reset at
    /// the start of each `receive_batch` call. Paired with the caller's own
    /// incoming count, an end-of-batch turn with either side at zero feeds
    /// the "no exchange occurred" heuristic (spec §4.4).
    pub imv_imc_count: u32,
}

impl<B> TncsConnection<B> {
    pub fn new(policy: RecommendationPolicy) -> Self {
        Self {
            app_data: None,
            current_batch: None,
            state: ConnectionState::Create,
            policy,
            have_recommendation: false,
            final_recommendation: None,
            evaluation: 0,
            have_recommendations: Vec::new(),
            recommendations: Vec::new(),
            imv_imc_count: 0,
        }
    }

    /// Grow the per-IMV vote vectors to at least `num_imvs` slots. Called
    /// before dispatching to an IMV whose slot id the vote tables haven't
    /// seen yet (the IMV slot table can grow across the process lifetime).
    pub fn ensure_imv_capacity(&mut self, num_imvs: usize) {
        if self.have_recommendations.len() < num_imvs {
            self.have_recommendations.resize(num_imvs, 0);
            self.recommendations
                .resize(num_imvs, Recommendation::NoRecommendation);
        }
    }

    pub fn vote_count(&self) -> usize {
        self.have_recommendations.len()
    }

    pub fn has_voted(&self, imv_id: usize) -> bool {
        self.have_recommendations.get(imv_id).is_some_and(|&c| c > 0)
    }

    pub fn record_vote(&mut self, imv_id: usize, rec: Recommendation) {
        self.ensure_imv_capacity(imv_id + 1);
        self.recommendations[imv_id] = rec;
        self.have_recommendations[imv_id] += 1;
    }

    pub fn votes(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn all_voted(&self) -> bool {
        !self.have_recommendations.is_empty() && self.have_recommendations.iter().all(|&c| c > 0)
    }
}
