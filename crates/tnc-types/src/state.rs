//! Connection and logging states shared across the runtime.

/// Connection-state notifications delivered to IMCs (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Create,
    Handshake,
    AccessAllowed,
    AccessIsolated,
    AccessNone,
    Delete,
}

impl ConnectionState {
    /// Map a TNCS recommendation to the state notification sent to IMCs on
    /// the TNCC side (spec §4.4 "Control-message effects on the TNCC side").
    pub fn from_recommendation(rec: super::Recommendation) -> Self {
        use super::Recommendation::*;
        match rec {
            Allow => Self::AccessAllowed,
            Isolate => Self::AccessIsolated,
            NoAccess | NoRecommendation => Self::AccessNone,
        }
    }
}

/// Log severities (spec §4.6 grammar, §9; matches `TNC_LOG_SEVERITY_*` in
/// the original `libtnc_log.c`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Err,
    Warning,
    Notice,
    Info,
    Debug,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Recommendation;

    #[test]
    fn recommendation_maps_to_state() {
        assert_eq!(
            ConnectionState::from_recommendation(Recommendation::Allow),
            ConnectionState::AccessAllowed
        );
        assert_eq!(
            ConnectionState::from_recommendation(Recommendation::NoRecommendation),
            ConnectionState::AccessNone
        );
    }
}
