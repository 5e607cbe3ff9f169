//! IMV/TNCS access recommendations (spec §3, §4.5).

/// An access recommendation, either a final IMV vote or an aggregated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Allow,
    Isolate,
    NoAccess,
    NoRecommendation,
}

impl Recommendation {
    /// The `type` attribute value used on the wire for `TNCCS-Recommendation`
    /// (spec §3). `NoRecommendation` has no wire representation: a missing
    /// recommendation is treated as `NoAccess` at policy sites (spec §7) and
    /// is never itself serialized.
    pub fn wire_type(self) -> Option<&'static str> {
        match self {
            Self::Allow => Some("allow"),
            Self::Isolate => Some("isolate"),
            Self::NoAccess => Some("none"),
            Self::NoRecommendation => None,
        }
    }

    pub fn from_wire_type(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Self::Allow),
            "isolate" => Some(Self::Isolate),
            "none" => Some(Self::NoAccess),
            _ => None,
        }
    }
}

/// Recommendation-aggregation policy (spec §4.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecommendationPolicy {
    #[default]
    All,
    Any,
}
