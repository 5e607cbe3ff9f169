//! IF-TNCCS batch document engine: the typed envelope/control vocabulary
//! (spec §3, §4.4), bit-exact XML serialization and tolerant parsing
//! (spec §4.4, §6, §9), and the TNCS attribute store (spec §3, §6).

mod attributes;
mod batch;
mod control;
mod xml;

pub use attributes::AttributeStore;
pub use batch::{Envelope, OutgoingBatch, Recipient};
pub use control::{
    ControlMessage, SUBTYPE_ERROR, SUBTYPE_PREFERRED_LANGUAGE, SUBTYPE_REASON_STRINGS,
    SUBTYPE_RECOMMENDATION, SUBTYPE_TNCS_CONTACT_INFO,
};
pub use xml::{parse, serialize, ControlBody, ParsedBatch, ParsedMessage, NS_TNCCS};
