//! # tnc-router
//!
//! Computes IMC-IMV message fan-out (spec §2 C5, §4.3). This crate is
//! deliberately ignorant of plugin records and shared-library symbols — it
//! takes an ordered sequence of `(plugin_id, subscriptions)` pairs (the
//! plugin host supplies these in slot order) and returns the ordered list
//! of plugin ids that should receive a given incoming message, the same
//! topic-matching split the teacher uses between `shared-bus::publisher`
//! (who gets notified) and the subsystem adapters that actually act on it.

use tnc_types::{MessageType, TncError, TncResult};

/// Resolve which plugins should receive `incoming`, given each plugin's
/// subscription list, in slot order.
///
/// Rejects a fully-wildcard incoming type (spec property P3). A plugin
/// whose list contains more than one matching pattern is still delivered to
/// exactly once (spec property P2): the first match for a plugin short-
/// circuits the rest of that plugin's list.
pub fn resolve_targets<'a, I>(subscribers: I, incoming: MessageType) -> TncResult<Vec<u32>>
where
    I: IntoIterator<Item = (u32, &'a [MessageType])>,
{
    if incoming.is_fully_wildcard() {
        return Err(TncError::InvalidParameter(
            "cannot deliver a fully-wildcard message type".into(),
        ));
    }

    let mut targets = Vec::new();
    for (id, patterns) in subscribers {
        if patterns.iter().any(|p| p.matches(incoming)) {
            targets.push(id);
        }
    }
    Ok(targets)
}
