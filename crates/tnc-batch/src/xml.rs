//! Bit-exact XML serialization and tolerant parsing of `TNCCS-Batch`
//! documents (spec §4.4 "Bit-exact details", §6 "Batch XML on the wire").

use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use tnc_types::{MessageType, Recommendation, TncError, TncResult, VENDOR_TCG};

use crate::batch::{Envelope, OutgoingBatch, Recipient};
use crate::control::{
    ControlMessage, SUBTYPE_ERROR, SUBTYPE_PREFERRED_LANGUAGE, SUBTYPE_REASON_STRINGS,
    SUBTYPE_RECOMMENDATION, SUBTYPE_TNCS_CONTACT_INFO,
};

pub const NS_TNCCS: &str = "http://www.trustedcomputinggroup.org/IWG/TNC/1_0/IF_TNCCS#";
const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str =
    "http://www.trustedcomputinggroup.org/IWG/TNC/1_0/IF_TNCCS# https://www.trustedcomputinggroup.org/XML/SCHEMA/TNCCS_1.0.xsd";

/// Serialize an [`OutgoingBatch`] to the exact wire form spec §4.4 names:
/// decimal `BatchId`, zero-padded 8-digit hex `Type`, ≤76-column base64.
pub fn serialize(batch: &OutgoingBatch) -> String {
    let mut writer = Writer::new(Vec::new());

    let mut root = BytesStart::new("TNCCS-Batch");
    let batch_id = batch.batch_id.to_string();
    root.push_attribute(("BatchId", batch_id.as_str()));
    root.push_attribute(("Recipient", batch.recipient.as_str()));
    root.push_attribute(("xmlns", NS_TNCCS));
    root.push_attribute(("xmlns:xsi", NS_XSI));
    root.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
    writer
        .write_event(Event::Start(root))
        .expect("writing to an in-memory buffer cannot fail");

    for envelope in &batch.envelopes {
        write_envelope(&mut writer, envelope);
    }

    writer
        .write_event(Event::End(BytesEnd::new("TNCCS-Batch")))
        .expect("writing to an in-memory buffer cannot fail");

    String::from_utf8(writer.into_inner()).expect("quick-xml only emits valid UTF-8")
}

fn write_envelope(writer: &mut Writer<Vec<u8>>, envelope: &Envelope) {
    match envelope {
        Envelope::ImcImv { msg_type, payload } => {
            write_wrapped(writer, "IMC-IMV-Message", msg_type.to_hex8().as_str(), |w| {
                write_text_element(w, "Base64", &tnc_collections::base64::encode(payload));
            });
        }
        Envelope::Control(control) => {
            let msg_type = control.message_type();
            write_wrapped(writer, "TNCC-TNCS-Message", msg_type.to_hex8().as_str(), |w| {
                write_control_body(w, control);
            });
        }
    }
}

fn write_wrapped(writer: &mut Writer<Vec<u8>>, outer: &str, type_hex: &str, body: impl FnOnce(&mut Writer<Vec<u8>>)) {
    start(writer, outer);
    write_text_element(writer, "Type", type_hex);
    body(writer);
    end(writer, outer);
}

fn write_control_body(writer: &mut Writer<Vec<u8>>, control: &ControlMessage) {
    start(writer, "XML");
    match control {
        ControlMessage::Recommendation(rec) => {
            let wire = rec.wire_type().unwrap_or("none");
            let mut n = BytesStart::new("TNCCS-Recommendation");
            n.push_attribute(("type", wire));
            writer.write_event(Event::Empty(n)).expect("in-memory write");
        }
        ControlMessage::Error { kind, message } => {
            let mut n = BytesStart::new("TNCCS-Error");
            n.push_attribute(("type", kind.as_str()));
            writer.write_event(Event::Start(n)).expect("in-memory write");
            writer
                .write_event(Event::Text(BytesText::new(message)))
                .expect("in-memory write");
            writer
                .write_event(Event::End(BytesEnd::new("TNCCS-Error")))
                .expect("in-memory write");
        }
        ControlMessage::PreferredLanguage(lang) => {
            write_text_element(writer, "TNCCS-PreferredLanguage", lang);
        }
        ControlMessage::ReasonStrings(reasons) => {
            start(writer, "TNCCS-ReasonStrings");
            for (lang, reason) in reasons {
                let mut n = BytesStart::new("ReasonString");
                n.push_attribute(("xml:lang", lang.as_str()));
                writer.write_event(Event::Start(n)).expect("in-memory write");
                writer
                    .write_event(Event::Text(BytesText::new(reason)))
                    .expect("in-memory write");
                writer
                    .write_event(Event::End(BytesEnd::new("ReasonString")))
                    .expect("in-memory write");
            }
            end(writer, "TNCCS-ReasonStrings");
        }
        ControlMessage::TncsContactInfo { address, port } => {
            let mut n = BytesStart::new("TNCCS-TNCSContactInfo");
            n.push_attribute(("address", address.as_str()));
            n.push_attribute(("port", port.as_str()));
            writer.write_event(Event::Empty(n)).expect("in-memory write");
        }
    }
    end(writer, "XML");
}

fn start(writer: &mut Writer<Vec<u8>>, name: &str) {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .expect("in-memory write");
}

fn end(writer: &mut Writer<Vec<u8>>, name: &str) {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .expect("in-memory write");
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) {
    start(writer, name);
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .expect("in-memory write");
    end(writer, name);
}

// --- Parsing ----------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ParsedBatch {
    pub batch_id: u64,
    pub recipient: Recipient,
    pub messages: Vec<ParsedMessage>,
}

#[derive(Debug, Clone)]
pub enum ParsedMessage {
    ImcImv { msg_type: MessageType, payload: Vec<u8> },
    Control { msg_type: MessageType, body: ControlBody },
}

#[derive(Debug, Clone)]
pub enum ControlBody {
    Recommendation(Recommendation),
    Error { kind: String, message: String },
    PreferredLanguage(String),
    ReasonStrings(Vec<(String, String)>),
    TncsContactInfo { address: String, port: String },
    /// vendor != 0, `XML` variant: the raw inner XML for a vendor handler.
    VendorXml(String),
    /// vendor != 0, `Base64` variant.
    VendorBinary(Vec<u8>),
    Unrecognized,
}

/// Parse a batch, validating namespace, root element, `Recipient`, and
/// `BatchId` presence (spec §4.4, §7 "Fatal" taxonomy entries).
///
/// Children are walked once, in document order, via `quick-xml`'s
/// non-rewindable event iterator — this structurally satisfies spec §9 open
/// question #1 ("each loop iteration advances exactly once").
pub fn parse(bytes: &[u8], expected_recipient: Recipient) -> TncResult<ParsedBatch> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut batch_id = None;
    let mut recipient = None;
    let mut messages = Vec::new();

    loop {
        match reader
            .read_event()
            .map_err(|e| TncError::Fatal(format!("XML parse error: {e}")))?
        {
            Event::Start(start) if local_name(&start) == "TNCCS-Batch" => {
                let attrs = read_attrs(&start)?;
                if attrs.get("xmlns").map(String::as_str) != Some(NS_TNCCS) {
                    return Err(TncError::Fatal("TNCCS-Batch missing or wrong xmlns".into()));
                }
                recipient = attrs
                    .get("Recipient")
                    .and_then(|v| Recipient::from_str(v))
                    .filter(|r| *r == expected_recipient);
                if recipient.is_none() {
                    return Err(TncError::Fatal("TNCCS-Batch has the wrong Recipient".into()));
                }
                batch_id = attrs.get("BatchId").and_then(|v| v.parse::<u64>().ok());
                if batch_id.is_none() {
                    return Err(TncError::Fatal("TNCCS-Batch missing BatchId".into()));
                }
                read_messages(&mut reader, &mut messages)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ParsedBatch {
        batch_id: batch_id.ok_or_else(|| TncError::Fatal("TNCCS-Batch missing BatchId".into()))?,
        recipient: recipient.ok_or_else(|| TncError::Fatal("TNCCS-Batch missing Recipient".into()))?,
        messages,
    })
}

fn read_messages(reader: &mut Reader<&[u8]>, out: &mut Vec<ParsedMessage>) -> TncResult<()> {
    loop {
        match reader
            .read_event()
            .map_err(|e| TncError::Fatal(format!("XML parse error: {e}")))?
        {
            Event::Start(start) => {
                let name = local_name(&start).to_string();
                match name.as_str() {
                    "IMC-IMV-Message" => out.push(read_imc_imv_message(reader)?),
                    "TNCC-TNCS-Message" => out.push(read_control_message(reader)?),
                    _ => {
                        tracing::debug!(element = %name, "skipping unrecognized TNCCS-Batch child");
                        skip_subtree(reader)?;
                    }
                }
            }
            Event::End(end) if local_name_bytes(end.name().as_ref()) == "TNCCS-Batch" => return Ok(()),
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

fn read_imc_imv_message(reader: &mut Reader<&[u8]>) -> TncResult<ParsedMessage> {
    let mut msg_type = None;
    let mut payload = Vec::new();
    loop {
        match reader
            .read_event()
            .map_err(|e| TncError::Fatal(format!("XML parse error: {e}")))?
        {
            Event::Start(start) if local_name(&start) == "Type" => {
                let text = read_text_until_end(reader, "Type")?;
                msg_type = MessageType::from_hex8(&text);
            }
            Event::Start(start) if local_name(&start) == "Base64" => {
                let text = read_text_until_end(reader, "Base64")?;
                payload = tnc_collections::base64::decode(&text)
                    .map_err(|e| TncError::Fatal(format!("bad Base64 in IMC-IMV-Message: {e}")))?;
            }
            Event::Start(_) => skip_subtree(reader)?,
            Event::End(end) if local_name_bytes(end.name().as_ref()) == "IMC-IMV-Message" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    let msg_type = msg_type.ok_or_else(|| TncError::Fatal("IMC-IMV-Message missing Type".into()))?;
    Ok(ParsedMessage::ImcImv { msg_type, payload })
}

fn read_control_message(reader: &mut Reader<&[u8]>) -> TncResult<ParsedMessage> {
    let mut msg_type = None;
    let mut body = ControlBody::Unrecognized;
    loop {
        match reader
            .read_event()
            .map_err(|e| TncError::Fatal(format!("XML parse error: {e}")))?
        {
            Event::Start(start) if local_name(&start) == "Type" => {
                let text = read_text_until_end(reader, "Type")?;
                msg_type = MessageType::from_hex8(&text);
            }
            Event::Start(start) if local_name(&start) == "XML" => {
                let subtype = msg_type.map(|m| m.subtype).unwrap_or(0);
                let vendor = msg_type.map(|m| m.vendor).unwrap_or(VENDOR_TCG);
                body = read_xml_body(reader, vendor, subtype)?;
            }
            Event::Start(start) if local_name(&start) == "Base64" => {
                let text = read_text_until_end(reader, "Base64")?;
                let decoded = tnc_collections::base64::decode(&text)
                    .map_err(|e| TncError::Fatal(format!("bad Base64 in TNCC-TNCS-Message: {e}")))?;
                body = ControlBody::VendorBinary(decoded);
            }
            Event::Start(_) => skip_subtree(reader)?,
            Event::End(end) if local_name_bytes(end.name().as_ref()) == "TNCC-TNCS-Message" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    let msg_type = msg_type.ok_or_else(|| TncError::Fatal("TNCC-TNCS-Message missing Type".into()))?;
    Ok(ParsedMessage::Control { msg_type, body })
}

fn read_xml_body(reader: &mut Reader<&[u8]>, vendor: u32, subtype: u8) -> TncResult<ControlBody> {
    // A non-TCG vendor control message: surface the raw inner XML for the
    // application-supplied vendor handler rather than trying to interpret it.
    if vendor != VENDOR_TCG {
        let raw = capture_subtree_xml(reader, "XML")?;
        return Ok(ControlBody::VendorXml(raw));
    }

    let mut body = ControlBody::Unrecognized;
    loop {
        match reader
            .read_event()
            .map_err(|e| TncError::Fatal(format!("XML parse error: {e}")))?
        {
            // Self-closing elements: nothing further to consume.
            Event::Empty(start) => {
                let name = local_name(&start).to_string();
                let attrs = read_attrs(&start)?;
                if let Some(parsed) = match (subtype, name.as_str()) {
                    (SUBTYPE_RECOMMENDATION, "TNCCS-Recommendation") => {
                        let wire = attrs.get("type").map(String::as_str).unwrap_or("none");
                        Some(ControlBody::Recommendation(
                            Recommendation::from_wire_type(wire).unwrap_or(Recommendation::NoAccess),
                        ))
                    }
                    (SUBTYPE_TNCS_CONTACT_INFO, "TNCCS-TNCSContactInfo") => Some(ControlBody::TncsContactInfo {
                        address: attrs.get("address").cloned().unwrap_or_default(),
                        port: attrs.get("port").cloned().unwrap_or_default(),
                    }),
                    _ => None,
                } {
                    body = parsed;
                }
            }
            // Elements with text or child content: read through to their End.
            Event::Start(start) => {
                let name = local_name(&start).to_string();
                let attrs = read_attrs(&start)?;
                match (subtype, name.as_str()) {
                    (SUBTYPE_ERROR, "TNCCS-Error") => {
                        let kind = attrs.get("type").cloned().unwrap_or_default();
                        let message = read_text_until_end(reader, "TNCCS-Error")?;
                        body = ControlBody::Error { kind, message };
                    }
                    (SUBTYPE_PREFERRED_LANGUAGE, "TNCCS-PreferredLanguage") => {
                        body = ControlBody::PreferredLanguage(read_text_until_end(reader, "TNCCS-PreferredLanguage")?);
                    }
                    (SUBTYPE_REASON_STRINGS, "TNCCS-ReasonStrings") => {
                        body = ControlBody::ReasonStrings(read_reason_strings(reader)?);
                    }
                    _ => skip_subtree(reader)?,
                }
            }
            Event::End(end) if local_name_bytes(end.name().as_ref()) == "XML" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(body)
}

fn read_reason_strings(reader: &mut Reader<&[u8]>) -> TncResult<Vec<(String, String)>> {
    let mut out = Vec::new();
    loop {
        match reader
            .read_event()
            .map_err(|e| TncError::Fatal(format!("XML parse error: {e}")))?
        {
            Event::Start(start) if local_name(&start) == "ReasonString" => {
                let attrs = read_attrs(&start)?;
                let lang = attrs.get("xml:lang").cloned().unwrap_or_default();
                let text = read_text_until_end(reader, "ReasonString")?;
                out.push((lang, text));
            }
            Event::End(end) if local_name_bytes(end.name().as_ref()) == "TNCCS-ReasonStrings" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Accumulate text content until (and consuming) the matching `</tag>`, so
/// callers don't need to separately track whether an element was empty.
fn read_text_until_end(reader: &mut Reader<&[u8]>, tag: &str) -> TncResult<String> {
    let mut text = String::new();
    loop {
        match reader
            .read_event()
            .map_err(|e| TncError::Fatal(format!("XML parse error: {e}")))?
        {
            Event::Text(t) => {
                let unescaped = t.unescape().map_err(|e| TncError::Fatal(format!("XML text error: {e}")))?;
                text.push_str(unescaped.trim());
            }
            Event::End(e) if local_name_bytes(e.name().as_ref()) == tag => return Ok(text),
            Event::Eof => return Ok(text),
            _ => {}
        }
    }
}

fn capture_subtree_xml(reader: &mut Reader<&[u8]>, closing: &str) -> TncResult<String> {
    let mut depth = 1u32;
    let mut raw = String::new();
    loop {
        match reader
            .read_event()
            .map_err(|e| TncError::Fatal(format!("XML parse error: {e}")))?
        {
            Event::Start(s) => {
                depth += 1;
                raw.push_str(&format!("<{}>", String::from_utf8_lossy(s.name().as_ref())));
            }
            Event::Empty(s) => {
                raw.push_str(&format!("<{}/>", String::from_utf8_lossy(s.name().as_ref())));
            }
            Event::Text(t) => {
                if let Ok(unescaped) = unescape(&String::from_utf8_lossy(t.as_ref())) {
                    raw.push_str(&unescaped);
                }
            }
            Event::End(e) => {
                depth -= 1;
                if depth == 0 {
                    debug_assert_eq!(local_name_bytes(e.name().as_ref()), closing);
                    return Ok(raw);
                }
                raw.push_str(&format!("</{}>", String::from_utf8_lossy(e.name().as_ref())));
            }
            Event::Eof => return Ok(raw),
            _ => {}
        }
    }
}

fn skip_subtree(reader: &mut Reader<&[u8]>) -> TncResult<()> {
    let mut depth = 1u32;
    loop {
        match reader
            .read_event()
            .map_err(|e| TncError::Fatal(format!("XML parse error: {e}")))?
        {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

fn read_attrs(start: &BytesStart) -> TncResult<std::collections::HashMap<String, String>> {
    let mut out = std::collections::HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| TncError::Fatal(format!("bad XML attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| TncError::Fatal(format!("bad XML attribute value: {e}")))?
            .into_owned();
        out.insert(key, value);
    }
    Ok(out)
}

fn local_name(start: &BytesStart) -> &str {
    local_name_bytes(start.name().as_ref())
}

fn local_name_bytes(name: &[u8]) -> &str {
    let s = std::str::from_utf8(name).unwrap_or("");
    s.rsplit(':').next().unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlMessage;
    use tnc_types::MessageType;

    #[test]
    fn serialized_batch_round_trips_through_parse() {
        let mut batch = OutgoingBatch::new(1, Recipient::Tncs);
        batch.push_message(MessageType::new(9999, 2), b"hello".to_vec());
        batch.push_control(ControlMessage::Recommendation(Recommendation::Allow));
        let xml = serialize(&batch);
        assert!(xml.contains("BatchId=\"1\""));
        assert!(xml.contains(NS_TNCCS));

        let parsed = parse(xml.as_bytes(), Recipient::Tncs).unwrap();
        assert_eq!(parsed.batch_id, 1);
        assert_eq!(parsed.messages.len(), 2);
        match &parsed.messages[0] {
            ParsedMessage::ImcImv { msg_type, payload } => {
                assert_eq!(*msg_type, MessageType::new(9999, 2));
                assert_eq!(payload, b"hello");
            }
            _ => panic!("expected IMC-IMV-Message first"),
        }
        match &parsed.messages[1] {
            ParsedMessage::Control { body: ControlBody::Recommendation(r), .. } => {
                assert_eq!(*r, Recommendation::Allow);
            }
            _ => panic!("expected a Recommendation control message"),
        }
    }

    #[test]
    fn wrong_recipient_is_rejected() {
        let batch = OutgoingBatch::new(1, Recipient::Tncc);
        let xml = serialize(&batch);
        let err = parse(xml.as_bytes(), Recipient::Tncs).unwrap_err();
        assert!(matches!(err, TncError::Fatal(_)));
    }

    #[test]
    fn missing_batch_id_is_fatal() {
        let xml = format!(
            "<TNCCS-Batch Recipient=\"TNCS\" xmlns=\"{NS_TNCCS}\"></TNCCS-Batch>"
        );
        let err = parse(xml.as_bytes(), Recipient::Tncs).unwrap_err();
        assert!(matches!(err, TncError::Fatal(_)));
    }

    #[test]
    fn unknown_sibling_elements_are_tolerated() {
        let xml = format!(
            "<TNCCS-Batch BatchId=\"2\" Recipient=\"TNCC\" xmlns=\"{NS_TNCCS}\">\
             <SomeFutureElement><Nested/></SomeFutureElement>\
             </TNCCS-Batch>"
        );
        let parsed = parse(xml.as_bytes(), Recipient::Tncc).unwrap();
        assert!(parsed.messages.is_empty());
    }
}
