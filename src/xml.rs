//! Reader-based XML helpers shared by the XML adapters

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, RetrievalError};

/// Create a `Reader` that keeps mixed-content whitespace and expands `<tag/>`
/// into `Start` + `End` events
pub(crate) fn make_reader(content: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().expand_empty_elements = true;
    reader
}

/// Read all text inside the element whose `Start` was just consumed,
/// ignoring child tags, and return it trimmed
pub(crate) fn read_text_content(
    reader: &mut Reader<&[u8]>,
    parent_tag: &[u8],
    buf: &mut Vec<u8>,
) -> Result<String> {
    let mut text = String::new();
    let mut depth: u32 = 1;

    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => {
                if e.name().as_ref() == parent_tag {
                    depth += 1;
                }
            }
            Ok(Event::Text(ref e)) => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| RetrievalError::XmlError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(ref e)) => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == parent_tag {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
            }
            Ok(Event::Eof) => {
                return Err(RetrievalError::XmlError(format!(
                    "unexpected end of document inside <{}>",
                    String::from_utf8_lossy(parent_tag)
                )));
            }
            Err(e) => return Err(RetrievalError::XmlError(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(text.trim().to_string())
}

/// Attribute value of `e`, if present
pub(crate) fn get_attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.try_get_attribute(name)
        .ok()?
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}
