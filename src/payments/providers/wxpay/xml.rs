//! Flat `<xml><key>value</key></xml>` documents used by the v2 API

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{WxPayError, WxPayResult};
use crate::payments::types::PayloadMap;

const ROOT: &str = "xml";

pub fn to_xml(data: &PayloadMap) -> WxPayResult<String> {
    let mut writer = Writer::new(Vec::new());

    writer
        .write_event(Event::Start(BytesStart::new(ROOT)))
        .map_err(write_err)?;
    for (key, value) in data {
        writer
            .write_event(Event::Start(BytesStart::new(key.as_str())))
            .map_err(write_err)?;
        writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(write_err)?;
        writer
            .write_event(Event::End(BytesEnd::new(key.as_str())))
            .map_err(write_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(ROOT)))
        .map_err(write_err)?;

    String::from_utf8(writer.into_inner()).map_err(|e| WxPayError::xml(e.to_string()))
}

/// Parse the direct children of the root element into a map.
///
/// The document must be a single well-formed `<xml>` element. DOCTYPE
/// declarations are refused outright so no entity is ever expanded.
pub fn from_xml(xml: &str) -> WxPayResult<PayloadMap> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut data = PayloadMap::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut root_closed = false;
    let mut current: Option<String> = None;
    let mut value = String::new();

    loop {
        match reader.read_event()? {
            Event::DocType(_) => return Err(WxPayError::xml("DOCTYPE is not allowed")),
            Event::Start(e) => {
                let name = element_name(e.name().as_ref())?;
                if depth == 0 {
                    check_root(&name, root_closed)?;
                    seen_root = true;
                }
                depth += 1;
                if depth == 2 {
                    current = Some(name);
                    value.clear();
                }
            }
            Event::Empty(e) => {
                let name = element_name(e.name().as_ref())?;
                match depth {
                    0 => {
                        check_root(&name, root_closed)?;
                        seen_root = true;
                        root_closed = true;
                    }
                    1 => {
                        data.insert(name, String::new());
                    }
                    _ => {}
                }
            }
            Event::Text(t) if depth == 0 => {
                if !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(WxPayError::xml("text outside the root element"));
                }
            }
            Event::Text(t) if depth == 2 => {
                let text = t.unescape().map_err(|e| WxPayError::xml(e.to_string()))?;
                value.push_str(&text);
            }
            Event::CData(_) if depth == 0 => {
                return Err(WxPayError::xml("text outside the root element"));
            }
            Event::CData(c) if depth == 2 => {
                let raw = c.into_inner();
                let text = std::str::from_utf8(&raw).map_err(|e| WxPayError::xml(e.to_string()))?;
                value.push_str(text);
            }
            Event::End(_) => {
                match depth {
                    0 => return Err(WxPayError::xml("unmatched closing tag")),
                    1 => root_closed = true,
                    2 => {
                        if let Some(key) = current.take() {
                            data.insert(key, std::mem::take(&mut value));
                        }
                    }
                    _ => {}
                }
                depth -= 1;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(WxPayError::xml("document ended inside an element"));
    }
    if !seen_root {
        return Err(WxPayError::xml("missing <xml> root element"));
    }
    Ok(data)
}

fn check_root(name: &str, root_closed: bool) -> WxPayResult<()> {
    if root_closed {
        return Err(WxPayError::xml(format!("<{}> after the root element", name)));
    }
    if name != ROOT {
        return Err(WxPayError::xml(format!("unexpected root <{}>", name)));
    }
    Ok(())
}

fn write_err<E: std::fmt::Display>(e: E) -> WxPayError {
    WxPayError::xml(e.to_string())
}

fn element_name(raw: &[u8]) -> WxPayResult<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| WxPayError::xml(e.to_string()))
}
