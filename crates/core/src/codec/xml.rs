//! Tagged-text adapter: FHIR XML via quick-xml events.
//! Parses into the same tree shape as the JSON adapter. Serialization is
//! hand-written with one tab per nesting level: scalars become
//! `<name value="…"/>` elements, repeated fields repeated elements, and
//! narrative `div` subtrees pass through raw.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::codec::Encoding;
use crate::error::{ParseError, WriteError};
use crate::resource::Resource;

const FHIR_NS: &str = "http://hl7.org/fhir";

struct Frame {
    name: String,
    attrs: ElementAttrs,
    children: Map<String, Value>,
}

pub fn parse(text: &str) -> Result<Resource, ParseError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Frame> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = element_name(&e);
                if !stack.is_empty() && name == "div" {
                    // narrative subtree: keep the raw markup verbatim
                    let mut div = raw_start_tag(&e);
                    let span = reader.read_to_end(e.name())?;
                    div.push_str(&text[span.start as usize..span.end as usize]);
                    div.push_str("</");
                    div.push_str(&String::from_utf8_lossy(e.name().as_ref()));
                    div.push('>');
                    if let Some(top) = stack.last_mut() {
                        insert_child(&mut top.children, name, Value::String(div));
                    }
                } else {
                    // the root's attributes are only namespace noise
                    let attrs = if stack.is_empty() {
                        ElementAttrs::default()
                    } else {
                        element_attributes(&e)
                    };
                    stack.push(Frame {
                        name,
                        attrs,
                        children: Map::new(),
                    });
                }
            }
            Event::Empty(e) => {
                let name = element_name(&e);
                match stack.last_mut() {
                    Some(top) => {
                        let value = assemble(element_attributes(&e), Map::new());
                        insert_child(&mut top.children, name, value);
                    }
                    None => return root_body(name, Map::new()),
                }
            }
            Event::End(_) => {
                let frame = match stack.pop() {
                    Some(frame) => frame,
                    None => return Err(ParseError::Structure("unbalanced end tag".into())),
                };
                let value = assemble(frame.attrs, frame.children);
                match stack.last_mut() {
                    Some(top) => insert_child(&mut top.children, frame.name, value),
                    None => {
                        let children = match value {
                            Value::Object(children) => children,
                            _ => Map::new(),
                        };
                        return root_body(frame.name, children);
                    }
                }
            }
            Event::Text(t) => {
                if !t.unescape()?.trim().is_empty() {
                    return Err(ParseError::Structure(
                        "text content outside a narrative element".into(),
                    ));
                }
            }
            Event::Eof => {
                let detail = if stack.is_empty() {
                    "no root element"
                } else {
                    "unexpected end of document"
                };
                return Err(ParseError::Structure(detail.into()));
            }
            _ => {}
        }
    }
}

fn root_body(type_name: String, children: Map<String, Value>) -> Result<Resource, ParseError> {
    let mut body = Map::new();
    body.insert("resourceType".to_string(), Value::String(type_name));
    for (key, value) in children {
        body.insert(key, value);
    }
    Resource::from_body(Value::Object(body), Encoding::Xml)
}

/// Rebuild a start tag from its event, attribute escaping untouched.
fn raw_start_tag(start: &BytesStart) -> String {
    let mut tag = format!("<{}", String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes().flatten() {
        tag.push(' ');
        tag.push_str(&String::from_utf8_lossy(attr.key.as_ref()));
        tag.push_str("=\"");
        tag.push_str(&String::from_utf8_lossy(&attr.value));
        tag.push('"');
    }
    tag.push('>');
    tag
}

#[derive(Default)]
struct ElementAttrs {
    value: Option<String>,
    id: Option<String>,
    url: Option<String>,
}

fn element_attributes(start: &BytesStart) -> ElementAttrs {
    let mut out = ElementAttrs::default();
    for attr in start.attributes().flatten() {
        let key = attr.key.as_ref();
        if key.starts_with(b"xmlns") || key.contains(&b':') {
            continue;
        }
        let raw = String::from_utf8_lossy(&attr.value);
        let val = quick_xml::escape::unescape(&raw)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| raw.into_owned());
        match key {
            b"value" => out.value = Some(val),
            b"id" => out.id = Some(val),
            b"url" => out.url = Some(val),
            _ => {}
        }
    }
    out
}

/// Converge on the JSON shape: a bare `value` attribute is a scalar, the
/// `id` and `url` attributes become fields, anything richer is an object.
fn assemble(attrs: ElementAttrs, children: Map<String, Value>) -> Value {
    if children.is_empty() && attrs.id.is_none() && attrs.url.is_none() {
        return match attrs.value {
            Some(value) => Value::String(value),
            None => Value::Object(Map::new()),
        };
    }
    let mut map = Map::new();
    if let Some(id) = attrs.id {
        map.insert("id".to_string(), Value::String(id));
    }
    if let Some(url) = attrs.url {
        map.insert("url".to_string(), Value::String(url));
    }
    if let Some(value) = attrs.value {
        map.insert("@value".to_string(), Value::String(value));
    }
    for (key, value) in children {
        insert_child(&mut map, key, value);
    }
    Value::Object(map)
}

fn insert_child(map: &mut Map<String, Value>, name: String, value: Value) {
    match map.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

pub fn serialize(resource: &Resource) -> Result<String, WriteError> {
    let root = resource.type_name().to_string();
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let fields: Vec<(&String, &Value)> = resource
        .body()
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(key, value)| *key != "resourceType" && is_visible(value))
        .collect();
    if fields.is_empty() {
        out.push_str(&format!("<{} xmlns=\"{}\"/>\n", root, FHIR_NS));
    } else {
        out.push_str(&format!("<{} xmlns=\"{}\">\n", root, FHIR_NS));
        for (key, value) in fields {
            write_field(&mut out, key, value, 1);
        }
        out.push_str(&format!("</{}>\n", root));
    }
    Ok(out)
}

fn write_field(out: &mut String, name: &str, value: &Value, depth: usize) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                write_field(out, name, item, depth);
            }
        }
        Value::Object(map) => write_element(out, name, map, depth),
        Value::String(s) if name == "div" => {
            indent(out, depth);
            out.push_str(s);
            out.push('\n');
        }
        scalar => {
            indent(out, depth);
            out.push_str(&format!(
                "<{} value=\"{}\"/>\n",
                name,
                escape_attr(&scalar_text(scalar))
            ));
        }
    }
}

fn write_element(out: &mut String, name: &str, map: &Map<String, Value>, depth: usize) {
    let id_attr = map.get("id").and_then(Value::as_str);
    // The url attribute only exists on extension elements; everywhere else
    // url is an ordinary child element.
    let url_attr = if name == "extension" || name == "modifierExtension" {
        map.get("url").and_then(Value::as_str)
    } else {
        None
    };
    let value_attr = map.get("@value").and_then(Value::as_str);

    let mut open = format!("<{}", name);
    if let Some(id) = id_attr {
        open.push_str(&format!(" id=\"{}\"", escape_attr(id)));
    }
    if let Some(url) = url_attr {
        open.push_str(&format!(" url=\"{}\"", escape_attr(url)));
    }
    if let Some(value) = value_attr {
        open.push_str(&format!(" value=\"{}\"", escape_attr(value)));
    }

    let children: Vec<(&String, &Value)> = map
        .iter()
        .filter(|(key, value)| {
            is_visible(value)
                && !(*key == "id" && id_attr.is_some())
                && !(*key == "url" && url_attr.is_some())
                && !(*key == "@value" && value_attr.is_some())
        })
        .collect();

    indent(out, depth);
    if children.is_empty() {
        out.push_str(&open);
        out.push_str("/>\n");
    } else {
        out.push_str(&open);
        out.push_str(">\n");
        for (key, value) in children {
            write_field(out, key, value, depth + 1);
        }
        indent(out, depth);
        out.push_str(&format!("</{}>\n", name));
    }
}

/// Nulls and empty arrays have no tagged-text representation; keeping them
/// out of the child count keeps empty elements self-closing.
fn is_visible(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const VALUE_SET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ValueSet xmlns="http://hl7.org/fhir">
	<id value="vs-1"/>
	<url value="http://example.org/fhir/demo/ValueSet/vs-1"/>
	<name value="Demo_vs_1"/>
	<status value="draft"/>
</ValueSet>
"#;

    #[test]
    fn parse_reads_identity_fields() {
        let r = parse(VALUE_SET).unwrap();
        assert_eq!(r.type_name(), "ValueSet");
        assert_eq!(r.id(), Some("vs-1"));
        assert_eq!(r.url(), Some("http://example.org/fhir/demo/ValueSet/vs-1"));
        assert_eq!(r.name(), Some("Demo_vs_1"));
    }

    #[test]
    fn serialize_is_canonical_for_canonical_input() {
        let r = parse(VALUE_SET).unwrap();
        assert_eq!(serialize(&r).unwrap(), VALUE_SET);
    }

    #[test]
    fn non_canonical_input_round_trips_stably() {
        let messy = "<?xml version=\"1.0\"?><ValueSet xmlns=\"http://hl7.org/fhir\">  <id value=\"vs\"/><name value=\"V\"/>   </ValueSet>";
        let once = serialize(&parse(messy).unwrap()).unwrap();
        let twice = serialize(&parse(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
        assert!(once.contains("\t<id value=\"vs\"/>\n"));
    }

    #[test]
    fn repeated_elements_become_arrays() {
        let text = r#"<SearchParameter xmlns="http://hl7.org/fhir">
	<id value="sp"/>
	<base value="Patient"/>
	<base value="Practitioner"/>
</SearchParameter>
"#;
        let r = parse(text).unwrap();
        assert_eq!(
            r.body()["base"],
            json!(["Patient", "Practitioner"])
        );
        let out = serialize(&r).unwrap();
        assert_eq!(out.matches("<base value=").count(), 2);
    }

    #[test]
    fn element_id_and_extension_url_attributes() {
        let text = r#"<StructureDefinition xmlns="http://hl7.org/fhir">
	<id value="sd"/>
	<differential>
		<element id="Extension.url">
			<path value="Extension.url"/>
			<fixedUri value="http://example.org/old"/>
		</element>
	</differential>
	<extension url="http://example.org/ext">
		<valueString value="x"/>
	</extension>
</StructureDefinition>
"#;
        let r = parse(text).unwrap();
        assert_eq!(
            r.body()["differential"]["element"]["id"],
            json!("Extension.url")
        );
        assert_eq!(r.body()["extension"]["url"], json!("http://example.org/ext"));
        // attributes serialize back as attributes, not child elements
        let out = serialize(&r).unwrap();
        assert!(out.contains("<element id=\"Extension.url\">"));
        assert!(out.contains("<extension url=\"http://example.org/ext\">"));
        assert_eq!(serialize(&parse(&out).unwrap()).unwrap(), out);
    }

    #[test]
    fn narrative_div_passes_through_raw() {
        let text = r#"<CodeSystem xmlns="http://hl7.org/fhir">
	<id value="cs"/>
	<text>
		<status value="generated"/>
		<div xmlns="http://www.w3.org/1999/xhtml"><p>Hand <b>written</b> &amp; kept</p></div>
	</text>
</CodeSystem>
"#;
        let r = parse(text).unwrap();
        assert_eq!(
            r.body()["text"]["div"],
            json!("<div xmlns=\"http://www.w3.org/1999/xhtml\"><p>Hand <b>written</b> &amp; kept</p></div>")
        );
        assert_eq!(serialize(&r).unwrap(), text);
    }

    #[test]
    fn attribute_values_are_escaped() {
        let body = json!({
            "resourceType": "ValueSet",
            "id": "vs",
            "description": "a < b & \"c\""
        });
        let r = Resource::from_body(body, Encoding::Xml).unwrap();
        let out = serialize(&r).unwrap();
        assert!(out.contains("value=\"a &lt; b &amp; &quot;c&quot;\""));
        let back = parse(&out).unwrap();
        assert_eq!(back.get_str("description"), Some("a < b & \"c\""));
    }

    #[test]
    fn parse_rejects_unclosed_document() {
        assert!(parse("<ValueSet xmlns=\"http://hl7.org/fhir\"><id value=\"x\"/>").is_err());
    }
}
