//! JUnit XML decoder.
//!
//! The document is read once into a small element tree with quick-xml, then
//! interpreted as a `<testsuites>` container or, failing that, as a bare
//! `<testsuite>`. Unknown elements and attributes are ignored.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::error::DecodeError;
use super::report::{Case, Fault, Report, Skip, Suite};

/// Decode a JUnit document.
pub fn decode(bytes: &[u8]) -> Result<Report, DecodeError> {
    let root = match parse_tree(bytes) {
        Ok(root) => root,
        Err(msg) => {
            return Err(DecodeError {
                as_suites: msg.clone(),
                as_suite: msg,
            });
        }
    };

    match decode_testsuites(&root) {
        Ok(report) => Ok(report),
        Err(as_suites) => match decode_testsuite(&root) {
            Ok(report) => Ok(report),
            Err(as_suite) => Err(DecodeError {
                as_suites,
                as_suite,
            }),
        },
    }
}

fn decode_testsuites(root: &Element) -> Result<Report, String> {
    if root.name != "testsuites" {
        return Err(format!("expected root <testsuites>, found <{}>", root.name));
    }

    let mut suites = Vec::new();
    for child in root.children_named("testsuite") {
        flatten_suite(child, &mut suites);
    }

    Ok(Report {
        name: root.attr("name").map(str::to_string),
        suites,
    })
}

fn decode_testsuite(root: &Element) -> Result<Report, String> {
    if root.name != "testsuite" {
        return Err(format!("expected root <testsuite>, found <{}>", root.name));
    }

    let mut suites = Vec::new();
    flatten_suite(root, &mut suites);

    Ok(Report {
        name: root.attr("name").map(str::to_string),
        suites,
    })
}

/// Push `element` and every nested `<testsuite>` below it, in document order.
fn flatten_suite(element: &Element, out: &mut Vec<Suite>) {
    out.push(Suite {
        name: element.attr("name").unwrap_or_default().to_string(),
        hostname: element.attr("hostname").unwrap_or_default().to_string(),
        timestamp: element
            .attr("timestamp")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        time: parse_seconds(element.attr("time")),
        tests: parse_count(element.attr("tests")),
        failures: parse_count(element.attr("failures")),
        errors: parse_count(element.attr("errors")),
        skipped: parse_count(element.attr("skipped").or_else(|| element.attr("disabled"))),
        cases: element.children_named("testcase").map(decode_case).collect(),
    });

    for nested in element.children_named("testsuite") {
        flatten_suite(nested, out);
    }
}

fn decode_case(element: &Element) -> Case {
    Case {
        name: element.attr("name").unwrap_or_default().to_string(),
        classname: element.attr("classname").unwrap_or_default().to_string(),
        time: parse_seconds(element.attr("time")),
        failure: element.children_named("failure").next().map(decode_fault),
        error: element.children_named("error").next().map(decode_fault),
        skipped: element.children_named("skipped").next().map(|s| Skip {
            message: non_empty(s.attr("message")),
        }),
    }
}

fn decode_fault(element: &Element) -> Fault {
    Fault {
        message: non_empty(element.attr("message")),
        kind: non_empty(element.attr("type")),
        details: non_empty(Some(element.text.as_str())),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a `time` attribute as decimal seconds. Missing or invalid values are 0.
pub fn parse_seconds(raw: Option<&str>) -> f64 {
    raw.and_then(|r| r.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

fn parse_count(raw: Option<&str>) -> u32 {
    raw.and_then(|r| r.trim().parse::<u32>().ok()).unwrap_or(0)
}

// ============================================================================
// Element tree
// ============================================================================

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| format!("bad attribute on <{}>: {}", name, e))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| format!("bad attribute value on <{}>: {}", name, e))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Element {
            name,
            attrs,
            ..Default::default()
        })
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Read the whole document into a tree, checking well-formedness.
fn parse_tree(bytes: &[u8]) -> Result<Element, String> {
    let xml = std::str::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {}", e))?;
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);

    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("syntax error at byte {}: {}", reader.error_position(), e))?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err("content after the root element".to_string());
                }
                stack.push(Element::from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                // quick-xml has already matched the end tag against its start.
                let element = stack
                    .pop()
                    .ok_or_else(|| "closing tag without an opening tag".to_string())?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| format!("bad text content: {}", e))?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err("text outside the root element".to_string()),
                }
            }
            Event::CData(data) => {
                let data = data.into_inner();
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&String::from_utf8_lossy(&data)),
                    None => return Err("CDATA outside the root element".to_string()),
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unexpected end of document inside <{}>", open.name));
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err("more than one root element".to_string()),
    }
}
