use quick_xml::events::Event;
use quick_xml::Reader;
use roxmltree::{Document, Node};
use serde_json::{Map, Value};

use super::xsd::XmlSchemaValidator;
use crate::error::{AggregatedFailure, ErrorCode, ValidationError};

/// Deepest element nesting a request body may have.
pub const MAX_ELEMENT_DEPTH: usize = 256;

/// Parses `body` as XML, validates it and converts it to a generic tree.
///
/// Parse errors are reported on their own and never mixed with schema errors.
pub(crate) fn validate(
    validator: &dyn XmlSchemaValidator,
    body: &[u8],
) -> Result<Value, AggregatedFailure> {
    let text = std::str::from_utf8(body).map_err(|err| {
        AggregatedFailure::single(
            ValidationError::sentence(format!("invalid UTF-8 in document: {err}"), ErrorCode::XmlParse)
                .at_line(line_at(body, err.valid_up_to())),
        )
    })?;

    check_depth(text).map_err(AggregatedFailure::single)?;

    let document = Document::parse(text).map_err(|err| {
        AggregatedFailure::single(
            ValidationError::sentence(err.to_string(), ErrorCode::XmlParse).at_line(err.pos().row),
        )
    })?;

    let errors: Vec<ValidationError> = validator
        .validate(&document)
        .into_iter()
        .map(|issue| ValidationError::normalized(&issue.message, ErrorCode::XmlSchema).at_line(issue.line))
        .collect();
    if let Some(failure) = AggregatedFailure::new(errors) {
        return Err(failure);
    }

    Ok(xml_to_value(&document))
}

/// Rejects documents nested deeper than [`MAX_ELEMENT_DEPTH`].
///
/// Runs on a streaming reader before the tree parser sees the text. Syntax
/// errors end the scan and are left to the tree parser to report.
fn check_depth(text: &str) -> Result<(), ValidationError> {
    let mut reader = Reader::from_str(text);
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                depth += 1;
                if depth > MAX_ELEMENT_DEPTH {
                    let position = usize::try_from(reader.buffer_position()).unwrap_or(text.len());
                    return Err(ValidationError::sentence(
                        format!("element nesting exceeds {MAX_ELEMENT_DEPTH} levels"),
                        ErrorCode::XmlParse,
                    )
                    .at_line(line_at(text.as_bytes(), position)));
                }
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) | Err(_) => return Ok(()),
            Ok(_) => {}
        }
    }
}

/// One-based line of byte offset `position`.
fn line_at(bytes: &[u8], position: usize) -> u32 {
    let end = position.min(bytes.len());
    let line = bytes[..end].iter().filter(|b| **b == b'\n').count() + 1;
    u32::try_from(line).unwrap_or(u32::MAX)
}

/// Converts a document into an attribute-less tree.
///
/// The root element is dropped. Elements with children become objects,
/// repeated child names become arrays, leaves become strings and empty
/// leaves become null. The walk keeps its own stack, so nesting depth is
/// bounded by memory only.
///
/// # Examples
///
/// ```
/// use contract_core::payload::xml_to_value;
/// use serde_json::json;
///
/// let doc = roxmltree::Document::parse(
///     r#"<order id="9"><tag>a</tag><tag>b</tag><note/></order>"#,
/// ).unwrap();
/// assert_eq!(xml_to_value(&doc), json!({"tag": ["a", "b"], "note": null}));
/// ```
pub fn xml_to_value(document: &Document<'_>) -> Value {
    let root = document.root_element();
    let Some(first) = root.first_element_child() else {
        return leaf_value(root);
    };

    let mut stack = vec![Frame::open(root, first)];
    let mut finished = Value::Null;
    while let Some(frame) = stack.last_mut() {
        if let Some(child) = frame.next.take() {
            frame.next = child.next_sibling_element();
            match child.first_element_child() {
                Some(grandchild) => stack.push(Frame::open(child, grandchild)),
                None => insert_child(&mut frame.object, child, leaf_value(child)),
            }
        } else if let Some(done) = stack.pop() {
            let value = Value::Object(done.object);
            match stack.last_mut() {
                Some(parent) => insert_child(&mut parent.object, done.node, value),
                None => finished = value,
            }
        }
    }
    finished
}

/// An element whose children are still being converted.
struct Frame<'a, 'input> {
    node: Node<'a, 'input>,
    next: Option<Node<'a, 'input>>,
    object: Map<String, Value>,
}

impl<'a, 'input> Frame<'a, 'input> {
    fn open(node: Node<'a, 'input>, first: Node<'a, 'input>) -> Self {
        Self {
            node,
            next: Some(first),
            object: Map::new(),
        }
    }
}

fn leaf_value(node: Node<'_, '_>) -> Value {
    let text: String = node
        .children()
        .filter(Node::is_text)
        .filter_map(|child| child.text())
        .collect();
    let text = text.trim();
    if text.is_empty() {
        Value::Null
    } else {
        Value::String(text.to_string())
    }
}

fn insert_child(object: &mut Map<String, Value>, child: Node<'_, '_>, value: Value) {
    let name = child.tag_name().name();
    match object.get_mut(name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            object.insert(name.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::xsd::XmlIssue;
    use serde_json::json;

    struct AcceptAll;

    impl XmlSchemaValidator for AcceptAll {
        fn validate(&self, _document: &Document<'_>) -> Vec<XmlIssue> {
            Vec::new()
        }
    }

    struct RejectRoot;

    impl XmlSchemaValidator for RejectRoot {
        fn validate(&self, document: &Document<'_>) -> Vec<XmlIssue> {
            vec![XmlIssue {
                line: 1,
                message: format!("ELEMENT '{}': NOT ALLOWED ", document.root_element().tag_name().name()),
            }]
        }
    }

    #[test]
    fn parse_error_carries_line() {
        let failure = validate(&AcceptAll, b"<item>\n<id>1</id>\n</itm>").unwrap_err();
        assert_eq!(failure.len(), 1);
        let error = &failure.errors()[0];
        assert_eq!(error.code(), ErrorCode::XmlParse);
        assert_eq!(error.line(), Some(3));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let failure = validate(&AcceptAll, b"<a>\n\xff</a>").unwrap_err();
        assert_eq!(failure.errors()[0].code(), ErrorCode::XmlParse);
        assert_eq!(failure.errors()[0].line(), Some(2));
    }

    #[test]
    fn schema_messages_are_normalized() {
        let failure = validate(&RejectRoot, b"<item/>").unwrap_err();
        let error = &failure.errors()[0];
        assert_eq!(error.code(), ErrorCode::XmlSchema);
        assert_eq!(error.message(), "Element 'item': not allowed");
        assert_eq!(error.line(), Some(1));
    }

    #[test]
    fn nested_structure_is_converted() {
        let value = validate(
            &AcceptAll,
            b"<order><customer><name>Ann</name></customer><line><sku>a</sku></line><line><sku>b</sku></line><line><sku>c</sku></line></order>",
        )
        .unwrap();
        assert_eq!(
            value,
            json!({
                "customer": {"name": "Ann"},
                "line": [{"sku": "a"}, {"sku": "b"}, {"sku": "c"}]
            })
        );
    }

    #[test]
    fn deep_nesting_is_rejected_before_parsing() {
        let depth = 3000;
        let body = format!(
            "<item>\n{}{}</item>",
            "<a>".repeat(depth),
            "</a>".repeat(depth)
        );
        let failure = validate(&AcceptAll, body.as_bytes()).unwrap_err();
        assert_eq!(failure.len(), 1);
        let error = &failure.errors()[0];
        assert_eq!(error.code(), ErrorCode::XmlParse);
        assert_eq!(error.line(), Some(2));
        assert!(error.message().contains("256"), "{}", error.message());
    }

    #[test]
    fn nesting_at_the_limit_is_converted() {
        let depth = MAX_ELEMENT_DEPTH - 1;
        let body = format!("<item>{}x{}</item>", "<a>".repeat(depth), "</a>".repeat(depth));
        let mut value = validate(&AcceptAll, body.as_bytes()).unwrap();
        for _ in 1..depth {
            value = value["a"].take();
        }
        assert_eq!(value, json!({"a": "x"}));
    }

    #[test]
    fn sibling_order_survives_the_walk() {
        let value = validate(&AcceptAll, b"<r><a><b>1</b></a><c/><a><b>2</b></a></r>").unwrap();
        assert_eq!(value, json!({"a": [{"b": "1"}, {"b": "2"}], "c": null}));
    }

    #[test]
    fn leaf_root_yields_its_text() {
        let value = validate(&AcceptAll, b"<count> 3 </count>").unwrap();
        assert_eq!(value, json!("3"));
    }
}
