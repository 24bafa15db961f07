//! XML Schema validation.
//!
//! [`XmlSchemaValidator`] is the seam for plugging in a full XSD engine.
//! [`XsdSchema`] is the built-in implementation of the structural subset most
//! API payload schemas use:
//!
//! - global `xs:element` declarations (the document root must match one)
//! - anonymous and named `xs:complexType` with `xs:sequence`, `xs:all` or `xs:choice`
//! - `minOccurs` / `maxOccurs` (including `unbounded`)
//! - built-in simple types: string, integer/int/long/short, decimal/double/float,
//!   boolean, date, dateTime (`xs:simpleType` restrictions use their base type)
//!
//! Attributes are ignored. Unsupported constructs are rejected when the
//! schema is compiled, not when a request arrives.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate};
use roxmltree::{Document, Node};

/// Nesting limit for named type references, guards against recursive types.
const MAX_TYPE_DEPTH: usize = 32;

/// A schema violation with the line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlIssue {
    /// 1-based source line.
    pub line: u32,
    /// Diagnostic.
    pub message: String,
}

/// Validates a parsed XML document against a schema.
pub trait XmlSchemaValidator: Send + Sync {
    /// Returns every violation found; empty means valid.
    fn validate(&self, document: &Document<'_>) -> Vec<XmlIssue>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimpleType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
}

impl SimpleType {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" | "normalizedString" | "token" | "anyURI" | "ID" | "NMTOKEN" => {
                Some(SimpleType::String)
            }
            "integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
            | "positiveInteger" | "unsignedInt" | "unsignedLong" => Some(SimpleType::Integer),
            "decimal" | "double" | "float" => Some(SimpleType::Decimal),
            "boolean" => Some(SimpleType::Boolean),
            "date" => Some(SimpleType::Date),
            "dateTime" => Some(SimpleType::DateTime),
            _ => None,
        }
    }

    fn xs_name(self) -> &'static str {
        match self {
            SimpleType::String => "xs:string",
            SimpleType::Integer => "xs:integer",
            SimpleType::Decimal => "xs:decimal",
            SimpleType::Boolean => "xs:boolean",
            SimpleType::Date => "xs:date",
            SimpleType::DateTime => "xs:dateTime",
        }
    }

    fn accepts(self, text: &str) -> bool {
        match self {
            SimpleType::String => true,
            SimpleType::Integer => text.parse::<i64>().is_ok(),
            SimpleType::Decimal => text.parse::<f64>().is_ok_and(f64::is_finite),
            SimpleType::Boolean => matches!(text, "true" | "false" | "1" | "0"),
            SimpleType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok(),
            SimpleType::DateTime => DateTime::parse_from_rfc3339(text).is_ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compositor {
    Sequence,
    All,
    Choice,
}

#[derive(Debug, Clone)]
enum Content {
    Simple(SimpleType),
    Complex {
        compositor: Compositor,
        children: Vec<ElementDecl>,
    },
    Any,
}

#[derive(Debug, Clone)]
struct ElementDecl {
    name: String,
    min_occurs: u32,
    // None means unbounded.
    max_occurs: Option<u32>,
    content: Content,
}

/// A compiled schema for the supported XSD subset.
///
/// # Examples
///
/// ```
/// use contract_core::payload::{XmlSchemaValidator, XsdSchema};
///
/// let schema = XsdSchema::parse(r#"
///   <xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
///     <xs:element name="item">
///       <xs:complexType>
///         <xs:sequence>
///           <xs:element name="id" type="xs:integer"/>
///         </xs:sequence>
///       </xs:complexType>
///     </xs:element>
///   </xs:schema>"#).unwrap();
///
/// let doc = roxmltree::Document::parse("<item><id>x</id></item>").unwrap();
/// assert_eq!(schema.validate(&doc).len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct XsdSchema {
    roots: Vec<ElementDecl>,
}

impl XsdSchema {
    /// Compiles an XSD document.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic when the text is not XML, not a schema, or uses a
    /// construct outside the supported subset.
    pub fn parse(text: &str) -> Result<Self, String> {
        let doc = Document::parse(text).map_err(|err| err.to_string())?;
        let root = doc.root_element();
        if root.tag_name().name() != "schema" {
            return Err(format!(
                "expected a schema root element, found '{}'",
                root.tag_name().name()
            ));
        }

        let named: HashMap<&str, Node<'_, '_>> = root
            .children()
            .filter(|node| node.is_element())
            .filter(|node| matches!(node.tag_name().name(), "complexType" | "simpleType"))
            .filter_map(|node| node.attribute("name").map(|name| (name, node)))
            .collect();

        let compiler = Compiler { named };
        let roots = root
            .children()
            .filter(|node| node.is_element() && node.tag_name().name() == "element")
            .map(|node| compiler.element(node, 0))
            .collect::<Result<Vec<_>, _>>()?;

        if roots.is_empty() {
            return Err("schema declares no global element".to_string());
        }
        Ok(Self { roots })
    }
}

struct Compiler<'a, 'input> {
    named: HashMap<&'a str, Node<'a, 'input>>,
}

impl Compiler<'_, '_> {
    fn element(&self, node: Node<'_, '_>, depth: usize) -> Result<ElementDecl, String> {
        if depth > MAX_TYPE_DEPTH {
            return Err("type definitions nest too deeply".to_string());
        }
        if node.attribute("ref").is_some() {
            return Err("element references are not supported".to_string());
        }
        let name = node
            .attribute("name")
            .ok_or_else(|| "element declaration without a name".to_string())?
            .to_string();
        let min_occurs = match node.attribute("minOccurs") {
            Some(value) => value
                .parse::<u32>()
                .map_err(|_| format!("element '{name}': invalid minOccurs '{value}'"))?,
            None => 1,
        };
        let max_occurs = match node.attribute("maxOccurs") {
            Some("unbounded") => None,
            Some(value) => Some(
                value
                    .parse::<u32>()
                    .map_err(|_| format!("element '{name}': invalid maxOccurs '{value}'"))?,
            ),
            None => Some(1),
        };

        let content = if let Some(type_name) = node.attribute("type") {
            self.named_type(local_name(type_name), depth)
                .map_err(|err| format!("element '{name}': {err}"))?
        } else if let Some(child) = child_element(node, "complexType") {
            self.complex(child, depth)?
        } else if let Some(child) = child_element(node, "simpleType") {
            Content::Simple(simple_base(child)?)
        } else {
            Content::Any
        };

        Ok(ElementDecl {
            name,
            min_occurs,
            max_occurs,
            content,
        })
    }

    fn named_type(&self, type_name: &str, depth: usize) -> Result<Content, String> {
        if let Some(simple) = SimpleType::from_name(type_name) {
            return Ok(Content::Simple(simple));
        }
        if type_name == "anyType" {
            return Ok(Content::Any);
        }
        match self.named.get(type_name) {
            Some(node) if node.tag_name().name() == "complexType" => self.complex(*node, depth + 1),
            Some(node) => Ok(Content::Simple(simple_base(*node)?)),
            None => Err(format!("unknown type '{type_name}'")),
        }
    }

    fn complex(&self, node: Node<'_, '_>, depth: usize) -> Result<Content, String> {
        let mut compositor = Compositor::Sequence;
        let mut children = Vec::new();
        for child in node.children().filter(|child| child.is_element()) {
            compositor = match child.tag_name().name() {
                "sequence" => Compositor::Sequence,
                "all" => Compositor::All,
                "choice" => Compositor::Choice,
                "attribute" | "anyAttribute" | "annotation" => continue,
                other => return Err(format!("unsupported complex type content '{other}'")),
            };
            for item in child.children().filter(|item| item.is_element()) {
                match item.tag_name().name() {
                    "element" => children.push(self.element(item, depth + 1)?),
                    "annotation" => {}
                    other => return Err(format!("nested '{other}' is not supported")),
                }
            }
        }
        Ok(Content::Complex {
            compositor,
            children,
        })
    }
}

fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

fn simple_base(node: Node<'_, '_>) -> Result<SimpleType, String> {
    let base = child_element(node, "restriction")
        .and_then(|restriction| restriction.attribute("base"))
        .ok_or_else(|| "simple type without a restriction base".to_string())?;
    SimpleType::from_name(local_name(base)).ok_or_else(|| format!("unsupported simple type base '{base}'"))
}

impl XmlSchemaValidator for XsdSchema {
    fn validate(&self, document: &Document<'_>) -> Vec<XmlIssue> {
        let mut issues = Vec::new();
        let root = document.root_element();
        let name = root.tag_name().name();
        match self.roots.iter().find(|decl| decl.name == name) {
            Some(decl) => check_element(document, decl, root, &mut issues),
            None => issues.push(issue(
                document,
                root,
                format!("Element '{name}': no matching global declaration available for the validation root"),
            )),
        }
        issues
    }
}

fn issue(document: &Document<'_>, node: Node<'_, '_>, message: String) -> XmlIssue {
    XmlIssue {
        line: document.text_pos_at(node.range().start).row,
        message,
    }
}

fn text_content(node: Node<'_, '_>) -> String {
    node.children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn check_element(
    document: &Document<'_>,
    decl: &ElementDecl,
    node: Node<'_, '_>,
    issues: &mut Vec<XmlIssue>,
) {
    match &decl.content {
        Content::Any => {}
        Content::Simple(simple) => {
            if node.children().any(|child| child.is_element()) {
                issues.push(issue(
                    document,
                    node,
                    format!("Element '{}': element content is not allowed, because the type is a simple type", decl.name),
                ));
                return;
            }
            let text = text_content(node);
            if !simple.accepts(&text) {
                issues.push(issue(
                    document,
                    node,
                    format!(
                        "Element '{}': '{}' is not a valid value of the atomic type '{}'",
                        decl.name,
                        text,
                        simple.xs_name()
                    ),
                ));
            }
        }
        Content::Complex {
            compositor,
            children,
        } => check_children(document, decl, *compositor, children, node, issues),
    }
}

fn check_children(
    document: &Document<'_>,
    decl: &ElementDecl,
    compositor: Compositor,
    declared: &[ElementDecl],
    node: Node<'_, '_>,
    issues: &mut Vec<XmlIssue>,
) {
    if !text_content(node).is_empty() {
        issues.push(issue(
            document,
            node,
            format!(
                "Element '{}': character content other than whitespace is not allowed because the content type is 'element-only'",
                decl.name
            ),
        ));
    }

    let mut counts = vec![0u32; declared.len()];
    let mut last_index = 0;
    for child in node.children().filter(|child| child.is_element()) {
        let name = child.tag_name().name();
        let Some(index) = declared.iter().position(|candidate| candidate.name == name) else {
            issues.push(issue(document, child, format!("Element '{name}': this element is not expected")));
            continue;
        };
        let out_of_order = compositor == Compositor::Sequence && index < last_index;
        let over_limit = declared[index]
            .max_occurs
            .is_some_and(|max| counts[index] >= max);
        if out_of_order || over_limit {
            issues.push(issue(document, child, format!("Element '{name}': this element is not expected")));
            continue;
        }
        last_index = index;
        counts[index] += 1;
        check_element(document, &declared[index], child, issues);
    }

    match compositor {
        Compositor::Choice => {
            let chosen = counts.iter().filter(|count| **count > 0).count();
            let optional = declared.iter().any(|candidate| candidate.min_occurs == 0);
            if chosen > 1 {
                issues.push(issue(
                    document,
                    node,
                    format!("Element '{}': only one of the choice elements is allowed", decl.name),
                ));
            } else if chosen == 0 && !optional && !declared.is_empty() {
                issues.push(missing(document, decl, node, declared.iter().map(|d| d.name.as_str())));
            }
        }
        Compositor::Sequence | Compositor::All => {
            let absent: Vec<&str> = declared
                .iter()
                .zip(&counts)
                .filter(|(candidate, count)| **count < candidate.min_occurs)
                .map(|(candidate, _)| candidate.name.as_str())
                .collect();
            if !absent.is_empty() {
                issues.push(missing(document, decl, node, absent.into_iter()));
            }
        }
    }
}

fn missing<'a>(
    document: &Document<'_>,
    decl: &ElementDecl,
    node: Node<'_, '_>,
    names: impl Iterator<Item = &'a str>,
) -> XmlIssue {
    let expected: Vec<&str> = names.collect();
    issue(
        document,
        node,
        format!(
            "Element '{}': missing child element(s). expected is ( {} )",
            decl.name,
            expected.join(", ")
        ),
    )
}

impl fmt::Display for XmlIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="Tag">
    <xs:sequence>
      <xs:element name="label" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
  <xs:element name="item">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="id" type="xs:integer"/>
        <xs:element name="name" type="xs:string"/>
        <xs:element name="price" type="xs:decimal" minOccurs="0"/>
        <xs:element name="tag" type="Tag" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    fn validate(xml: &str) -> Vec<XmlIssue> {
        let schema = XsdSchema::parse(ITEM_XSD).unwrap();
        let doc = Document::parse(xml).unwrap();
        schema.validate(&doc)
    }

    #[test]
    fn valid_document_passes() {
        let issues = validate(
            "<item><id>1</id><name>Lamp</name><price>9.5</price><tag><label>a</label></tag><tag><label>b</label></tag></item>",
        );
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn wrong_root_is_reported() {
        let issues = validate("<order/>");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("no matching global declaration"));
    }

    #[test]
    fn missing_required_child_is_reported() {
        let issues = validate("<item><id>1</id></item>");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("( name )"));
    }

    #[test]
    fn invalid_simple_value_carries_line() {
        let issues = validate("<item>\n  <id>abc</id>\n  <name>x</name>\n</item>");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 2);
        assert!(issues[0].message.contains("xs:integer"));
    }

    #[test]
    fn unexpected_and_out_of_order_elements_are_reported() {
        let issues = validate("<item><name>x</name><id>1</id><colour>red</colour></item>");
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.starts_with("Element 'id'")));
        assert!(messages.iter().any(|m| m.starts_with("Element 'colour'")));
    }

    #[test]
    fn max_occurs_is_enforced() {
        let issues = validate("<item><id>1</id><id>2</id><name>x</name></item>");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.starts_with("Element 'id'"));
    }

    #[test]
    fn choice_allows_one_alternative() {
        let schema = XsdSchema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="pay"><xs:complexType><xs:choice>
                   <xs:element name="card" type="xs:string"/>
                   <xs:element name="iban" type="xs:string"/>
                 </xs:choice></xs:complexType></xs:element>
               </xs:schema>"#,
        )
        .unwrap();
        let ok = Document::parse("<pay><iban>x</iban></pay>").unwrap();
        assert!(schema.validate(&ok).is_empty());
        let both = Document::parse("<pay><card>1</card><iban>x</iban></pay>").unwrap();
        assert_eq!(schema.validate(&both).len(), 1);
        let none = Document::parse("<pay/>").unwrap();
        assert_eq!(schema.validate(&none).len(), 1);
    }

    #[test]
    fn unsupported_constructs_fail_to_compile() {
        assert!(XsdSchema::parse("<notaschema/>").is_err());
        assert!(XsdSchema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"><xs:element ref="x"/></xs:schema>"#
        )
        .is_err());
        assert!(XsdSchema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"><xs:element name="a" type="Missing"/></xs:schema>"#
        )
        .is_err());
    }

    #[test]
    fn recursive_named_types_are_bounded() {
        let result = XsdSchema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:complexType name="Node"><xs:sequence>
                   <xs:element name="node" type="Node" minOccurs="0"/>
                 </xs:sequence></xs:complexType>
                 <xs:element name="tree" type="Node"/>
               </xs:schema>"#,
        );
        assert!(result.is_err());
    }
}
