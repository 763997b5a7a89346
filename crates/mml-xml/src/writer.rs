use crate::tree::{NodeId, NodeKind, XmlDocument};

const INDENT: &str = "  ";

pub fn write_document(document: &XmlDocument) -> String {
    document
        .children(document.document_node())
        .iter()
        .map(|child| write_node(document, *child))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_node(document: &XmlDocument, id: NodeId) -> String {
    let mut out = String::new();
    write_into(document, id, 0, false, &mut out);
    out
}

fn write_into(document: &XmlDocument, id: NodeId, depth: usize, inline: bool, out: &mut String) {
    let indent = if inline {
        String::new()
    } else {
        INDENT.repeat(depth)
    };

    match document.kind(id) {
        NodeKind::Document => {
            for child in document.children(id) {
                write_into(document, *child, depth, inline, out);
            }
        }
        NodeKind::Text(text) => out.push_str(&escape_text(text)),
        NodeKind::Comment(text) => {
            out.push_str(&indent);
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::Element(element) => {
            out.push_str(&indent);
            out.push('<');
            out.push_str(&element.name);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(value));
                out.push('"');
            }

            let children = document.children(id);
            if children.is_empty() {
                out.push_str(" />");
                return;
            }
            out.push('>');

            // Any text child switches the whole element to inline output.
            let mixed = inline
                || children
                    .iter()
                    .any(|child| matches!(document.kind(*child), NodeKind::Text(_)));
            if mixed {
                for child in children {
                    write_into(document, *child, 0, true, out);
                }
            } else {
                for child in children {
                    out.push('\n');
                    write_into(document, *child, depth + 1, false, out);
                }
                out.push('\n');
                out.push_str(&indent);
            }

            out.push_str("</");
            out.push_str(&element.name);
            out.push('>');
        }
    }
}

fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("&#xA;"),
            '\r' => escaped.push_str("&#xD;"),
            '\t' => escaped.push_str("&#x9;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod writer_tests {
    use super::*;
    use crate::xml::parse_xml_document;

    #[test]
    fn nested_elements_are_indented() {
        let document = parse_xml_document(
            r#"<Truck name="t"><Wheels><Wheel size="1"/><Wheel size="2"></Wheel></Wheels><!--end--></Truck>"#,
        )
        .expect("xml should parse");
        assert_eq!(
            write_document(&document),
            "<Truck name=\"t\">\n  <Wheels>\n    <Wheel size=\"1\" />\n    <Wheel size=\"2\" />\n  </Wheels>\n  <!--end-->\n</Truck>"
        );
    }

    #[test]
    fn text_content_is_written_inline() {
        let document =
            parse_xml_document("<root><name>A &amp; B</name><mixed>x<b>y</b></mixed></root>")
                .expect("xml should parse");
        assert_eq!(
            write_document(&document),
            "<root>\n  <name>A &amp; B</name>\n  <mixed>x<b>y</b></mixed>\n</root>"
        );
    }

    #[test]
    fn attribute_values_are_escaped() {
        let mut document = XmlDocument::new("root").expect("document");
        let root = document.root_element();
        document
            .set_attribute(root, "v", "a\"<b>&\n")
            .expect("set attribute");
        assert_eq!(
            write_node(&document, root),
            "<root v=\"a&quot;&lt;b&gt;&amp;&#xA;\" />"
        );
    }

    #[test]
    fn written_output_parses_back_to_same_tree() {
        let source = r#"<a x="1"><b><c y="&quot;"/></b><d>text</d></a>"#;
        let document = parse_xml_document(source).expect("xml should parse");
        let reparsed = parse_xml_document(&write_document(&document)).expect("output should parse");
        assert_eq!(write_document(&reparsed), write_document(&document));
    }
}
