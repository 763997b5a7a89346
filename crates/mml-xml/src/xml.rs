use mml_core::MmlError;
use roxmltree::{Document, Node, NodeType, NS_XML_URI};

use crate::tree::{NodeId, XmlDocument};

pub fn parse_xml_document(source: &str) -> Result<XmlDocument, MmlError> {
    let document = Document::parse(source)
        .map_err(|error| MmlError::new("XML_PARSE_ERROR", error.to_string()))?;

    let Some(root) = document.root().children().find(|node| node.is_element()) else {
        return Err(MmlError::new(
            "XML_PARSE_ERROR",
            "XML document must contain a root element.",
        ));
    };

    let mut parsed = XmlDocument::new(&element_name(root))?;
    let parsed_root = parsed.root_element();
    copy_element(&mut parsed, parsed_root, root)?;
    Ok(parsed)
}

fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

// roxmltree resolves prefixes to URIs; map them back through the in-scope declarations.
fn prefix_for(node: Node<'_, '_>, uri: &str, allow_default: bool) -> Option<String> {
    if uri == NS_XML_URI {
        return Some("xml".to_string());
    }
    node.namespaces()
        .filter(|namespace| namespace.uri() == uri)
        .find(|namespace| allow_default || namespace.name().is_some())
        .and_then(|namespace| namespace.name())
        .map(str::to_string)
}

fn element_name(node: Node<'_, '_>) -> String {
    let tag = node.tag_name();
    let prefix = tag
        .namespace()
        .and_then(|uri| prefix_for(node, uri, true));
    qualify(prefix.as_deref(), tag.name())
}

// Only declarations that are new on this element; inherited ones are already written on an ancestor.
fn declared_namespaces(node: Node<'_, '_>) -> Vec<(String, String)> {
    let inherited = node.parent_element();
    node.namespaces()
        .filter(|namespace| namespace.uri() != NS_XML_URI)
        .filter(|namespace| {
            !inherited.is_some_and(|parent| {
                parent.namespaces().any(|outer| {
                    outer.name() == namespace.name() && outer.uri() == namespace.uri()
                })
            })
        })
        .map(|namespace| {
            let name = match namespace.name() {
                Some(prefix) => format!("xmlns:{}", prefix),
                None => "xmlns".to_string(),
            };
            (name, namespace.uri().to_string())
        })
        .collect()
}

fn copy_element(target: &mut XmlDocument, element: NodeId, node: Node<'_, '_>) -> Result<(), MmlError> {
    for (name, uri) in declared_namespaces(node) {
        target.set_attribute(element, &name, &uri)?;
    }
    for attribute in node.attributes() {
        let prefix = attribute
            .namespace()
            .and_then(|uri| prefix_for(node, uri, false));
        target.set_attribute(
            element,
            &qualify(prefix.as_deref(), attribute.name()),
            attribute.value(),
        )?;
    }

    for child in node.children() {
        match child.node_type() {
            NodeType::Element => {
                let id = target.append_element(element, &element_name(child))?;
                copy_element(target, id, child)?;
            }
            NodeType::Text => {
                let value = child.text().unwrap_or_default();
                if value.trim().is_empty() {
                    continue;
                }
                target.append_text(element, value);
            }
            NodeType::Comment => {
                target.append_comment(element, child.text().unwrap_or_default());
            }
            _ => {}
        }
    }

    Ok(())
}
