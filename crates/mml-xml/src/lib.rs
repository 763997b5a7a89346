pub mod tree;
pub mod writer;
pub mod xml;
pub mod xpath;

pub use tree::{is_valid_name, ElementData, NodeId, NodeKind, XmlDocument};
pub use writer::{write_document, write_node};
pub use xml::parse_xml_document;
pub use xpath::{evaluate_string, select_elements, select_first_element};
