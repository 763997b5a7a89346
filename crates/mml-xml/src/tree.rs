use indexmap::IndexMap;
use mml_core::MmlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub name: String,
    pub attributes: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

// Arena-backed tree. Detached nodes stay in the arena but are unreachable from the document node.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    nodes: Vec<NodeData>,
    root: NodeId,
}

pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == ':')
        && chars.all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | ':' | '-' | '.'))
}

fn check_name(name: &str) -> Result<(), MmlError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(MmlError::new(
            "XML_INVALID_NAME",
            format!("\"{}\" is not a valid XML name", name),
        ))
    }
}

impl XmlDocument {
    pub fn new(root_name: &str) -> Result<Self, MmlError> {
        check_name(root_name)?;
        let mut document = Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        };
        let root = document.push_child(document.document_node(), NodeKind::Element(ElementData {
            name: root_name.to_string(),
            attributes: IndexMap::new(),
        }));
        document.root = root;
        Ok(document)
    }

    pub fn document_node(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_element(&self) -> NodeId {
        self.root
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn push_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.data(id).kind
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element(_))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.is_element(*child))
    }

    // 1-based, like the XPath `name[n]` predicate on the child axis.
    pub fn nth_child_element(&self, parent: NodeId, name: &str, n: usize) -> Option<NodeId> {
        if n == 0 {
            return None;
        }
        self.element_children(parent)
            .filter(|child| self.name(*child) == Some(name))
            .nth(n - 1)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|element| element.attributes.get(name))
            .map(String::as_str)
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), MmlError> {
        check_name(name)?;
        if let Some(element) = self.element_mut(id) {
            match element.attributes.get_mut(name) {
                Some(existing) => *existing = value.to_string(),
                None => {
                    element
                        .attributes
                        .insert(name.to_string(), value.to_string());
                }
            }
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        self.element_mut(id)
            .and_then(|element| element.attributes.shift_remove(name))
            .is_some()
    }

    pub fn append_element(&mut self, parent: NodeId, name: &str) -> Result<NodeId, MmlError> {
        check_name(name)?;
        Ok(self.push_child(
            parent,
            NodeKind::Element(ElementData {
                name: name.to_string(),
                attributes: IndexMap::new(),
            }),
        ))
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_child(parent, NodeKind::Text(text.to_string()))
    }

    pub fn append_comment(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_child(parent, NodeKind::Comment(text.to_string()))
    }

    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return false;
        };
        self.nodes[parent.0].children.retain(|child| *child != id);
        true
    }

    // Pre-order, starting with `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut ordered = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            ordered.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        ordered
    }

    pub fn string_value(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Text(text) | NodeKind::Comment(text) => text.clone(),
            NodeKind::Document | NodeKind::Element(_) => self
                .descendants(id)
                .into_iter()
                .filter_map(|node| match self.kind(node) {
                    NodeKind::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}
