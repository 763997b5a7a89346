use std::sync::OnceLock;

use mml_core::MmlError;
use mml_parser::{IdentifierRef, Literal, Node, Script};
use mml_xml::{select_elements, select_first_element, NodeId, XmlDocument};
use regex::Regex;
use tracing::debug;

use crate::context::{Callable, Context};

fn template_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("template regex must compile"))
}

fn cursor_missing(directive: &str) -> String {
    format!("'{}' is only allowed inside 'file'/'change'/'add'", directive)
}

impl Context {
    pub fn evaluate(&mut self, script: &Script) -> Result<(), MmlError> {
        self.eval_block(&script.body)
    }

    pub(crate) fn eval_block(&mut self, body: &[Node]) -> Result<(), MmlError> {
        for node in body {
            self.eval_action(node)?;
        }
        Ok(())
    }

    pub(crate) fn eval_text(&mut self, node: &Node) -> Result<String, MmlError> {
        Ok(self.eval_value(node)?.unwrap_or_default())
    }

    pub fn eval_value(&mut self, node: &Node) -> Result<Option<String>, MmlError> {
        match node {
            Node::Literal(literal) => self.eval_literal(literal).map(Some),
            Node::IdentifierRef(reference) => self.eval_identifier(reference).map(Some),
            action => {
                self.eval_action(action)?;
                Ok(None)
            }
        }
    }

    pub fn eval_action(&mut self, node: &Node) -> Result<(), MmlError> {
        match node {
            Node::Literal(_) | Node::IdentifierRef(_) => {
                self.eval_value(node)?;
            }
            Node::Block(body) => self.eval_block(body)?,
            Node::ConstDecl { name, value } => {
                let value = self.eval_text(value)?;
                self.set_const(name, &value)?;
            }
            Node::PresetDecl(decl) => {
                debug!(preset = %decl.name, params = ?decl.params, "preset defined");
                self.set_func(&decl.name, Callable::Preset(decl.clone()))?;
            }
            Node::PresetUse { name, args } => self.eval_use(name, args)?,
            Node::Include { name } => self.include(name)?,
            Node::FileBlock { path, body } => self.eval_file(path, body)?,
            Node::SetAttribute { name, value } => self.eval_set_attribute(name, value)?,
            Node::RemoveAttribute { name } => self.eval_remove_attribute(name)?,
            Node::RemoveElement { selector } => self.eval_remove(selector, false)?,
            Node::RemoveAllElements { selector } => self.eval_remove(selector, true)?,
            Node::AddElement {
                tag,
                position,
                body,
            } => self.eval_add(tag, position.as_deref(), body)?,
            Node::ChangeElement { selector, body } => self.eval_change(selector, body)?,
            Node::ChangeAllElements { selector, body } => self.eval_change_all(selector, body)?,
            Node::ChangeOrAddElement {
                tag,
                position,
                body,
            } => self.eval_change_or_add(tag, position.as_deref(), body)?,
        }
        Ok(())
    }

    fn eval_literal(&mut self, literal: &Literal) -> Result<String, MmlError> {
        let Literal::String(text) = literal else {
            return Ok(literal.render());
        };

        let mut value = text.clone();
        for captures in template_regex().captures_iter(text) {
            let name = &captures[1];
            let Some(replacement) = self.get_const(name) else {
                return Err(MmlError::new(
                    "EVAL_TEMPLATE_UNRESOLVED",
                    format!("Const '{}' value is null", name),
                ));
            };
            value = value.replace(&captures[0], replacement);
        }
        Ok(value)
    }

    // Unbound names evaluate to their own text.
    fn eval_identifier(&mut self, reference: &IdentifierRef) -> Result<String, MmlError> {
        let name = reference.name.as_str();
        let mut value = self.get_const(name).unwrap_or(name).to_string();
        if let Some(args) = &reference.args {
            value = self
                .call_func(name, args)?
                .unwrap_or_else(|| name.to_string());
        }
        if reference.negative {
            value.insert(0, '-');
        }
        Ok(value)
    }

    fn eval_position(&mut self, node: &Node) -> Result<i64, MmlError> {
        if let Node::Literal(Literal::Integer(value)) = node {
            return Ok(*value);
        }
        let text = self.eval_text(node)?;
        text.trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(|value| value.trunc() as i64)
            .ok_or_else(|| {
                MmlError::new("EVAL_INVALID_POSITION", format!("Invalid index '{}'", text))
            })
    }

    fn cursor(&mut self, directive: &str) -> Option<NodeId> {
        let element = self.element();
        if element.is_none() {
            self.diagnose("CURSOR_MISSING", cursor_missing(directive));
        }
        element
    }

    fn select_one(&self, element: NodeId, selector: &str) -> Result<Option<NodeId>, MmlError> {
        match self.document() {
            Some(document) => select_first_element(document, element, selector),
            None => Ok(None),
        }
    }

    fn select_all(&self, element: NodeId, selector: &str) -> Result<Vec<NodeId>, MmlError> {
        match self.document() {
            Some(document) => select_elements(document, element, selector),
            None => Ok(Vec::new()),
        }
    }

    fn nth_child(&self, element: NodeId, tag: &str, n: i64) -> Option<NodeId> {
        let n = usize::try_from(n).ok()?;
        self.document()
            .and_then(|document| document.nth_child_element(element, tag, n))
    }

    fn with_document<T>(
        &mut self,
        apply: impl FnOnce(&mut XmlDocument) -> Result<T, MmlError>,
    ) -> Result<Option<T>, MmlError> {
        match self.document_mut() {
            Some(document) => apply(document).map(Some),
            None => Ok(None),
        }
    }

    fn eval_use(&mut self, name: &str, args: &[Node]) -> Result<(), MmlError> {
        if self.lookup_func(name).is_none() {
            self.diagnose("PRESET_NOT_FOUND", format!("Preset '{}' is not defined", name));
            return Ok(());
        }
        debug!(preset = name, "use preset");
        let mut call_args = args.to_vec();
        call_args.push(Node::string(self.sentinel()));
        self.call_func(name, &call_args)?;
        Ok(())
    }

    fn eval_file(&mut self, path: &Node, body: &[Node]) -> Result<(), MmlError> {
        if self.has_document() {
            self.diagnose("FILE_NESTED", "'file' cannot be nested inside another 'file'");
            return Ok(());
        }

        let path = self.eval_text(path)?;
        debug!(path = %path, "open file");
        let store = self.options().store.clone();
        let Some(document) = store.load(&path)? else {
            self.diagnose("FILE_NOT_FOUND", format!("File '{}' not found", path));
            return Ok(());
        };

        let mut file = self.enter_document(document);
        file.eval_block(body)?;
        if let Some(document) = file.into_document() {
            store.persist(&path, &document)?;
        }
        Ok(())
    }

    fn eval_set_attribute(&mut self, name: &Node, value: &Node) -> Result<(), MmlError> {
        let Some(element) = self.cursor("set") else {
            return Ok(());
        };
        let name = self.eval_text(name)?;
        let value = self.eval_text(value)?;
        debug!(attribute = %name, value = %value, "set attribute");
        self.with_document(|document| document.set_attribute(element, &name, &value))?;
        Ok(())
    }

    fn eval_remove_attribute(&mut self, name: &Node) -> Result<(), MmlError> {
        let Some(element) = self.cursor("remove") else {
            return Ok(());
        };
        let name = self.eval_text(name)?;
        debug!(attribute = %name, "remove attribute");
        self.with_document(|document| Ok(document.remove_attribute(element, &name)))?;
        Ok(())
    }

    fn eval_remove(&mut self, selector: &Node, all: bool) -> Result<(), MmlError> {
        let Some(element) = self.cursor("remove") else {
            return Ok(());
        };
        let selector = self.eval_text(selector)?;
        debug!(selector = %selector, all, "remove elements");

        let targets = if all {
            self.select_all(element, &selector)?
        } else {
            self.select_one(element, &selector)?.into_iter().collect()
        };
        if targets.is_empty() {
            let subject = if all { "Elements" } else { "Element" };
            self.diagnose(
                "ELEMENT_NOT_FOUND",
                format!("{} with selector '{}' not found", subject, selector),
            );
            return Ok(());
        }

        self.with_document(|document| {
            for target in targets {
                document.detach(target);
            }
            Ok(())
        })?;
        Ok(())
    }

    fn eval_add(&mut self, tag: &Node, position: Option<&Node>, body: &[Node]) -> Result<(), MmlError> {
        let Some(element) = self.cursor("add") else {
            return Ok(());
        };
        let tag = self.eval_text(tag)?;

        if let Some(position) = position {
            let n = self.eval_position(position)?;
            debug!(tag = %tag, position = n, "add element");
            let skip = n < 1
                || (n > 1 && self.nth_child(element, &tag, n - 1).is_none())
                || self.nth_child(element, &tag, n).is_some();
            if skip {
                debug!(tag = %tag, position = n, "add skipped");
                return Ok(());
            }
        } else {
            debug!(tag = %tag, "add element");
        }

        let Some(added) = self.with_document(|document| document.append_element(element, &tag))? else {
            return Ok(());
        };
        self.enter_element(added).eval_block(body)
    }

    fn eval_change(&mut self, selector: &Node, body: &[Node]) -> Result<(), MmlError> {
        let Some(element) = self.cursor("change") else {
            return Ok(());
        };
        let selector = self.eval_text(selector)?;
        debug!(selector = %selector, "change element");
        let Some(target) = self.select_one(element, &selector)? else {
            self.diagnose(
                "ELEMENT_NOT_FOUND",
                format!("Element with selector '{}' not found", selector),
            );
            return Ok(());
        };
        self.enter_element(target).eval_block(body)
    }

    fn eval_change_all(&mut self, selector: &Node, body: &[Node]) -> Result<(), MmlError> {
        let Some(element) = self.cursor("all") else {
            return Ok(());
        };
        let selector = self.eval_text(selector)?;
        debug!(selector = %selector, "change all elements");
        let targets = self.select_all(element, &selector)?;
        if targets.is_empty() {
            self.diagnose(
                "ELEMENT_NOT_FOUND",
                format!("Elements with selector '{}' not found", selector),
            );
            return Ok(());
        }
        for target in targets {
            self.enter_element(target).eval_block(body)?;
        }
        Ok(())
    }

    fn eval_change_or_add(
        &mut self,
        tag: &Node,
        position: Option<&Node>,
        body: &[Node],
    ) -> Result<(), MmlError> {
        let Some(element) = self.cursor("change_add") else {
            return Ok(());
        };
        let tag = self.eval_text(tag)?;
        let n = match position {
            Some(position) => self.eval_position(position)?,
            None => 1,
        };
        debug!(tag = %tag, position = n, "change or add element");

        if n < 1 {
            return Err(MmlError::new(
                "EVAL_INVALID_POSITION",
                format!("Invalid index '{}'", n),
            ));
        }
        if n > 1 && self.nth_child(element, &tag, n - 1).is_none() {
            self.diagnose(
                "PREDECESSOR_MISSING",
                format!("Previous element '{}' not found", tag),
            );
            return Ok(());
        }

        let target = match self.nth_child(element, &tag, n) {
            Some(existing) => Some(existing),
            None => self.with_document(|document| document.append_element(element, &tag))?,
        };
        match target {
            Some(target) => self.enter_element(target).eval_block(body),
            None => Ok(()),
        }
    }
}
