use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use mml_core::{Diagnostic, MmlError};
use mml_parser::PresetDecl;
use mml_xml::{NodeId, XmlDocument};
use tracing::{debug, warn};

use crate::driver::RunOptions;
use crate::rng::{make_sentinel, random_seed};

#[derive(Debug, Clone)]
pub enum Callable {
    Get,
    Template(String),
    Preset(Rc<PresetDecl>),
}

#[derive(Debug, Default)]
pub struct Scope {
    consts: HashMap<String, String>,
    funcs: HashMap<String, Callable>,
}

impl Scope {
    fn check_free(&self, name: &str) -> Result<(), MmlError> {
        if self.consts.contains_key(name) || self.funcs.contains_key(name) {
            return Err(MmlError::new(
                "EVAL_DUPLICATE_BINDING",
                format!("Name '{}' is already defined in this scope.", name),
            ));
        }
        Ok(())
    }
}

pub struct Context {
    global: Scope,
    frames: Vec<Scope>,
    document: Option<XmlDocument>,
    cursor: Option<NodeId>,
    sentinel: String,
    diagnostics: Vec<Diagnostic>,
    options: RunOptions,
    include_chain: Vec<String>,
    presets: Vec<Rc<PresetDecl>>,
}

impl Context {
    pub fn new(options: RunOptions) -> Self {
        Self::with_include_chain(options, Vec::new())
    }

    pub(crate) fn with_include_chain(options: RunOptions, include_chain: Vec<String>) -> Self {
        let seed = options.sentinel_seed.unwrap_or_else(random_seed);
        let mut global = Scope::default();
        global.funcs.insert("get".to_string(), Callable::Get);
        Self {
            global,
            frames: Vec::new(),
            document: None,
            cursor: None,
            sentinel: make_sentinel(seed),
            diagnostics: Vec::new(),
            options,
            include_chain,
            presets: Vec::new(),
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub(crate) fn include_chain(&self) -> &[String] {
        &self.include_chain
    }

    pub(crate) fn sentinel(&self) -> &str {
        &self.sentinel
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub(crate) fn extend_diagnostics(&mut self, diagnostics: Vec<Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn diagnose(&mut self, code: &str, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(code, message);
        warn!(code = %diagnostic.code, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn document(&self) -> Option<&XmlDocument> {
        self.document.as_ref()
    }

    pub(crate) fn document_mut(&mut self) -> Option<&mut XmlDocument> {
        self.document.as_mut()
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    // Falls back to the document root when no element has been entered.
    pub fn element(&self) -> Option<NodeId> {
        self.cursor
            .or_else(|| self.document.as_ref().map(XmlDocument::root_element))
    }

    fn innermost(&self) -> impl Iterator<Item = &Scope> {
        self.frames.iter().rev().chain(std::iter::once(&self.global))
    }

    fn innermost_mut(&mut self) -> &mut Scope {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.global,
        }
    }

    pub fn get_const(&self, name: &str) -> Option<&str> {
        self.innermost()
            .find_map(|scope| scope.consts.get(name))
            .map(String::as_str)
    }

    pub fn set_const(&mut self, name: &str, value: &str) -> Result<(), MmlError> {
        let scope = self.innermost_mut();
        scope.check_free(name)?;
        scope.consts.insert(name.to_string(), value.to_string());
        scope
            .funcs
            .insert(name.to_string(), Callable::Template(value.to_string()));
        debug!(name, value, "constant bound");
        Ok(())
    }

    pub fn set_func(&mut self, name: &str, callable: Callable) -> Result<(), MmlError> {
        let scope = self.innermost_mut();
        scope.check_free(name)?;
        scope.funcs.insert(name.to_string(), callable);
        Ok(())
    }

    pub fn lookup_func(&self, name: &str) -> Option<&Callable> {
        self.innermost().find_map(|scope| scope.funcs.get(name))
    }

    pub fn scoped(&mut self) -> ContextGuard<'_> {
        ContextGuard::new(self)
    }

    pub fn enter_element(&mut self, element: NodeId) -> ContextGuard<'_> {
        let saved = self.cursor.replace(element);
        let mut guard = ContextGuard::new(self);
        guard.saved_cursor = Some(saved);
        guard
    }

    pub fn enter_document(&mut self, document: XmlDocument) -> ContextGuard<'_> {
        let saved_document = self.document.replace(document);
        let saved_cursor = self.cursor.take();
        let mut guard = ContextGuard::new(self);
        guard.saved_document = Some(saved_document);
        guard.saved_cursor = Some(saved_cursor);
        guard
    }

    // Only the global frame stays visible, plus one fresh frame for the caller to fill.
    pub fn isolated(&mut self) -> ContextGuard<'_> {
        let saved = std::mem::take(&mut self.frames);
        let mut guard = ContextGuard::new(self);
        guard.saved_frames = Some(saved);
        guard
    }

    // Presets have no conditionals, so re-entering an active preset never terminates.
    pub(crate) fn enter_preset(
        &mut self,
        decl: &Rc<PresetDecl>,
    ) -> Result<ContextGuard<'_>, MmlError> {
        if let Some(start) = self
            .presets
            .iter()
            .position(|active| Rc::ptr_eq(active, decl))
        {
            let chain = self.presets[start..]
                .iter()
                .map(|active| active.name.as_str())
                .chain(std::iter::once(decl.name.as_str()))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(MmlError::new(
                "EVAL_PRESET_RECURSION",
                format!("Preset '{}' calls itself: {}", decl.name, chain),
            ));
        }
        self.presets.push(decl.clone());
        let mut guard = self.isolated();
        guard.pops_preset = true;
        Ok(guard)
    }
}

pub struct ContextGuard<'c> {
    context: &'c mut Context,
    saved_frames: Option<Vec<Scope>>,
    saved_cursor: Option<Option<NodeId>>,
    saved_document: Option<Option<XmlDocument>>,
    pops_preset: bool,
}

impl<'c> ContextGuard<'c> {
    fn new(context: &'c mut Context) -> Self {
        context.frames.push(Scope::default());
        Self {
            context,
            saved_frames: None,
            saved_cursor: None,
            saved_document: None,
            pops_preset: false,
        }
    }

    pub fn into_document(self) -> Option<XmlDocument> {
        let mut guard = self;
        guard.context.document.take()
    }
}

impl Deref for ContextGuard<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.context
    }
}

impl DerefMut for ContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.context
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.context.frames.pop();
        if let Some(frames) = self.saved_frames.take() {
            self.context.frames = frames;
        }
        if let Some(cursor) = self.saved_cursor.take() {
            self.context.cursor = cursor;
        }
        if let Some(document) = self.saved_document.take() {
            self.context.document = document;
        }
        if self.pops_preset {
            self.context.presets.pop();
        }
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;
    use crate::host::{MapSourceResolver, MemoryDocumentStore};
    use std::sync::Arc;

    fn context() -> Context {
        let mut options = RunOptions::new(
            Arc::new(MapSourceResolver::new()),
            Arc::new(MemoryDocumentStore::new()),
        );
        options.sentinel_seed = Some(1);
        Context::new(options)
    }

    #[test]
    fn constants_resolve_innermost_first_and_restore() {
        let mut context = context();
        context.set_const("a", "outer").expect("bind outer");
        {
            let mut scope = context.scoped();
            scope.set_const("a", "inner").expect("shadowing is allowed");
            assert_eq!(scope.get_const("a"), Some("inner"));
            assert_eq!(scope.depth(), 1);
        }
        assert_eq!(context.get_const("a"), Some("outer"));
        assert_eq!(context.depth(), 0);
        assert_eq!(context.get_const("missing"), None);
    }

    #[test]
    fn constants_register_template_callables() {
        let mut context = context();
        context.set_const("greet", "hi [1]").expect("bind");
        assert!(matches!(
            context.lookup_func("greet"),
            Some(Callable::Template(text)) if text == "hi [1]"
        ));
        assert!(matches!(context.lookup_func("get"), Some(Callable::Get)));
    }

    #[test]
    fn duplicate_bindings_in_one_frame_fail() {
        let mut context = context();
        context.set_const("a", "1").expect("bind");
        let error = context.set_const("a", "2").expect_err("duplicate const");
        assert_eq!(error.code, "EVAL_DUPLICATE_BINDING");
        let error = context
            .set_func("a", Callable::Get)
            .expect_err("const name is also a function");
        assert_eq!(error.code, "EVAL_DUPLICATE_BINDING");
        let error = context.set_const("get", "x").expect_err("builtin is bound globally");
        assert_eq!(error.code, "EVAL_DUPLICATE_BINDING");
    }

    #[test]
    fn isolated_scope_sees_only_globals() {
        let mut context = context();
        context.set_const("global", "g").expect("bind global");
        let mut outer = context.scoped();
        outer.set_const("local", "l").expect("bind local");
        {
            let mut isolated = outer.isolated();
            assert_eq!(isolated.get_const("global"), Some("g"));
            assert_eq!(isolated.get_const("local"), None);
            assert_eq!(isolated.depth(), 1);
            isolated.set_const("local", "param").expect("fresh frame");
        }
        assert_eq!(outer.get_const("local"), Some("l"));
        assert_eq!(outer.depth(), 1);
    }

    #[test]
    fn guards_restore_state_when_body_fails() {
        fn failing(context: &mut Context) -> Result<(), MmlError> {
            context.set_const("x", "1")?;
            context.set_const("x", "2")
        }

        let mut context = context();
        let document = XmlDocument::new("root").expect("document");
        {
            let mut file = context.enter_document(document);
            let root = file.element().expect("root cursor");
            let mut element = file.enter_element(root);
            let mut isolated = element.isolated();
            assert!(failing(&mut isolated).is_err());
        }
        assert_eq!(context.depth(), 0);
        assert!(!context.has_document());
        assert_eq!(context.element(), None);
        assert_eq!(context.get_const("x"), None);
    }

    #[test]
    fn document_guard_hands_back_the_document() {
        let mut context = context();
        let document = XmlDocument::new("root").expect("document");
        let file = context.enter_document(document);
        assert_eq!(file.depth(), 1);
        let document = file.into_document().expect("document returned");
        assert_eq!(document.name(document.root_element()), Some("root"));
        assert!(!context.has_document());
        assert_eq!(context.depth(), 0);
    }

    #[test]
    fn entering_an_active_preset_fails_and_guard_releases_it() {
        let decl = Rc::new(PresetDecl {
            name: "p".to_string(),
            params: Vec::new(),
            body: Vec::new(),
        });
        let mut context = context();
        {
            let mut outer = context.enter_preset(&decl).expect("first entry");
            let error = outer
                .enter_preset(&decl)
                .err()
                .expect("re-entry should fail");
            assert_eq!(error.code, "EVAL_PRESET_RECURSION");
            assert_eq!(error.message, "Preset 'p' calls itself: p -> p");
        }
        assert_eq!(context.depth(), 0);
        assert!(context.enter_preset(&decl).is_ok());
    }

    #[test]
    fn diagnostics_are_collected() {
        let mut context = context();
        context.diagnose("ELEMENT_NOT_FOUND", "Element with selector 'x' not found");
        assert_eq!(context.diagnostics().len(), 1);
        assert_eq!(
            context.diagnostics()[0].to_string(),
            "ELEMENT_NOT_FOUND:Element with selector 'x' not found"
        );
    }
}
