use std::rc::Rc;

use mml_core::MmlError;
use mml_parser::{Node, PresetDecl};
use mml_xml::evaluate_string;
use tracing::debug;

use crate::context::{Callable, Context};

impl Context {
    // Arguments are passed unevaluated; each callable decides when to evaluate them.
    pub fn call_func(&mut self, name: &str, args: &[Node]) -> Result<Option<String>, MmlError> {
        let Some(callable) = self.lookup_func(name).cloned() else {
            return Ok(None);
        };
        match callable {
            Callable::Get => self.call_get(args),
            Callable::Template(text) => self.call_template(&text, args).map(Some),
            Callable::Preset(decl) => {
                self.call_preset(&decl, args)?;
                Ok(None)
            }
        }
    }

    fn call_get(&mut self, args: &[Node]) -> Result<Option<String>, MmlError> {
        let Some(first) = args.first() else {
            return Ok(None);
        };
        let Some(selector) = self.eval_value(first)? else {
            return Ok(None);
        };

        let from_root = selector.starts_with('~');
        let expression = selector.replace('~', "");
        let Some(document) = self.document() else {
            return Ok(None);
        };
        let context = if from_root {
            document.document_node()
        } else {
            match self.element() {
                Some(element) => element,
                None => return Ok(None),
            }
        };
        evaluate_string(document, context, &expression).map(Some)
    }

    fn call_template(&mut self, text: &str, args: &[Node]) -> Result<String, MmlError> {
        let mut value = text.to_string();
        for (index, arg) in args.iter().enumerate() {
            let replacement = self.eval_text(arg)?;
            value = value.replace(&format!("[{}]", index + 1), &replacement);
        }
        Ok(value)
    }

    fn call_preset(&mut self, decl: &Rc<PresetDecl>, args: &[Node]) -> Result<(), MmlError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_value(arg)?);
        }

        match values.pop() {
            Some(Some(flag)) if flag == self.sentinel() => {}
            _ => {
                return Err(MmlError::new(
                    "EVAL_PRESET_USE_REQUIRED",
                    format!("Use preset '{}' without 'use' is unavailable", decl.name),
                ))
            }
        }
        if decl.params.len() > values.len() {
            return Err(MmlError::new(
                "EVAL_PRESET_MISSING_ARGS",
                format!(
                    "Missing arguments on calling '{}'. Expected {} found {}",
                    decl.name,
                    decl.params.len(),
                    values.len()
                ),
            ));
        }

        debug!(preset = %decl.name, args = ?values, "call preset");
        let mut scope = self.enter_preset(decl)?;
        for (index, (param, value)) in decl.params.iter().zip(values).enumerate() {
            let Some(value) = value else {
                return Err(MmlError::new(
                    "EVAL_PRESET_ARG_NULL",
                    format!("Calling preset '{}' argument {} is null", decl.name, index),
                ));
            };
            scope.set_const(param, &value)?;
        }
        scope.eval_block(&decl.body)
    }
}
