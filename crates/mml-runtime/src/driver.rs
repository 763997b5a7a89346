use std::sync::Arc;

use mml_core::{Diagnostic, MmlError};
use mml_parser::parse_source;
use serde::Serialize;
use tracing::info;

use crate::context::Context;
use crate::host::{DocumentStore, SourceResolver};

#[derive(Clone)]
pub struct RunOptions {
    pub resolver: Arc<dyn SourceResolver>,
    pub store: Arc<dyn DocumentStore>,
    pub sentinel_seed: Option<u32>,
}

impl RunOptions {
    pub fn new(resolver: Arc<dyn SourceResolver>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            resolver,
            store,
            sentinel_seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub diagnostics: Vec<Diagnostic>,
}

pub fn run_source(source: &str, options: &RunOptions) -> Result<RunReport, MmlError> {
    let diagnostics = run_in_chain(source, options, Vec::new())?;
    Ok(RunReport { diagnostics })
}

pub fn run_script(name: &str, options: &RunOptions) -> Result<RunReport, MmlError> {
    let source = resolve(options, name)?;
    info!(script = name, "running script");
    let diagnostics = run_in_chain(&source, options, vec![name.to_string()])?;
    info!(
        script = name,
        diagnostics = diagnostics.len(),
        "script finished"
    );
    Ok(RunReport { diagnostics })
}

fn resolve(options: &RunOptions, name: &str) -> Result<String, MmlError> {
    options.resolver.resolve(name)?.ok_or_else(|| {
        MmlError::new(
            "INCLUDE_NOT_FOUND",
            format!("File '{}.mml' not found", name),
        )
    })
}

fn run_in_chain(
    source: &str,
    options: &RunOptions,
    include_chain: Vec<String>,
) -> Result<Vec<Diagnostic>, MmlError> {
    let script = parse_source(source)?;
    let mut context = Context::with_include_chain(options.clone(), include_chain);
    context.evaluate(&script)?;
    Ok(context.take_diagnostics())
}

impl Context {
    // Runs the named script in a brand-new context; only the document store is shared.
    pub(crate) fn include(&mut self, name: &str) -> Result<(), MmlError> {
        if self.include_chain().iter().any(|entry| entry == name) {
            let mut chain = self.include_chain().to_vec();
            chain.push(name.to_string());
            return Err(MmlError::new(
                "INCLUDE_CYCLE",
                format!("Include cycle detected: {}", chain.join(" -> ")),
            ));
        }

        let source = resolve(self.options(), name)?;
        info!(script = name, "including script");
        let mut chain = self.include_chain().to_vec();
        chain.push(name.to_string());
        let diagnostics = run_in_chain(&source, self.options(), chain)?;
        self.extend_diagnostics(diagnostics);
        Ok(())
    }
}
