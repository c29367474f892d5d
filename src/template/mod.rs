//! Compiled notification templates.
//!
//! A [`TemplateSet`] is built once at startup from the built-in definitions
//! plus any configured template files, then shared read-only (behind an
//! `Arc`) by every concurrent dispatch. Rendering never mutates the set.
//!
//! The language is a small subset of Go's `text/template`:
//!
//! ```text
//! {{ .Field.Sub }}                    field of the current context
//! {{ $.ExternalURL }}                 field of the top-level context
//! {{ template "name" .Alerts }}       invoke another named template
//! {{ range .Alerts }}..{{ else }}..{{ end }}
//! {{ if eq .Status "firing" }}..{{ else }}..{{ end }}
//! {{ .FiringAlerts | len }}           pipelines into len, eq, ne, not,
//!                                     toUpper, toLower, title, join
//! {{ define "name" }}..{{ end }}      declare a named template
//! {{- trim -}}  {{/* comment */}}
//! ```

mod defaults;
mod exec;
mod parse;

use crate::error::{NotifyError, Result};
use exec::Exec;
use parse::Node;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

pub use defaults::DEFAULT_TEMPLATES;

/// An immutable collection of named, parsed templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: HashMap<String, Vec<Node>>,
}

impl TemplateSet {
    /// An empty set with no definitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding the built-in `default.title` / `default.message`
    /// definitions and their helpers.
    pub fn builtin() -> Result<Self> {
        Self::new().with_source("builtin", DEFAULT_TEMPLATES)
    }

    /// Parses `src` and adds its definitions.
    ///
    /// Definitions replace earlier ones with the same name, which is how
    /// user templates override the built-ins. If the source has content
    /// outside `define` blocks, that content is registered under `origin`.
    ///
    /// # Errors
    /// Returns [`NotifyError::Configuration`] if the source does not parse.
    pub fn with_source(mut self, origin: &str, src: &str) -> Result<Self> {
        let parsed = parse::parse(src)
            .map_err(|e| NotifyError::Configuration(format!("template {origin}: {e}")))?;

        if parsed.has_body() {
            self.templates.insert(origin.to_string(), parsed.root.clone());
        }
        for (name, body) in parsed.defines {
            debug!(template = %name, origin, "Registered template");
            self.templates.insert(name, body);
        }
        Ok(self)
    }

    /// Reads and adds each file, in order.
    pub fn with_files<P: AsRef<Path>>(mut self, paths: &[P]) -> Result<Self> {
        for path in paths {
            let path = path.as_ref();
            let src = std::fs::read_to_string(path).map_err(|e| {
                NotifyError::Configuration(format!(
                    "failed to read template file {}: {e}",
                    path.display()
                ))
            })?;
            self = self.with_source(&path.display().to_string(), &src)?;
        }
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Names of all registered templates, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn get(&self, name: &str) -> Option<&[Node]> {
        self.templates.get(name).map(Vec::as_slice)
    }

    /// Renders the template `name` against `context`.
    ///
    /// # Errors
    /// Returns [`NotifyError::Render`] for unknown templates, missing fields
    /// and type mismatches. The error covers this invocation only.
    pub fn render(&self, name: &str, context: &Value) -> Result<String> {
        let nodes = self
            .get(name)
            .ok_or_else(|| NotifyError::Render(format!("no such template \"{name}\"")))?;
        let exec = Exec {
            set: self,
            name,
            root: context,
            depth: 0,
        };
        let mut out = String::new();
        exec.walk(nodes, context, &mut out)
            .map_err(NotifyError::Render)?;
        Ok(out)
    }

    /// Serializes `context` and renders `name` against it.
    pub fn render_with<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        let value = serde_json::to_value(context)
            .map_err(|e| NotifyError::Render(format!("context not serializable: {e}")))?;
        self.render(name, &value)
    }
}
