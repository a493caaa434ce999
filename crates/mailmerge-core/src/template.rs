//! Subject and body templates.
//!
//! Templates use Handlebars syntax: `{{NAME}}` (or `{{{NAME}}}`) substitutes
//! the row's `NAME` cell. Names are matched case-sensitively and unknown names
//! render as an empty string. Nothing is HTML-escaped. Column names containing
//! spaces are written as `{{[FIRST NAME]}}`.

use crate::error::TemplateError;
use crate::table::RowMap;
use handlebars::Handlebars;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which part of the message a template renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemplateKind {
    /// Subject line.
    Subject,
    /// Plain-text body.
    BodyText,
    /// HTML body.
    BodyHtml,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subject => write!(f, "subject"),
            Self::BodyText => write!(f, "body-text"),
            Self::BodyHtml => write!(f, "body-html"),
        }
    }
}

/// Named templates loaded once and rendered per row.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    paths: BTreeMap<TemplateKind, PathBuf>,
    registry: Handlebars<'static>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateSet {
    /// Creates an empty template set.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        // Cells go into bodies verbatim, HTML included
        registry.register_escape_fn(handlebars::no_escape);
        Self {
            paths: BTreeMap::new(),
            registry,
        }
    }

    /// Configures the file for `kind`. An empty path leaves it unconfigured.
    #[must_use]
    pub fn with_path(mut self, kind: TemplateKind, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if is_set(&path) {
            self.paths.insert(kind, path);
        } else {
            self.paths.remove(&kind);
        }
        self
    }

    /// Adds an in-memory template for `kind`, replacing any configured file.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Syntax`] if the text is malformed.
    pub fn insert_source(&mut self, kind: TemplateKind, source: &str) -> Result<(), TemplateError> {
        self.register(kind, source)?;
        self.paths.remove(&kind);
        Ok(())
    }

    /// Returns true if a file or in-memory template exists for `kind`.
    #[must_use]
    pub fn is_configured(&self, kind: TemplateKind) -> bool {
        self.paths.contains_key(&kind) || self.registry.has_template(&kind.to_string())
    }

    /// Reads and compiles every configured template file.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Read`] if a configured file cannot be read and
    /// [`TemplateError::Syntax`] if its text is malformed.
    pub fn read_templates(&mut self) -> Result<(), TemplateError> {
        let paths = self.paths.clone();
        for (kind, path) in paths {
            let source = std::fs::read_to_string(&path).map_err(|source| TemplateError::Read {
                kind,
                path: path.clone(),
                source,
            })?;
            self.register(kind, &source)?;
            debug!(%kind, path = %path.display(), "loaded template");
        }
        Ok(())
    }

    /// Renders the `kind` template against `vars`, or returns `default` if no
    /// template of that kind is configured.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Render`] if rendering fails, or
    /// [`TemplateError::NotLoaded`] if the template is configured but
    /// [`TemplateSet::read_templates`] has not loaded it.
    pub fn render_template_or_default(
        &self,
        kind: TemplateKind,
        vars: &RowMap,
        default: &[u8],
    ) -> Result<Vec<u8>, TemplateError> {
        let name = kind.to_string();
        if self.registry.has_template(&name) {
            return self
                .registry
                .render(&name, vars)
                .map(String::into_bytes)
                .map_err(|e| TemplateError::Render {
                    kind,
                    message: e.to_string(),
                });
        }
        if self.paths.contains_key(&kind) {
            return Err(TemplateError::NotLoaded(kind));
        }
        Ok(default.to_vec())
    }

    fn register(&mut self, kind: TemplateKind, source: &str) -> Result<(), TemplateError> {
        self.registry
            .register_template_string(&kind.to_string(), source)
            .map_err(|e| TemplateError::Syntax {
                kind,
                message: e.to_string(),
            })
    }
}

/// Returns true if the path is neither empty nor whitespace.
pub(crate) fn is_set(path: &Path) -> bool {
    !path.as_os_str().to_string_lossy().trim().is_empty()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vars(pairs: &[(&str, &str)]) -> RowMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn render(source: &str, row: &RowMap) -> String {
        let mut set = TemplateSet::new();
        set.insert_source(TemplateKind::BodyText, source).unwrap();
        let out = set
            .render_template_or_default(TemplateKind::BodyText, row, b"")
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_render_substitutes() {
        let row = vars(&[("NAME", "Alice"), ("CITY", "Oslo")]);
        assert_eq!(render("Hello {{NAME}} from {{ CITY }}!", &row), "Hello Alice from Oslo!");
    }

    #[test]
    fn test_render_does_not_escape() {
        let row = vars(&[("LINK", "<a href=\"x\">Tom & Jerry</a>")]);
        assert_eq!(render("<p>{{LINK}}</p>", &row), "<p><a href=\"x\">Tom & Jerry</a></p>");
        assert_eq!(render("<p>{{{LINK}}}</p>", &row), "<p><a href=\"x\">Tom & Jerry</a></p>");
    }

    #[test]
    fn test_render_missing_is_empty() {
        assert_eq!(render("Hi {{NAME}}.", &vars(&[])), "Hi .");
    }

    #[test]
    fn test_render_is_case_sensitive() {
        assert_eq!(render("{{name}}", &vars(&[("NAME", "Alice")])), "");
    }

    #[test]
    fn test_render_column_with_spaces() {
        let row = vars(&[("FIRST NAME", "Alice")]);
        assert_eq!(render("Dear {{[FIRST NAME]}},", &row), "Dear Alice,");
    }

    #[test]
    fn test_render_conditional() {
        let template = "Hi {{NAME}}{{#if CODE}}, your code is {{CODE}}{{/if}}.";
        assert_eq!(
            render(template, &vars(&[("NAME", "Alice"), ("CODE", "X1")])),
            "Hi Alice, your code is X1."
        );
        assert_eq!(render(template, &vars(&[("NAME", "Bob"), ("CODE", "")])), "Hi Bob.");
    }

    #[test]
    fn test_lone_closing_braces_are_literal() {
        assert_eq!(render("a }} b", &vars(&[])), "a }} b");
    }

    #[test]
    fn test_syntax_errors() {
        for source in ["Hi {{NAME", "{{#if NAME}}open"] {
            let mut set = TemplateSet::new();
            match set.insert_source(TemplateKind::Subject, source) {
                Err(TemplateError::Syntax { kind, .. }) => assert_eq!(kind, TemplateKind::Subject),
                other => panic!("expected syntax error for {source}: {other:?}"),
            }
            assert!(!set.is_configured(TemplateKind::Subject));
        }
    }

    #[test]
    fn test_unknown_helper_is_render_error() {
        let mut set = TemplateSet::new();
        set.insert_source(TemplateKind::BodyHtml, "{{FIRST NAME}}").unwrap();
        let err = set
            .render_template_or_default(TemplateKind::BodyHtml, &vars(&[("FIRST NAME", "A")]), b"")
            .unwrap_err();
        assert!(matches!(err, TemplateError::Render { kind: TemplateKind::BodyHtml, .. }));
    }

    #[test]
    fn test_default_when_unconfigured() {
        let set = TemplateSet::new().with_path(TemplateKind::BodyHtml, "");
        assert!(!set.is_configured(TemplateKind::BodyHtml));
        let out = set
            .render_template_or_default(TemplateKind::BodyHtml, &vars(&[]), b"fallback")
            .unwrap();
        assert_eq!(out, b"fallback");
    }

    #[test]
    fn test_not_loaded() {
        let set = TemplateSet::new().with_path(TemplateKind::Subject, "subject.txt");
        let err = set
            .render_template_or_default(TemplateKind::Subject, &vars(&[]), b"")
            .unwrap_err();
        assert!(matches!(err, TemplateError::NotLoaded(TemplateKind::Subject)));
    }

    #[test]
    fn test_read_templates_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let subject = dir.path().join("subject.mustache");
        std::fs::write(&subject, "Hi {{NAME}}").unwrap();

        let mut set = TemplateSet::new()
            .with_path(TemplateKind::Subject, &subject)
            .with_path(TemplateKind::BodyText, "");
        set.read_templates().unwrap();

        let row = vars(&[("NAME", "Alice")]);
        let out = set
            .render_template_or_default(TemplateKind::Subject, &row, b"")
            .unwrap();
        assert_eq!(out, b"Hi Alice");
        let text = set
            .render_template_or_default(TemplateKind::BodyText, &row, b"")
            .unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn test_read_templates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut set =
            TemplateSet::new().with_path(TemplateKind::BodyHtml, dir.path().join("missing.html"));
        let err = set.read_templates().unwrap_err();
        assert!(matches!(err, TemplateError::Read { kind: TemplateKind::BodyHtml, .. }));
    }

    proptest! {
        #[test]
        fn render_is_pure(
            literal in "[a-zA-Z0-9 .,!]{0,20}",
            name in "[A-Z_]{1,8}",
            value in "[a-zA-Z0-9 ]{0,20}",
        ) {
            let source = format!("{literal}{{{{{name}}}}}{literal}");
            let row = vars(&[(name.as_str(), value.as_str())]);
            let mut set = TemplateSet::new();
            set.insert_source(TemplateKind::BodyText, &source).unwrap();

            let first = set.render_template_or_default(TemplateKind::BodyText, &row, b"").unwrap();
            let second = set.render_template_or_default(TemplateKind::BodyText, &row, b"").unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first, format!("{literal}{value}{literal}").into_bytes());
        }
    }
}
