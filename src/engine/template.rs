//! String templating with strict undefined-variable handling.
use std::path::Path;

use minijinja::{Environment, ErrorKind, UndefinedBehavior};

use super::value::{ArgValue, Vars};
use super::workdir::WorkingDir;
use crate::error::PlaybookError;

/// Renders template strings against a composed environment.
///
/// Undefined names are errors, never empty strings. The path helpers
/// `basename`, `dirname` and `abspath` are available both as filters and as
/// functions.
pub struct Renderer {
    env: Environment<'static>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer").finish_non_exhaustive()
    }
}

/// Final path component, empty for paths ending in a separator.
fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// Everything before the final separator.
fn dirname(path: &str) -> String {
    match path.rsplit_once('/') {
        None => String::new(),
        Some((head, _)) => {
            let trimmed = head.trim_end_matches('/');
            if trimmed.is_empty() && path.starts_with('/') {
                "/".to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}

/// Whether `s` contains any template markers.
fn has_markers(s: &str) -> bool {
    s.contains("{{") || s.contains("{%") || s.contains("{#")
}

impl Renderer {
    /// Build a renderer whose `abspath` helper resolves against `workdir`.
    #[must_use]
    pub fn new(workdir: WorkingDir) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        env.add_filter("basename", |path: String| -> String { basename(&path) });
        env.add_function("basename", |path: String| -> String { basename(&path) });
        env.add_filter("dirname", |path: String| -> String { dirname(&path) });
        env.add_function("dirname", |path: String| -> String { dirname(&path) });
        let filter_dir = workdir.clone();
        env.add_filter("abspath", move |path: String| -> String {
            filter_dir.resolve(Path::new(&path)).display().to_string()
        });
        env.add_function("abspath", move |path: String| -> String {
            workdir.resolve(Path::new(&path)).display().to_string()
        });

        Self { env }
    }

    /// Render `template` against `vars`.
    ///
    /// Text without template markers is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::UndefinedTemplateVariable`] when the template
    /// references a missing name, [`PlaybookError::Template`] for any other
    /// template error.
    pub fn render(&self, template: &str, vars: &Vars) -> Result<String, PlaybookError> {
        if !has_markers(template) {
            return Ok(template.to_string());
        }
        self.env
            .render_str(template, vars)
            .map_err(|e| template_error(template, &e))
    }

    /// Render every text element of `value`; raw and non-text values pass
    /// through unchanged.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`render`](Self::render).
    pub fn render_arg(&self, value: ArgValue, vars: &Vars) -> Result<ArgValue, PlaybookError> {
        match value {
            ArgValue::Text(s) => Ok(ArgValue::Text(self.render(&s, vars)?)),
            ArgValue::List(items) => items
                .into_iter()
                .map(|item| self.render_arg(item, vars))
                .collect::<Result<Vec<_>, _>>()
                .map(ArgValue::List),
            other => Ok(other),
        }
    }

    /// Evaluate `expr` as a template expression and test its truthiness.
    ///
    /// # Errors
    ///
    /// Same as [`render`](Self::render).
    pub fn eval_condition(&self, expr: &str, vars: &Vars) -> Result<bool, PlaybookError> {
        let compiled = self
            .env
            .compile_expression(expr)
            .map_err(|e| template_error(expr, &e))?;
        let value = compiled
            .eval(vars)
            .map_err(|e| template_error(expr, &e))?;
        if value.is_undefined() {
            return Err(PlaybookError::UndefinedTemplateVariable {
                template: expr.to_string(),
                detail: "expression evaluated to an undefined value".to_string(),
            });
        }
        Ok(value.is_true())
    }
}

fn template_error(template: &str, err: &minijinja::Error) -> PlaybookError {
    if err.kind() == ErrorKind::UndefinedError {
        PlaybookError::UndefinedTemplateVariable {
            template: template.to_string(),
            detail: err.to_string(),
        }
    } else {
        PlaybookError::Template {
            template: template.to_string(),
            detail: err.to_string(),
        }
    }
}
