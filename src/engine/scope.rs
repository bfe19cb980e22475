//! Layered variable scopes and their composition into one environment.
use serde_json::{Map, Value};

use super::value::Vars;

/// A block-scoped overlay of named values.
///
/// Pushed onto the item stack for the duration of a block; its keys become
/// template variables that shadow the playbook namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemScope {
    vars: Vars,
}

impl ItemScope {
    /// Create an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a binding.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Look up a binding.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// All bindings in this overlay.
    #[must_use]
    pub const fn vars(&self) -> &Vars {
        &self.vars
    }
}

impl From<Vars> for ItemScope {
    fn from(vars: Vars) -> Self {
        Self { vars }
    }
}

impl From<Map<String, Value>> for ItemScope {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            vars: map.into_iter().collect(),
        }
    }
}

/// The variable scopes visible to templates.
///
/// Later scopes shadow earlier ones: `globals` < `run_args` (as `ARGS`) <
/// `playbook` < `calling` < `items` (most recently pushed wins).
#[derive(Debug, Clone, Default)]
pub struct Scopes {
    /// Host facts set once at startup.
    pub globals: Vars,
    /// Parsed run-level arguments, exposed under `ARGS`.
    pub run_args: Vars,
    /// Names defined at the top level of the playbook.
    pub playbook: Vars,
    /// Bindings of the statement invoking the current task.
    pub calling: Vars,
    /// Block-scoped overlays, innermost last.
    pub items: Vec<ItemScope>,
}

impl Scopes {
    /// Merge every scope, then `extra`, into one flat environment.
    #[must_use]
    pub fn compose(&self, extra: Option<&Vars>) -> Vars {
        let mut env = self.globals.clone();
        env.insert(
            "ARGS".to_string(),
            Value::Object(
                self.run_args
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        );
        env.extend(self.playbook.iter().map(|(k, v)| (k.clone(), v.clone())));
        env.extend(self.calling.iter().map(|(k, v)| (k.clone(), v.clone())));
        for item in &self.items {
            env.extend(item.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(extra) = extra {
            env.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        env
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> Vars {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn empty_scopes_compose_to_args_only() {
        let env = Scopes::default().compose(None);
        assert_eq!(env.len(), 1);
        assert_eq!(env["ARGS"], json!({}));
    }

    #[test]
    fn precedence_order() {
        let scopes = Scopes {
            globals: vars(&[("name", json!("global")), ("g", json!(1))]),
            run_args: vars(&[("user", json!("bob"))]),
            playbook: vars(&[("name", json!("playbook")), ("p", json!(2))]),
            calling: vars(&[("name", json!("calling"))]),
            items: vec![],
        };
        let env = scopes.compose(None);
        assert_eq!(env["name"], json!("calling"));
        assert_eq!(env["g"], json!(1));
        assert_eq!(env["p"], json!(2));
        assert_eq!(env["ARGS"]["user"], json!("bob"));
    }

    #[test]
    fn item_top_overrides_playbook_and_globals() {
        let scopes = Scopes {
            globals: vars(&[("path", json!("g"))]),
            playbook: vars(&[("path", json!("p"))]),
            items: vec![
                ItemScope::new().with("path", "outer").with("mode", "0644"),
                ItemScope::new().with("path", "inner"),
            ],
            ..Scopes::default()
        };
        let env = scopes.compose(None);
        assert_eq!(env["path"], json!("inner"));
        assert_eq!(env["mode"], json!("0644"));
    }

    #[test]
    fn extra_has_highest_precedence() {
        let scopes = Scopes {
            items: vec![ItemScope::new().with("x", 1)],
            ..Scopes::default()
        };
        let extra = vars(&[("x", json!(2))]);
        assert_eq!(scopes.compose(Some(&extra))["x"], json!(2));
    }

    #[test]
    fn item_scope_from_map() {
        let map = json!({"path": "/tmp/a"}).as_object().cloned().unwrap();
        let item = ItemScope::from(map);
        assert_eq!(item.get("path"), Some(&json!("/tmp/a")));
    }
}
