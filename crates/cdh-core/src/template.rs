use crate::error::Result;
use handlebars::Handlebars;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Values visible to templates and remote action arguments. Scalars are
/// strings; host lists stay arrays so templates can `{{#each}}` them.
pub type Vars = Map<String, Value>;

fn engine() -> &'static Handlebars<'static> {
    static ENGINE: OnceLock<Handlebars<'static>> = OnceLock::new();
    ENGINE.get_or_init(|| {
        let mut hb = Handlebars::new();
        // Undefined names fail instead of rendering as empty strings.
        hb.set_strict_mode(true);
        // Output is shell, SQL and config files, never HTML.
        hb.register_escape_fn(handlebars::no_escape);
        hb
    })
}

/// Render `text` against `vars`.
pub fn render(text: &str, vars: &Vars) -> Result<String> {
    if !text.contains("{{") {
        return Ok(text.to_string());
    }
    Ok(engine().render_template(text, vars)?)
}

/// Insert a plain string value.
pub fn set(vars: &mut Vars, name: impl Into<String>, value: impl Into<String>) {
    vars.insert(name.into(), Value::String(value.into()));
}
