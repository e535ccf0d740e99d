//! Named reply templates (Jinja syntax, rendered by minijinja).
//!
//! Output is HTML-escaped, block tags swallow their own line
//! (`trim_blocks` + `lstrip_blocks`) and the rendered text is trimmed.
//! Extra filters: `format_datetime` (RFC 3339 string to `dd/mm/YYYY HH:MM`)
//! and `get_names` (the `name` attribute of every item of a list).

use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use minijinja::{AutoEscape, Environment, ErrorKind, Value};
use serde::Serialize;
use tracing::debug;

use crate::{errors::Error, formatting::format_datetime, Result};

const BUILTIN: &[(&str, &str)] = &[
    (
        "actuators_state",
        include_str!("../templates/actuators_state.html"),
    ),
    (
        "current_sensors",
        include_str!("../templates/current_sensors.html"),
    ),
    (
        "ecosystems_available",
        include_str!("../templates/ecosystems_available.html"),
    ),
    (
        "ecosystems_status",
        include_str!("../templates/ecosystems_status.html"),
    ),
    ("help", include_str!("../templates/help.html")),
];

fn template_error(e: minijinja::Error) -> Error {
    Error::Template(format!("{e:#}"))
}

// Digits, `/`, `:` and a space: nothing to escape.
fn format_datetime_filter(value: &str) -> std::result::Result<Value, minijinja::Error> {
    let dt = DateTime::parse_from_rfc3339(value).map_err(|e| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("'{value}' is not an RFC 3339 datetime: {e}"),
        )
    })?;
    Ok(Value::from_safe_string(format_datetime(&dt.with_timezone(&Utc))))
}

fn get_names(items: Value) -> std::result::Result<Value, minijinja::Error> {
    let names = items
        .try_iter()?
        .map(|item| item.get_attr("name"))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Value::from(names))
}

/// Loaded templates, shared read-only by every command handler.
#[derive(Clone, Debug)]
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Built-in templates only.
    pub fn builtin() -> Result<Self> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_filter("format_datetime", format_datetime_filter);
        env.add_filter("get_names", get_names);

        for &(name, source) in BUILTIN {
            env.add_template(name, source)
                .map_err(|e| Error::Template(format!("{name}: {e:#}")))?;
        }
        Ok(Self { env })
    }

    /// Built-in templates, overridden by every `<name>.html` found in `dir`.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut this = Self::builtin()?;
        let Some(dir) = dir else {
            return Ok(this);
        };

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let source = fs::read_to_string(&path)?;
            this.add(name, source)
                .map_err(|e| Error::Template(format!("{}: {e}", path.display())))?;
            debug!(template = name, path = %path.display(), "Loaded template override");
        }
        Ok(this)
    }

    /// Register (or replace) one template.
    pub fn add(&mut self, name: &str, source: String) -> Result<()> {
        self.env
            .add_template_owned(name.to_string(), source)
            .map_err(template_error)
    }

    pub fn render(&self, name: &str, context: &impl Serialize) -> Result<String> {
        let template = self.env.get_template(name).map_err(template_error)?;
        let out = template.render(context).map_err(template_error)?;
        Ok(out.trim().to_string())
    }
}
