//! Display name and description templates for minted keys.
//!
//! Templates use `{{name}}` placeholders. Supported names are
//! `role_name`, `display_name`, `path`, `unix_time` and `random`.

use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_DISPLAY_NAME_TEMPLATE: &str = "{{role_name}}-{{unix_time}}-{{random}}";
pub const DEFAULT_DESCRIPTION_TEMPLATE: &str =
    "Created by ccloud-secrets: path={{path}} entity={{display_name}}";

const KNOWN_PLACEHOLDERS: &[&str] = &["role_name", "display_name", "path", "unix_time", "random"];

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}").expect("valid placeholder regex"))
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    pub role_name: String,
    pub display_name: String,
    pub path: String,
    pub unix_time: i64,
}

/// Check that every placeholder in `template` is known.
pub fn validate(template: &str) -> Result<(), String> {
    for caps in placeholder_regex().captures_iter(template) {
        let name = &caps[1];
        if !KNOWN_PLACEHOLDERS.contains(&name) {
            return Err(format!("unknown template placeholder {{{{{}}}}}", name));
        }
    }
    Ok(())
}

/// Render `template`. Each `{{random}}` gets its own 8 hex characters.
pub fn render(template: &str, vars: &TemplateVars) -> Result<String, String> {
    validate(template)?;
    let rendered = placeholder_regex().replace_all(template, |caps: &regex::Captures| {
        match &caps[1] {
            "role_name" => vars.role_name.clone(),
            "display_name" => vars.display_name.clone(),
            "path" => vars.path.clone(),
            "unix_time" => vars.unix_time.to_string(),
            _ => hex::encode(rand::random::<[u8; 4]>()),
        }
    });
    Ok(rendered.into_owned())
}
