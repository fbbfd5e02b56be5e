//! HTML page rendering.
//!
//! Provides functions to render specific UI pages using loaded templates.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::error;

use crate::config::{Config, LOGIN_PATH};

const TEMPLATE_DIR: &str = "templates";
static TEMPLATES: OnceLock<HashMap<String, Arc<str>>> = OnceLock::new();

/// Pre-loads all templates into memory.
pub fn preload_templates() {
    let _ = get_template_map();
}

fn get_template_map() -> &'static HashMap<String, Arc<str>> {
    TEMPLATES.get_or_init(|| {
        let mut m = HashMap::new();
        for name in &["login.html"] {
            let path = Path::new(TEMPLATE_DIR).join(name);
            match fs::read_to_string(&path) {
                Ok(content) => {
                    m.insert((*name).to_string(), Arc::from(content));
                }
                Err(e) => {
                    error!(file = name, error = %e, "Failed to load UI template, using built-in page");
                }
            }
        }
        m
    })
}

fn load_template(filename: &str) -> Option<Arc<str>> {
    get_template_map().get(filename).cloned()
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the password form shown to unauthenticated browsers.
#[must_use]
pub fn get_login_page(config: &Config) -> String {
    let template = load_template("login.html").map_or_else(
        || {
            "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><title>{{REALM}}</title></head>\
             <body><h3>{{REALM}}</h3><form method=\"POST\" action=\"{{LOGIN_PATH}}\">\
             <input type=\"password\" name=\"password\" required autofocus>\
             <button type=\"submit\">Access</button></form></body></html>"
                .to_string()
        },
        |t: Arc<str>| t.to_string(),
    );

    template
        .replace("{{REALM}}", &escape_html(&config.auth_realm))
        .replace("{{LOGIN_PATH}}", LOGIN_PATH)
}
