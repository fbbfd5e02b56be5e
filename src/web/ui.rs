//! UI rendering.
//!
//! Loads HTML templates from the `templates/` directory and injects dynamic content.

mod pages;

pub use pages::{get_login_page, preload_templates};
