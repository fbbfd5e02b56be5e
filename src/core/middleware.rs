//! Middleware components.
//!
//! Includes credential resolution and authorization cookie handling.

mod credential;
mod session;

pub use credential::{
    AuthDecision, AuthMechanism, CredentialResolver, TOKEN_PARAM, decode_basic_password,
    is_vcs_client, parse_form_field,
};
pub use session::{format_set_cookie, read_cookie, strip_cookie};
