// handlers/public/mod.rs - Handlers reachable without credentials
pub mod auth;
pub mod faq;
pub mod legacy;
pub mod root;
pub mod topics;

use axum::Extension;

use crate::auth::Identity;

pub use legacy::legacy_create;
pub use root::{health, root};

/// Staff or API key behind optional authentication
fn is_staff(caller: &Option<Extension<Identity>>) -> bool {
    matches!(caller, Some(Extension(identity)) if identity.is_staff_or_key())
}
