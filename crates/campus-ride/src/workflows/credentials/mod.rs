//! Password complexity rules shared by every credential screen.

pub mod form;
pub mod policy;

pub use form::{PasswordChangeError, PasswordChangeRequest};
pub use policy::{
    confirmation_matches, PasswordPolicy, PasswordPolicyResult, PasswordRule,
    DEFAULT_SPECIAL_CHARACTERS, MIN_PASSWORD_CHARS,
};
