pub mod credentials;
pub mod ride;
