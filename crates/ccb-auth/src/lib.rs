//! OAuth authorization and token lifecycle for the CCB church-management API
//!
//! Token flow:
//! 1. `Authorizer::authorize()` runs the one-time browser consent flow and
//!    exchanges the returned code for a `Token`
//! 2. The caller persists the token (e.g. `TokenStore::save()`)
//! 3. Before each API call, `TokenGuardian::ensure_valid()` refreshes the
//!    token if it is within `EXPIRY_MARGIN` of expiring
//!
//! All HTTP goes through an injected `transport::Transport`.

pub mod authorizer;
pub mod browser;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod flow;
pub mod guardian;
pub mod store;
pub mod token;

pub use authorizer::{Authorizer, AuthorizerConfig, authorization_url};
pub use credentials::Credentials;
pub use endpoints::*;
pub use error::{Error, Result};
pub use guardian::{SharedToken, TokenGuardian, is_valid};
pub use store::TokenStore;
pub use token::{EXPIRY_MARGIN, Token, TokenResponse, exchange_code, unix_now};
