//! Authentication and authorization core: password hashing, token minting,
//! session issue/validation, team-admin checks, and the request gate that ties
//! them together for protected endpoints.

mod password;
mod token;
mod session;
mod authorizer;
mod principal;
mod gate;

pub use password::{HashError, PasswordHasher};
pub use token::{generate_id, generate_token, token_hint, EntropyError};
pub use session::{session_is_live, LoginOutcome, SessionManager};
pub use authorizer::{split_usernames, TeamAuthorizer};
pub use principal::Principal;
pub use gate::{authenticate, require_team_admin, strip_bearer};
