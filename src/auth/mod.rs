//! Authentication state
//!
//! - `sessions`: the in-memory token → session store and its reclaimer
//! - `tokens`: access token generation and constant-time comparison
//! - `apps`: federated application registry (name → shared secret)
//! - `clock`: wall-clock sources, including a manual clock for tests
//! - `password`: argon2 hashing for the bundled user directories

mod apps;
mod clock;
pub mod password;
mod sessions;
mod tokens;

pub use apps::{AppRegistry, AppSecret, RegistryError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use sessions::{
    Identity, Session, SessionError, SessionStore, ValidityPolicy, DEFAULT_SESSION_TTL,
    DEFAULT_SWEEP_INTERVAL,
};
pub use tokens::{
    constant_time_eq, is_well_formed, RandomTokens, TokenSource, TOKEN_ALPHABET, TOKEN_LENGTH,
};
