//! Portal HTTP server
//!
//! Routes, the guard middleware that runs each route's authorization chain,
//! and the server lifecycle (listener plus session sweep).

mod cookies;
pub mod guard;
pub mod handlers;
mod router;
mod state;
pub mod transport;

pub use guard::{Actor, ContextSource, Guard, MAX_BODY_BYTES};
pub use handlers::{LoginResponse, PasswordResponse, WelcomeResponse};
pub use router::{create_router, Chains};
pub use state::{HttpSettings, PortalState};
pub use transport::{PortalServer, PortalServerConfig};
