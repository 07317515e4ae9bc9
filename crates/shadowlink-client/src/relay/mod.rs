//! Per-connection relay engine.
//!
//! A [`RelaySession`] ties one accepted local connection to at most one
//! upstream connection:
//!
//! ```text
//! IDLE --first client event--> CONNECTING --dial ok--> RELAYING --close/error/idle--> CLOSED
//!                                   \--dial failed------------------------------------^
//! ```
//!
//! Client bytes that arrive before the dial completes are queued and sent,
//! in order, right after the SOCKS5 success reply. The first non-empty
//! outbound frame carries the destination address header; every frame is
//! encrypted through the connection's cipher. All endings go through the
//! [`TeardownCoordinator`].

mod context;
mod framing;
mod pump;
mod session;
mod teardown;

pub use context::ClientConnection;
pub use framing::encode_frame;
pub use session::{RelayConfig, RelaySession, SessionState, SessionSummary};
pub use teardown::TeardownCoordinator;
