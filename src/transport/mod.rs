//! Tokio transport layer.
//!
//! This module binds the sans-IO connection state machine to real
//! WebSockets, timers and channels.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Caller         │                              │  Servers        │
//! │                 │        RelayCommand          │                 │
//! │  Relay handle   │─────────────────────────────►│  WebSocket      │
//! │  SocketEvent rx │◄─────────────────────────────│  endpoints      │
//! │                 │        SocketEvent           │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! 1. `Relay::builder().url(..).spawn()` - start the event loop
//! 2. The control connection dials and the subscription layer comes up
//! 3. `Relay::open` / `send` / `close` - drive additional connections
//! 4. `Relay::subscribe` / `reconcile` - declare topic interest
//! 5. `Relay::shutdown` - terminate the loop and close sockets
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `relay` | Event loop, dial tasks and read pumps |
//! | `scheduler` | Timer execution for delay commands |

// ============================================================================
// Submodules
// ============================================================================

/// Event loop, dial tasks and read pumps.
pub mod relay;

/// Timer execution for delay commands.
pub mod scheduler;

// ============================================================================
// Re-exports
// ============================================================================

pub use relay::{Relay, RelayBuilder};
pub use scheduler::DelayScheduler;
