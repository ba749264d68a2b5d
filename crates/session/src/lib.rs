//! Coverreel Session
//!
//! Session-scoped state that sits between a front end and the core:
//! whether a cover is stored, which audio is selected, whether a video
//! is being produced, and the latest produced artifact. Front ends
//! observe it through a stream of [`SessionEvent`]s.

pub mod discover;
pub mod events;
pub mod session;

pub use discover::*;
pub use events::*;
pub use session::*;
