//! Remote command channel.
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌──────────────────────────┐
//! │ Transport │──▶│  Codec   │──▶│ Dispatcher → NodeService │
//! │ (trait)   │◀──│ (framing)│◀──│   (JSON request/reply)   │
//! └───────────┘   └──────────┘   └──────────────────────────┘
//! ```

pub mod codec;
pub mod dispatcher;
pub mod transport;
