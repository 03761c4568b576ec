//! Tansive Events — the in-process, topic-keyed pub/sub bus (C13).
//!
//! Used by the interactive NDJSON streamer (`GET`/`POST /sessions` on the
//! Runtime) and by child-process output routing: session components
//! publish onto `session-log/<id>` and `interactive-log/<id>` without
//! knowing who, if anyone, is subscribed.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod bus;
pub mod event;
pub mod topic;

pub use bus::{recv_lenient, EventBus, DEFAULT_BUF_SIZE};
pub use event::Event;
pub use topic::Topic;
