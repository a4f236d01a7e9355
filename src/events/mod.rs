//! # Events Module
//!
//! Low-level progress events emitted by `core` primitives (scanning,
//! hashing, comparison). Job processors in `jobs::registry` subscribe to
//! these internally and translate them into the job framework's own
//! progress shape published by `jobs::publisher`.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Scan(e) => println!("{:?}", e),
//!             _ => {}
//!         }
//!     }
//! });
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
