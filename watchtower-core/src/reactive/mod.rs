//! Reactive Primitives
//!
//! This module implements the data side of the system: the subject that
//! watchers subscribe to ([`Dep`]), the evaluation stack that tells a read
//! who is reading ([`ReactiveContext`]), and the wrapper that turns plain
//! data into tracked data ([`observe`], [`Record`], [`List`]).
//!
//! # Concepts
//!
//! ## Deps
//!
//! A dep is the notification point for one reactive location. Each record
//! key owns one; each observed record or list owns one more for its own
//! identity.
//!
//! ## Records and Lists
//!
//! Reads and writes go through explicit accessors. `Record::get` records a
//! dependency on the key, `Record::set` notifies it. Lists are tracked as a
//! whole: the mutators notify the list's dep, index reads do not track.
//!
//! # Implementation Notes
//!
//! Everything here is single-threaded (`Rc`, `RefCell`) and the tracking
//! context is thread-local. Separate threads are separate reactive worlds.

mod context;
mod dep;
mod list;
mod observer;
mod path;
mod record;
mod subscriber;
mod traverse;
mod value;

pub use context::{untracked, ReactiveContext};
pub use dep::Dep;
pub use list::List;
pub use observer::{observe, reactive, Observer};
pub use path::{parse_path, resolve};
pub use record::Record;
pub use subscriber::{Subscriber, WatcherId};
pub use traverse::traverse;
pub use value::Value;
