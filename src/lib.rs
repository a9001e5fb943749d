//! # Tailtrack
//!
//! Tailtrack lets a log shipper resume reading an append-only file across restarts and across
//! log rotation (rename and recreate) without re-reading or losing bytes. Consumer-side framing
//! is left to the caller: wrap the reader into `BufReader` or a scanner of your own.
//!
//! * `Tailer` that reads a log file while keeping identity (inode) and offset in a position file.
//! When the file was rotated since the last run, unread bytes of the rotated version are read
//! first, and the stream continues into the new file within the same `read` call.
//!
//! ```rust no_run
//! # use std::io::{BufRead, BufReader};
//! # use tailtrack::{Tailer, TailerError};
//! // running this will print new lines on each execution
//! # fn main() -> Result<(), TailerError> {
//! let mut tailer = Tailer::open("/var/log/mail.log", "/var/lib/shipper/mail.pos")?;
//! let mut reader = BufReader::new(&mut tailer);
//! let mut input = String::new();
//! loop {
//!     input.clear();
//!     match reader.read_line(&mut input)? {
//!         0 => break,
//!         _ => println!("read line: `{}`", input.trim_end()),
//!     };
//! }
//! drop(reader);
//! tailer.close()
//! # }
//! ```
//!
//! * `position::load` and `position::save` to work with the position file directly. Saving is
//! atomic: a crash never leaves a partially written record.
//!
//! ```rust no_run
//! # use std::path::Path;
//! # use tailtrack::position::{self, Loaded};
//! match position::load(Path::new("/var/lib/shipper/mail.pos")) {
//!     Loaded::Restored(position) => println!("resuming at {}", position.offset),
//!     Loaded::Missing | Loaded::Corrupt(_) => println!("starting fresh"),
//! }
//! ```
//!
//! * `Identify` strategy that decides which files are the same. `Inode` is used on unix;
//! `Unidentified` never recognizes a file, so rotation is not detected and only the offset is
//! used.
//!

mod identity;
pub mod path_utils;
pub mod position;
pub mod resolver;
mod tailer;

#[cfg(unix)]
pub use identity::Inode;
pub use identity::{Identify, Identity, PlatformIdentity, Unidentified};
pub use position::{Loaded, Position, PositionError};
pub use tailer::{Mode, Tailer, TailerError};
