//! The Flight wire protocol.
//!
//! A rendered [`Node`](crate::tree::Node) tree travels as newline-delimited
//! chunks, `<id><kind><json>`:
//!
//! ```text
//! 1M{"id":"components/counter.tsx","name":"default"}
//! 2E{"digest":"4f1c2b9a0e","message":"comments unavailable"}
//! 0J["$","main",null,{},[["$","$L1",null,{"start":1},[]],"$2"]]
//! ```
//!
//! | Kind | Payload |
//! |------|---------|
//! | `J` | JSON tree fragment |
//! | `M` | client module reference: module id + export name |
//! | `S` | built-in element kind, e.g. `"fragment"` |
//! | `E` | render failure: message + digest |
//!
//! Inside a `J` fragment an element is `["$", tag, key, props, children]`.
//! Strings starting with `$` are tokens:
//!
//! - `"$<n>"` in node position: the node in chunk `n` (`J` or `E`)
//! - `"$<n>"` in children position: the child list in `J` chunk `n`
//! - `"$L<n>"` as a tag: the client module in `M` chunk `n`
//! - `"$S<n>"` as a tag: the symbol in `S` chunk `n`
//! - `"$$..."`: a literal string that starts with `$`
//!
//! A chunk only references chunks that appear before it in the stream, so a
//! reader can resolve every line as it arrives. The root is always id 0 and is
//! written last.

pub mod chunk;
pub mod decode;
pub mod encode;

pub use chunk::{Chunk, ChunkKind, DecodeError};
pub use decode::{Decoded, LazyLoader, LazyModule, ModuleLoader, decode};
pub use encode::encode;
