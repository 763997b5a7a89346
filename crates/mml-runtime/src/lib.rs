mod callable;
mod context;
mod driver;
mod eval;
mod host;
mod rng;

pub use context::{Callable, Context, ContextGuard, Scope};
pub use driver::{run_script, run_source, RunOptions, RunReport};
pub use host::{DocumentStore, MapSourceResolver, MemoryDocumentStore, SourceResolver};
