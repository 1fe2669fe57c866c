#![forbid(unsafe_code)]
//! setflow-operators: ports, the processor contract, and the streaming
//! INTERSECT / EXCEPT operator.
//!
//! Design intent:
//! - Keep this crate pure and synchronous (no async, no threads).
//! - Growing state is charged to `setflow-mem` through a budget guard.
//! - Nodes never block: suspension is expressed through `Status`.

pub mod intersect_except;
pub mod keys;
pub mod port;
pub mod set;
pub mod traits;

pub use intersect_except::{BinaryPorts, IntersectOrExcept, Phase, SetOpStats};
pub use keys::{KeyColumn, KeySpec};
pub use port::{connect, InputPort, OutputPort};
pub use set::{choose_method, SetEngine, SetMethod, SetMode};
pub use traits::{OpError, Processor, Status};
