//! Everything that happens before a graph is built: finding tool and
//! pipeline configurations, and assembling a root pipeline together with
//! every pipeline nested inside it into a tiered [`SuperPipeline`].

#[macro_use]
extern crate util;

mod error;
pub use error::Error;

mod library;
pub use library::Library;

mod super_pipeline;
pub use super_pipeline::{AssembledTask, SuperPipeline, TieredPipeline};

id!(PipelineId, u16);
id!(TaskId, u32);

/// Separates the parts of a nested task or node address, e.g. "align.call.sort".
pub const ADDRESS_DELIM: char = '.';

/// Join a pipeline's address prefix and a local name into a full address.
pub fn join_address(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_owned()
    } else {
        format!("{prefix}{ADDRESS_DELIM}{local}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_join_address() {
        assert_eq!(join_address("", "map"), "map");
        assert_eq!(join_address("call", "sort"), "call.sort");
        assert_eq!(join_address("call.sub", "bam"), "call.sub.bam");
    }
}
