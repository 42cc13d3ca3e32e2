//! The pipeline graph and everything that fills it in.
//!
//! A [`SuperPipeline`](workflow::SuperPipeline) is turned into a [`PipelineGraph`]
//! of task, file and option nodes by the [`GraphBuilder`]. The [`Resolver`] then
//! assigns values from parameter sets and the command line,
//! [`construct_filenames`] names every file nobody supplied, and the checks in
//! [`validate`](check_consistency) make sure the result is runnable. Finally the
//! tasks are put in [`workflow_order`] and split into phases by the
//! [`ExecutionPlan`].

#[macro_use]
extern crate util;

mod error;
pub use error::Error;

mod graph;
pub use graph::{
    EdgeArgument, EdgeRef, Evaluation, Node, NodeKind, PipelineGraph, StubMember, ValueSource,
};

mod interface;
pub use interface::{Binding, Interface, InterfaceArgument};

mod builder;
pub use builder::{argument_address, GraphBuilder, STUB_DELIM};

mod resolve;
pub use resolve::{expand_lists, Request, Resolver, TaskBlock};

mod multiplicity;
pub use multiplicity::Multiplicity;

mod construct;
pub use construct::{construct_filenames, TOKEN_LEN};

mod validate;
pub use validate::{check_consistency, check_required, check_values};

mod order;
pub use order::workflow_order;

mod plan;
pub use plan::{ExecutionPlan, Phase, RunArgument, TaskPlan, TaskRun};

mod inputs;
pub use inputs::external_inputs;

#[cfg(test)]
mod fixtures;

id!(NodeId, u32);
id!(EdgeId, u32);
id!(AddressId, u32);
