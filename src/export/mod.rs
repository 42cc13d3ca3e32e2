/// Graphviz rendering of the pipeline graph
mod dot;
pub use dot::dot;

/// Saving resolved arguments as a parameter set
mod parameter_set;
pub use parameter_set::parameter_set;
