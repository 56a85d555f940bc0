//! Application runtime composition modules.

pub(crate) mod input_processor;
pub(crate) mod report;
pub(crate) mod runtime;
