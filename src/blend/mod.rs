pub(crate) mod accumulator;
pub(crate) mod channel;
pub(crate) mod decompose;
pub(crate) mod results;
