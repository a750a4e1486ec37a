pub(crate) mod compiler;
pub(crate) mod data;
pub(crate) mod field;
pub(crate) mod gather;
pub(crate) mod hierarchy;
