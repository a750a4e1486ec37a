pub(crate) mod components;
pub(crate) mod entity;
pub(crate) mod linker;
pub(crate) mod registry;
pub(crate) mod runner;
pub(crate) mod store;
pub(crate) mod system;
