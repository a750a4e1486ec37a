pub(crate) mod library;
pub(crate) mod provider;
pub(crate) mod sequence;
