pub(crate) mod context;
pub(crate) mod ledger;
pub(crate) mod registry;
pub(crate) mod updater;
pub(crate) mod volatility;
