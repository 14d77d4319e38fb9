pub mod ledger;
pub mod output;
pub mod runner;
pub mod store;
