pub mod config;
pub mod dates;
pub mod export;
pub mod fetch;
pub mod provider;
pub mod session;
pub mod vintages;
