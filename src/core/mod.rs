pub mod aggregate;
pub mod categorize;
pub mod config;
pub mod dedupe;
pub mod feed;
pub mod filter;
pub mod importer;
pub mod publish;
pub mod text;
