pub mod enrichment;
pub mod extraction;
pub mod job;
mod lenient;
pub mod menu;
pub mod session;
