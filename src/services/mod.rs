pub mod collaborators;
pub mod dispatcher;
pub mod enrichment;
pub mod menu_jobs;
pub mod openai;
pub mod photos;
pub mod pipeline;
pub mod prompts;
pub mod storage;
