// Library interface for postgenius modules
// This allows tests and other binaries to import modules

pub mod enrichment;
pub mod generation;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod retrieval;
pub mod server;
pub mod sources;
pub mod vectara;
