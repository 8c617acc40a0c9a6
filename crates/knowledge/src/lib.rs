//! Reference document collaborators for Dossier.
//!
//! - [`DocumentIndex`]: a directory of `.txt`/`.md` files split into
//!   overlapping chunks and ranked by keyword occurrence
//! - [`RagPipeline`]: retrieval plus a model-written answer grounded in the
//!   retrieved passages
//! - [`FsAssetStore`]: figure files under the data directory

pub mod assets;
pub mod index;
pub mod rag;

pub use assets::FsAssetStore;
pub use index::{split_text, Chunk, DocumentIndex, IndexSettings};
pub use rag::RagPipeline;
