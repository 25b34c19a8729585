//! epirisk-kb: Static pharmacogenomic knowledge base.
//!
//! Holds the allele/star-allele proxy tables, tag and pair weights, the
//! pathway-burden weight, the drug → pathway-gene map and the drug →
//! alternatives map. Built once at startup and shared read-only.

pub mod knowledge;
pub mod builder;

pub use builder::KnowledgeBaseBuilder;
pub use knowledge::{
    Alternative, DrugEntry, Guidelines, KnowledgeBase, PairWeight, PathwayBurden, TagWeight,
    DEFAULT_KNOWLEDGE_VERSION,
};
