mod hnsw_ann_index;
mod in_memory_vector_repository;
mod lancedb_vector_repository;
mod mock_embedding;
mod mock_reranking;
mod ort_embedding;
mod ort_reranking;
mod rule_based_query_expander;
mod sqlite_ast_graph_repository;
mod treesitter_parser;

pub use hnsw_ann_index::*;
pub use in_memory_vector_repository::*;
pub use lancedb_vector_repository::*;
pub use mock_embedding::*;
pub use mock_reranking::*;
pub use ort_embedding::*;
pub use ort_reranking::*;
pub use rule_based_query_expander::*;
pub use sqlite_ast_graph_repository::*;
pub use treesitter_parser::*;
