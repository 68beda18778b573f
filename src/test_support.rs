//! Shared fixtures: six cells, three genes, two embeddings

use crate::dataframe::ColumnType;
use crate::matrix::{AnnoMatrix, ColumnSchema, Geneset, InMemoryTransport, Loader, Schema};
use polars::prelude::*;
use std::sync::Arc;

pub fn sample_schema() -> Schema {
    Schema {
        n_obs: 6,
        n_var: 3,
        obs_index: "cell".to_string(),
        var_index: "gene".to_string(),
        obs: vec![
            ColumnSchema::new("cell", ColumnType::String),
            ColumnSchema::new("n_genes", ColumnType::Int32),
            ColumnSchema::categorical("louvain", vec!["0", "1", "2"]),
            ColumnSchema::new("percent_mito", ColumnType::Float32),
        ],
        var: vec![ColumnSchema::new("gene", ColumnType::String)],
        embeddings: vec!["umap".to_string(), "tsne".to_string()],
        genesets: vec![Geneset {
            name: "mean_ab".to_string(),
            genes: vec!["GENE_A".to_string(), "GENE_B".to_string()],
        }],
    }
}

/// Transport serving the sample data
///
/// - `n_genes` is 100, 200, .. 600
/// - `louvain` cycles through "0", "1", "2"
/// - `GENE_A` is 0..=5, `GENE_B` is constant 1
/// - `umap` puts row `i` at `(i, i)`; `tsne` lacks coordinates for rows 1 and 4
pub fn sample_transport() -> InMemoryTransport {
    let obs = df!(
        "cell" => ["c0", "c1", "c2", "c3", "c4", "c5"],
        "n_genes" => [100i32, 200, 300, 400, 500, 600],
        "louvain" => ["0", "1", "2", "0", "1", "2"],
        "percent_mito" => [0.01f32, 0.02, 0.05, 0.03, 0.04, 0.10],
    )
    .unwrap();
    let var = df!("gene" => ["GENE_A", "GENE_B", "GENE_C"]).unwrap();
    let x = df!(
        "GENE_A" => [0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0],
        "GENE_B" => [1.0f32; 6],
        "GENE_C" => [3.5f32, 0.0, 0.0, 7.25, 0.0, 1.0],
    )
    .unwrap();
    let umap = df!(
        "umap_0" => [0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0],
        "umap_1" => [0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0],
    )
    .unwrap();
    let tsne = df!(
        "tsne_0" => [0.5f32, f32::NAN, -1.0, 2.0, 0.0, 3.0],
        "tsne_1" => [0.5f32, 1.0, -1.0, 2.0, f32::NAN, 3.0],
    )
    .unwrap();

    InMemoryTransport::new()
        .with_obs(obs)
        .with_var(var)
        .with_x(x)
        .with_embedding("umap", umap)
        .with_embedding("tsne", tsne)
}

pub fn sample_matrix() -> AnnoMatrix {
    AnnoMatrix::new(Loader::new(sample_schema(), Arc::new(sample_transport())).unwrap())
}

/// Matrix of `n_obs` cells without any data behind it
pub fn empty_matrix(n_obs: usize) -> AnnoMatrix {
    let schema = Schema {
        n_obs,
        n_var: 0,
        obs_index: "cell".to_string(),
        var_index: "gene".to_string(),
        obs: Vec::new(),
        var: Vec::new(),
        embeddings: Vec::new(),
        genesets: Vec::new(),
    };
    AnnoMatrix::new(Loader::new(schema, Arc::new(InMemoryTransport::new())).unwrap())
}
