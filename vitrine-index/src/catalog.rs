//! Catalog loading: a JSON product file, or the seeded demo catalog

use crate::error::IndexError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use vitrine_core::math::l2_norm;
use vitrine_core::{CatalogEntry, Embedder, Embedding, NORM_TOLERANCE};

/// Seed of the demo catalog's random vectors.
pub const DEMO_SEED: u64 = 42;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Wrapped { products: Vec<RawEntry> },
    List(Vec<RawEntry>),
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(alias = "id")]
    product_id: u64,
    name: String,
    image_url: String,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    /// Product photo to embed at load time, relative to the catalog file.
    #[serde(default)]
    image_path: Option<PathBuf>,
}

/// Load a catalog file. Entries carry either a precomputed `embedding`
/// (normalized on load) or an `image_path` embedded with `embedder`.
///
/// Accepts `{"products": [...]}` or a bare array of entries.
pub fn load_catalog(
    path: &Path,
    dimension: usize,
    embedder: Option<&dyn Embedder>,
) -> Result<Vec<CatalogEntry>, IndexError> {
    let content = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let entries = parse_catalog(&content, base_dir, dimension, embedder)?;
    info!("Loaded {} catalog entries from {:?}", entries.len(), path);
    Ok(entries)
}

/// Parse catalog JSON, resolving `image_path` against `base_dir`.
pub fn parse_catalog(
    json: &str,
    base_dir: &Path,
    dimension: usize,
    embedder: Option<&dyn Embedder>,
) -> Result<Vec<CatalogEntry>, IndexError> {
    let raw = match serde_json::from_str::<CatalogFile>(json)? {
        CatalogFile::Wrapped { products } => products,
        CatalogFile::List(products) => products,
    };

    raw.into_iter()
        .map(|entry| resolve_entry(entry, base_dir, dimension, embedder))
        .collect()
}

fn resolve_entry(
    entry: RawEntry,
    base_dir: &Path,
    dimension: usize,
    embedder: Option<&dyn Embedder>,
) -> Result<CatalogEntry, IndexError> {
    let embedding = match (entry.embedding, entry.image_path) {
        (Some(vector), _) => {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            let norm = l2_norm(&vector);
            if (norm - 1.0).abs() >= NORM_TOLERANCE as f64 {
                warn!(
                    "Product {} embedding has norm {:.4}, normalizing",
                    entry.product_id, norm
                );
            }
            Embedding::from_raw(vector)?
        }
        (None, Some(image_path)) => {
            let embedder = embedder.ok_or_else(|| {
                IndexError::InvalidEntry(format!(
                    "product {} needs an embedder to embed {:?}",
                    entry.product_id, image_path
                ))
            })?;
            if embedder.dimension() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: embedder.dimension(),
                });
            }

            let full_path = base_dir.join(&image_path);
            let image = image::open(&full_path)
                .map_err(|e| {
                    IndexError::InvalidEntry(format!(
                        "product {}: cannot read {:?}: {}",
                        entry.product_id, full_path, e
                    ))
                })?
                .to_rgb8();
            embedder.embed(&image)?
        }
        (None, None) => {
            return Err(IndexError::InvalidEntry(format!(
                "product {} has neither embedding nor image_path",
                entry.product_id
            )))
        }
    };

    Ok(CatalogEntry {
        product_id: entry.product_id,
        name: entry.name,
        image_url: entry.image_url,
        embedding,
    })
}

/// Two-product demo catalog with deterministic random unit vectors.
pub fn demo_catalog(dimension: usize) -> Result<Vec<CatalogEntry>, IndexError> {
    if dimension == 0 {
        return Err(IndexError::InvalidDimension(dimension));
    }

    let mut rng = StdRng::seed_from_u64(DEMO_SEED);
    let products = [
        (1, "Designer Handbag", "http://example.com/handbag.jpg"),
        (2, "Modern Chair", "http://example.com/chair.jpg"),
    ];

    products
        .into_iter()
        .map(|(product_id, name, image_url)| -> Result<CatalogEntry, IndexError> {
            let raw: Vec<f32> = (0..dimension).map(|_| rng.gen::<f32>()).collect();
            Ok(CatalogEntry {
                product_id,
                name: name.to_string(),
                image_url: image_url.to_string(),
                embedding: Embedding::from_raw(raw)?,
            })
        })
        .collect()
}
