//! Resolution pipeline: reads data files, resolves cross-references, builds
//! the catalog.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus [`load_definitions`], which turns a
//! directory of data files into a frozen [`Catalog`] and reconcile settings.

use crate::schema::{BlockData, FilterData, PartTemplateData, SettingsData, StructureData};
use multiblock_core::catalog::{Catalog, CatalogBuilder, CatalogError};
use multiblock_core::config::ReconcileConfig;
use multiblock_core::geometry::{BlockFilter, BlockRules, Geometry, GeometryFamily, Placement};
use multiblock_core::id::{BlockTypeId, KindId};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The resolved definitions were rejected by the catalog.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = &found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// A named part type resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTemplate {
    pub name: String,
    pub kind: KindId,
    pub placement: Placement,
}

/// Everything loaded from a definitions directory.
#[derive(Debug)]
pub struct Definitions {
    pub catalog: Arc<Catalog>,
    pub config: ReconcileConfig,
    pub parts: Vec<PartTemplate>,
}

impl Definitions {
    pub fn part(&self, name: &str) -> Option<&PartTemplate> {
        self.parts.iter().find(|p| p.name == name)
    }
}

/// Load every definition file in `dir`.
///
/// `structures.*` is required. `blocks.*`, `parts.*` and `settings.*` are
/// optional; missing settings fall back to [`ReconcileConfig::default`].
pub fn load_definitions(dir: &Path) -> Result<Definitions, DataLoadError> {
    let mut builder = CatalogBuilder::new();

    // Blocks.
    let mut block_ids: HashMap<String, BlockTypeId> = HashMap::new();
    if let Some(path) = find_data_file(dir, "blocks")? {
        let blocks: Vec<BlockData> = deserialize_list(&path, "blocks")?;
        for block in blocks {
            check_duplicate(&block_ids, &block.name, &path)?;
            let id = builder.register_block(&block.name);
            block_ids.insert(block.name, id);
        }
    }

    // Structures.
    let path = require_data_file(dir, "structures")?;
    let structures: Vec<StructureData> = deserialize_list(&path, "structures")?;
    let mut kind_ids: HashMap<String, KindId> = HashMap::new();
    for structure in structures {
        check_duplicate(&kind_ids, &structure.name, &path)?;
        let min_size = structure.min_size.to_sizes();
        let max_size = structure.max_size.to_sizes();
        let geometry = match structure.shape {
            GeometryFamily::Cuboid => Geometry::cuboid(min_size, max_size),
            GeometryFamily::Shell => Geometry::shell(min_size, max_size),
        }
        .with_min_parts(structure.min_parts);

        let rules = &structure.blocks;
        let blocks = BlockRules {
            frame: resolve_filter(&rules.frame, &block_ids, &path)?,
            top: resolve_filter(&rules.top, &block_ids, &path)?,
            bottom: resolve_filter(&rules.bottom, &block_ids, &path)?,
            sides: resolve_filter(&rules.sides, &block_ids, &path)?,
            interior: resolve_filter(&rules.interior, &block_ids, &path)?,
        };
        let id = builder.register_kind(&structure.name, geometry, blocks)?;
        kind_ids.insert(structure.name, id);
    }

    // Part templates.
    let mut parts = Vec::new();
    if let Some(path) = find_data_file(dir, "parts")? {
        let templates: Vec<PartTemplateData> = deserialize_list(&path, "parts")?;
        let mut seen: HashMap<String, KindId> = HashMap::new();
        for template in templates {
            check_duplicate(&seen, &template.name, &path)?;
            let kind = *resolve_name(&kind_ids, &template.structure, &path, "structure")?;
            seen.insert(template.name.clone(), kind);
            parts.push(PartTemplate {
                name: template.name,
                kind,
                placement: template.placement.to_placement(),
            });
        }
    }

    // Settings.
    let config = match find_data_file(dir, "settings")? {
        Some(path) => deserialize_file::<SettingsData>(&path)?.to_config(),
        None => ReconcileConfig::default(),
    };

    let catalog = builder.build()?;
    tracing::debug!(
        blocks = catalog.block_count(),
        kinds = catalog.kind_count(),
        parts = parts.len(),
        interval = config.interval,
        "definitions loaded"
    );

    Ok(Definitions {
        catalog: Arc::new(catalog),
        config,
        parts,
    })
}

fn resolve_filter(
    data: &FilterData,
    block_ids: &HashMap<String, BlockTypeId>,
    file: &Path,
) -> Result<BlockFilter, DataLoadError> {
    let mut blocks = Vec::with_capacity(data.blocks.len());
    for name in &data.blocks {
        blocks.push(*resolve_name(block_ids, name, file, "block")?);
    }
    let filter = BlockFilter::any_of(blocks);
    Ok(if data.allow_empty { filter.or_empty() } else { filter })
}

// ===========================================================================
// Tests
// ===========================================================================
