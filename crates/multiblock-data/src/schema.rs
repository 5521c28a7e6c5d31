//! Serde data file structs for multiblock definitions.
//!
//! These structs define the on-disk format for block types, structure kinds,
//! part templates and reconcile settings. They are deserialized from RON,
//! JSON, or TOML data files and then resolved into core types by the loader.

use multiblock_core::config::{DEFAULT_INTERVAL, MergePolicy, ReconcileConfig};
use multiblock_core::geometry::{AxisSizes, GeometryFamily, Placement};
use serde::Deserialize;

// ===========================================================================
// Blocks
// ===========================================================================

/// A plain block type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockData {
    pub name: String,
}

// ===========================================================================
// Structures
// ===========================================================================

/// A structure kind definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct StructureData {
    pub name: String,
    #[serde(default = "default_shape")]
    pub shape: GeometryFamily,
    pub min_size: SizeData,
    pub max_size: SizeData,
    #[serde(default = "default_min_parts")]
    pub min_parts: usize,
    #[serde(default)]
    pub blocks: BlockRulesData,
}

fn default_shape() -> GeometryFamily {
    GeometryFamily::Cuboid
}

fn default_min_parts() -> usize {
    1
}

/// Size limits, either one value for every axis or one per axis.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum SizeData {
    /// Short form: `3` means 3 along x, y and z.
    Uniform(u32),
    /// Full form: `{ x = 3, y = 5, z = 3 }`.
    PerAxis { x: u32, y: u32, z: u32 },
}

impl SizeData {
    pub fn to_sizes(self) -> AxisSizes {
        match self {
            SizeData::Uniform(size) => AxisSizes::uniform(size),
            SizeData::PerAxis { x, y, z } => AxisSizes::new(x, y, z),
        }
    }
}

/// Which plain blocks may fill each class of cell that holds no part.
/// Block names are resolved against the block list by the loader.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockRulesData {
    #[serde(default)]
    pub frame: FilterData,
    #[serde(default)]
    pub top: FilterData,
    #[serde(default)]
    pub bottom: FilterData,
    #[serde(default)]
    pub sides: FilterData,
    #[serde(default = "default_interior")]
    pub interior: FilterData,
}

/// Omitted rules require parts everywhere on the surface and allow an empty
/// interior.
impl Default for BlockRulesData {
    fn default() -> Self {
        Self {
            frame: FilterData::default(),
            top: FilterData::default(),
            bottom: FilterData::default(),
            sides: FilterData::default(),
            interior: default_interior(),
        }
    }
}

fn default_interior() -> FilterData {
    FilterData {
        blocks: Vec::new(),
        allow_empty: true,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterData {
    #[serde(default)]
    pub blocks: Vec<String>,
    #[serde(default)]
    pub allow_empty: bool,
}

// ===========================================================================
// Part templates
// ===========================================================================

/// A named part type (what a host block registers as) in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct PartTemplateData {
    pub name: String,
    /// Name of the structure kind this part joins.
    pub structure: String,
    #[serde(default)]
    pub placement: PlacementData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementData {
    #[default]
    Anywhere,
    Surface,
    Faces,
    Frame,
    Interior,
}

impl PlacementData {
    pub fn to_placement(self) -> Placement {
        match self {
            PlacementData::Anywhere => Placement::ANYWHERE,
            PlacementData::Surface => Placement::SURFACE,
            PlacementData::Faces => Placement::FACES,
            PlacementData::Frame => Placement::FRAME,
            PlacementData::Interior => Placement::INTERIOR,
        }
    }
}

// ===========================================================================
// Settings
// ===========================================================================

/// Reconcile settings in a data file. Every field is optional.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SettingsData {
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub merge_policy: MergePolicy,
}

fn default_interval() -> u32 {
    DEFAULT_INTERVAL
}

impl SettingsData {
    pub fn to_config(self) -> ReconcileConfig {
        ReconcileConfig::default()
            .with_interval(self.interval)
            .with_merge_policy(self.merge_policy)
    }
}
