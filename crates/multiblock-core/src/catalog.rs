use crate::geometry::{BlockRules, Geometry, GeometryFamily};
use crate::id::{BlockTypeId, KindId};
use crate::position::Axis;
use std::collections::HashMap;

/// A plain block type known to the catalog.
#[derive(Debug, Clone)]
pub struct BlockDef {
    pub name: String,
}

/// A structure kind (controller type) definition.
#[derive(Debug, Clone)]
pub struct KindDef {
    pub name: String,
    pub geometry: Geometry,
    pub blocks: BlockRules,
}

/// Builder for constructing an immutable Catalog.
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    blocks: Vec<BlockDef>,
    block_name_to_id: HashMap<String, BlockTypeId>,
    kinds: Vec<KindDef>,
    kind_name_to_id: HashMap<String, KindId>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Register a plain block type. Returns its ID.
    ///
    /// Registering the same name twice returns the existing ID.
    pub fn register_block(&mut self, name: &str) -> BlockTypeId {
        if let Some(&id) = self.block_name_to_id.get(name) {
            return id;
        }
        let id = BlockTypeId(self.blocks.len() as u32);
        self.blocks.push(BlockDef {
            name: name.to_string(),
        });
        self.block_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Phase 1: Register a structure kind. Returns its ID.
    pub fn register_kind(
        &mut self,
        name: &str,
        geometry: Geometry,
        blocks: BlockRules,
    ) -> Result<KindId, CatalogError> {
        if self.kind_name_to_id.contains_key(name) {
            return Err(CatalogError::DuplicateKind(name.to_string()));
        }
        let id = KindId(self.kinds.len() as u32);
        self.kinds.push(KindDef {
            name: name.to_string(),
            geometry,
            blocks,
        });
        self.kind_name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Phase 2: Mutate an existing kind by name.
    pub fn mutate_kind<F>(&mut self, name: &str, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut KindDef),
    {
        let id = self
            .kind_name_to_id
            .get(name)
            .ok_or(CatalogError::NotFound(name.to_string()))?;
        f(&mut self.kinds[id.0 as usize]);
        Ok(())
    }

    pub fn block_id(&self, name: &str) -> Option<BlockTypeId> {
        self.block_name_to_id.get(name).copied()
    }

    pub fn kind_id(&self, name: &str) -> Option<KindId> {
        self.kind_name_to_id.get(name).copied()
    }

    /// Phase 3: Finalize and build the immutable catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        for kind in &self.kinds {
            for axis in Axis::ALL {
                let min = kind.geometry.min_size.get(axis);
                let max = kind.geometry.max_size.get(axis);
                if min == 0 || min > max {
                    return Err(CatalogError::InvalidSizeLimits {
                        kind: kind.name.clone(),
                        axis,
                        min,
                        max,
                    });
                }
            }

            let rules = &kind.blocks;
            for filter in [&rules.frame, &rules.top, &rules.bottom, &rules.sides, &rules.interior] {
                if let Some(block) = filter
                    .blocks
                    .iter()
                    .find(|b| b.0 as usize >= self.blocks.len())
                {
                    return Err(CatalogError::InvalidBlockRef {
                        kind: kind.name.clone(),
                        block: *block,
                    });
                }
            }
        }

        Ok(Catalog {
            blocks: self.blocks,
            block_name_to_id: self.block_name_to_id,
            kinds: self.kinds,
            kind_name_to_id: self.kind_name_to_id,
        })
    }
}

/// Immutable catalog of block types and structure kinds. Frozen after
/// build(); shared between worlds behind an `Arc`.
#[derive(Debug)]
pub struct Catalog {
    blocks: Vec<BlockDef>,
    block_name_to_id: HashMap<String, BlockTypeId>,
    kinds: Vec<KindDef>,
    kind_name_to_id: HashMap<String, KindId>,
}

impl Catalog {
    pub fn get_kind(&self, id: KindId) -> Option<&KindDef> {
        self.kinds.get(id.0 as usize)
    }

    pub fn get_block(&self, id: BlockTypeId) -> Option<&BlockDef> {
        self.blocks.get(id.0 as usize)
    }

    pub fn kind_id(&self, name: &str) -> Option<KindId> {
        self.kind_name_to_id.get(name).copied()
    }

    pub fn block_id(&self, name: &str) -> Option<BlockTypeId> {
        self.block_name_to_id.get(name).copied()
    }

    pub fn family(&self, id: KindId) -> Option<GeometryFamily> {
        self.get_kind(id).map(|kind| kind.geometry.family)
    }

    /// Whether parts of kinds `a` and `b` may share a controller: same kind
    /// and same geometry family.
    pub fn compatible(&self, a: KindId, b: KindId) -> bool {
        a == b && self.family(a).is_some() && self.family(a) == self.family(b)
    }

    pub fn kind_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate structure kind: {0}")]
    DuplicateKind(String),
    #[error("kind '{kind}' has invalid size limits along {axis}: min {min}, max {max}")]
    InvalidSizeLimits {
        kind: String,
        axis: Axis,
        min: u32,
        max: u32,
    },
    #[error("kind '{kind}' references unknown block {block:?}")]
    InvalidBlockRef { kind: String, block: BlockTypeId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{AxisSizes, BlockFilter};

    fn setup_builder() -> CatalogBuilder {
        let mut b = CatalogBuilder::new();
        let casing = b.register_block("casing");
        let glass = b.register_block("glass");
        b.register_kind(
            "reactor",
            Geometry::cuboid(AxisSizes::uniform(3), AxisSizes::uniform(7)),
            BlockRules {
                frame: BlockFilter::any_of([casing]),
                sides: BlockFilter::any_of([casing, glass]),
                ..BlockRules::parts_only()
            },
        )
        .unwrap();
        b.register_kind(
            "tank",
            Geometry::shell(AxisSizes::uniform(3), AxisSizes::uniform(9)),
            BlockRules::parts_only(),
        )
        .unwrap();
        b
    }

    #[test]
    fn register_and_build() {
        let catalog = setup_builder().build().unwrap();
        assert_eq!(catalog.block_count(), 2);
        assert_eq!(catalog.kind_count(), 2);
    }

    #[test]
    fn lookup_by_name() {
        let catalog = setup_builder().build().unwrap();
        assert_eq!(catalog.kind_id("reactor"), Some(KindId(0)));
        assert_eq!(catalog.block_id("glass"), Some(BlockTypeId(1)));
        assert!(catalog.kind_id("nonexistent").is_none());
        let reactor = catalog.get_kind(KindId(0)).unwrap();
        assert_eq!(reactor.name, "reactor");
        assert_eq!(catalog.get_block(BlockTypeId(0)).unwrap().name, "casing");
    }

    #[test]
    fn register_block_is_idempotent() {
        let mut b = CatalogBuilder::new();
        let a = b.register_block("casing");
        let again = b.register_block("casing");
        assert_eq!(a, again);
        assert_eq!(b.build().unwrap().block_count(), 1);
    }

    #[test]
    fn duplicate_kind_rejected() {
        let mut b = setup_builder();
        let result = b.register_kind(
            "reactor",
            Geometry::cuboid(AxisSizes::uniform(1), AxisSizes::uniform(1)),
            BlockRules::default(),
        );
        assert!(matches!(result, Err(CatalogError::DuplicateKind(name)) if name == "reactor"));
    }

    #[test]
    fn mutate_kind() {
        let mut b = setup_builder();
        b.mutate_kind("reactor", |kind| kind.geometry.min_parts = 26).unwrap();
        let catalog = b.build().unwrap();
        assert_eq!(catalog.get_kind(KindId(0)).unwrap().geometry.min_parts, 26);
    }

    #[test]
    fn mutate_nonexistent_fails() {
        let mut b = setup_builder();
        let result = b.mutate_kind("nonexistent", |_| {});
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn compatibility_requires_same_kind_and_family() {
        let catalog = setup_builder().build().unwrap();
        assert!(catalog.compatible(KindId(0), KindId(0)));
        assert!(!catalog.compatible(KindId(0), KindId(1)));
        assert!(!catalog.compatible(KindId(9), KindId(9)));
        assert_eq!(catalog.family(KindId(1)), Some(GeometryFamily::Shell));
    }

    #[test]
    fn inverted_size_limits_fail() {
        let mut b = CatalogBuilder::new();
        b.register_kind(
            "bad",
            Geometry::cuboid(AxisSizes::new(3, 5, 3), AxisSizes::new(3, 4, 3)),
            BlockRules::default(),
        )
        .unwrap();
        match b.build() {
            Err(CatalogError::InvalidSizeLimits { axis, min, max, .. }) => {
                assert_eq!(axis, Axis::Y);
                assert_eq!((min, max), (5, 4));
            }
            other => panic!("expected InvalidSizeLimits, got: {other:?}"),
        }
    }

    #[test]
    fn zero_min_size_fails() {
        let mut b = CatalogBuilder::new();
        b.register_kind(
            "flat",
            Geometry::cuboid(AxisSizes::new(0, 1, 1), AxisSizes::uniform(4)),
            BlockRules::default(),
        )
        .unwrap();
        assert!(b.build().is_err());
    }

    #[test]
    fn unknown_block_reference_fails() {
        let mut b = CatalogBuilder::new();
        b.register_kind(
            "bad",
            Geometry::cuboid(AxisSizes::uniform(1), AxisSizes::uniform(4)),
            BlockRules {
                top: BlockFilter::any_of([BlockTypeId(999)]),
                ..BlockRules::default()
            },
        )
        .unwrap();
        let err = b.build().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown block"), "got: {msg}");
    }

    #[test]
    fn empty_catalog_builds_successfully() {
        let catalog = CatalogBuilder::new().build().unwrap();
        assert_eq!(catalog.kind_count(), 0);
        assert!(catalog.get_kind(KindId(0)).is_none());
    }
}
