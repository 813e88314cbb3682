use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::{AtlasError, PixelRect};

/// One atlas page as declared by the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasPage {
    /// Atlas slot; also the layer of the page in the GPU texture array.
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

/// Where one source image was packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRegion {
    pub atlas: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ImageRegion {
    #[inline]
    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.x, self.y, self.width, self.height)
    }
}

/// Packing result produced by the offline atlas tool.
///
/// ```json
/// {
///   "atlases": [ { "index": 0, "width": 1024, "height": 1024 } ],
///   "images": {
///     "backpack/diffuse.png": { "atlas": 0, "x": 0, "y": 0, "width": 512, "height": 512 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasDescriptor {
    pub atlases: Vec<AtlasPage>,
    /// Source image id → packed region. Ordered so validation reports are
    /// deterministic.
    pub images: BTreeMap<String, ImageRegion>,
}

impl AtlasDescriptor {
    pub fn from_json_str(json: &str) -> Result<Self, AtlasError> {
        serde_json::from_str(json).map_err(|e| AtlasError::Descriptor(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read atlas descriptor {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("failed to parse atlas descriptor {}", path.display()))
    }

    pub fn page(&self, atlas: u32) -> Option<&AtlasPage> {
        self.atlases.iter().find(|p| p.index == atlas)
    }

    /// Checks the descriptor on its own: unique page indices, every region
    /// inside a described page, no two regions of one page overlapping.
    pub fn validate(&self) -> Result<(), AtlasError> {
        let mut pages: HashMap<u32, AtlasPage> = HashMap::with_capacity(self.atlases.len());
        for page in &self.atlases {
            if pages.insert(page.index, *page).is_some() {
                return Err(AtlasError::DuplicatePage { atlas: page.index });
            }
        }

        let mut per_page: HashMap<u32, Vec<(&str, PixelRect)>> = HashMap::new();
        for (image, region) in &self.images {
            let Some(page) = pages.get(&region.atlas) else {
                return Err(AtlasError::UnknownAtlas {
                    image: image.clone(),
                    atlas: region.atlas,
                });
            };

            let rect = region.rect();
            if rect.is_empty() || !rect.fits_within(page.width, page.height) {
                return Err(AtlasError::RegionOutOfBounds {
                    image: image.clone(),
                    atlas: region.atlas,
                    region: rect,
                });
            }

            per_page
                .entry(region.atlas)
                .or_default()
                .push((image.as_str(), rect));
        }

        for (atlas, mut regions) in per_page {
            // Sweep along x: only regions starting before the current one ends
            // can overlap it.
            regions.sort_by_key(|(_, rect)| rect.x);
            for (i, (first, a)) in regions.iter().enumerate() {
                for (second, b) in &regions[i + 1..] {
                    if b.x as u64 >= a.right() {
                        break;
                    }
                    if a.overlaps(*b) {
                        return Err(AtlasError::OverlappingRegions {
                            atlas,
                            first: first.to_string(),
                            second: second.to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_IMAGES: &str = r#"{
        "atlases": [ { "index": 0, "width": 1024, "height": 512 } ],
        "images": {
            "crate.png": { "atlas": 0, "x": 0, "y": 0, "width": 512, "height": 512 },
            "bulb.png":  { "atlas": 0, "x": 512, "y": 0, "width": 256, "height": 256 }
        }
    }"#;

    fn descriptor(json: &str) -> AtlasDescriptor {
        AtlasDescriptor::from_json_str(json).unwrap()
    }

    // ── parsing ───────────────────────────────────────────────────────────

    #[test]
    fn parses_pages_and_regions() {
        let d = descriptor(TWO_IMAGES);
        assert_eq!(d.atlases, vec![AtlasPage { index: 0, width: 1024, height: 512 }]);
        assert_eq!(d.images["bulb.png"].rect(), PixelRect::new(512, 0, 256, 256));
        assert_eq!(d.page(0).map(|p| p.width), Some(1024));
        assert!(d.page(1).is_none());
    }

    #[test]
    fn malformed_json_is_a_descriptor_error() {
        let err = AtlasDescriptor::from_json_str(r#"{ "atlases": 3 }"#).unwrap_err();
        assert!(matches!(err, AtlasError::Descriptor(_)));
    }

    #[test]
    fn missing_file_has_path_in_context() {
        let err = AtlasDescriptor::from_path("does/not/exist.json").unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.json"));
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn adjacent_regions_validate() {
        assert_eq!(descriptor(TWO_IMAGES).validate(), Ok(()));
    }

    #[test]
    fn overlapping_regions_are_rejected() {
        let mut d = descriptor(TWO_IMAGES);
        d.images.get_mut("bulb.png").unwrap().x = 500;
        assert_eq!(
            d.validate(),
            Err(AtlasError::OverlappingRegions {
                atlas: 0,
                first: "crate.png".to_string(),
                second: "bulb.png".to_string(),
            })
        );
    }

    #[test]
    fn regions_on_different_pages_may_share_coordinates() {
        let mut d = descriptor(TWO_IMAGES);
        d.atlases.push(AtlasPage { index: 1, width: 1024, height: 512 });
        let bulb = d.images.get_mut("bulb.png").unwrap();
        bulb.atlas = 1;
        bulb.x = 0;
        assert_eq!(d.validate(), Ok(()));
    }

    #[test]
    fn region_past_page_edge_is_rejected() {
        let mut d = descriptor(TWO_IMAGES);
        d.images.get_mut("bulb.png").unwrap().y = 300;
        assert!(matches!(
            d.validate(),
            Err(AtlasError::RegionOutOfBounds { ref image, atlas: 0, .. }) if image == "bulb.png"
        ));
    }

    #[test]
    fn empty_region_is_rejected() {
        let mut d = descriptor(TWO_IMAGES);
        d.images.get_mut("bulb.png").unwrap().width = 0;
        assert!(matches!(d.validate(), Err(AtlasError::RegionOutOfBounds { .. })));
    }

    #[test]
    fn region_on_undescribed_atlas_is_rejected() {
        let mut d = descriptor(TWO_IMAGES);
        d.images.get_mut("crate.png").unwrap().atlas = 4;
        assert_eq!(
            d.validate(),
            Err(AtlasError::UnknownAtlas { image: "crate.png".to_string(), atlas: 4 })
        );
    }

    #[test]
    fn duplicate_page_index_is_rejected() {
        let mut d = descriptor(TWO_IMAGES);
        d.atlases.push(AtlasPage { index: 0, width: 8, height: 8 });
        assert_eq!(d.validate(), Err(AtlasError::DuplicatePage { atlas: 0 }));
    }
}
