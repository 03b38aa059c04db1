//! Region-specific corrections to world and datacenter rows.
//!
//! Chinese-region clients ship sheets where the local datacenters are neither
//! public nor named correctly. This module rewrites the affected rows from a
//! manifest: either `server.json` next to the other assets, or an embedded copy
//! used when no file is available.

use std::{fs, path::Path};

use eyre::{Result, WrapErr};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::{
    catalog::{AssetCatalog, DataCenterRef},
    language::Language,
};

/// Region code written to every patched datacenter row. Sits outside the range of
/// codes the sheets ship with, so patched rows are recognisable.
pub const CUSTOM_REGION: u8 = 5;

/// A world entry inside a manifest datacenter group.
#[derive(Clone, Debug, Deserialize)]
pub struct ManifestWorld {
    #[serde(rename = "name_chs")]
    pub name: String,

    pub id: u32,
}

/// One datacenter group from the region manifest.
#[derive(Clone, Debug, Deserialize)]
pub struct ManifestDataCenter {
    #[serde(rename = "name_chs")]
    pub name: String,

    /// External datacenter code. Mapped to an internal row id before patching.
    pub dc: u32,

    pub worlds: Vec<ManifestWorld>,
}

/// The parsed region manifest: an ordered list of datacenter groups.
pub type RegionManifest = Vec<ManifestDataCenter>;

/// Maps an external datacenter code to the internal sheet row id. Codes outside
/// this table belong to deployments we don't patch.
fn map_datacenter_code(code: u32) -> Option<u32> {
    match code {
        1 => Some(101),
        6 => Some(102),
        7 => Some(103),
        8 => Some(201),
        _ => None,
    }
}

/// Rewrites the catalog rows named by `manifest`: the datacenter row takes the
/// manifest name and the custom region code, and every listed world is made
/// public and repointed at that datacenter.
///
/// Rows the catalog doesn't have are skipped with a log message rather than
/// failing the whole patch.
pub fn apply_region_overrides(manifest: &RegionManifest, catalog: &dyn AssetCatalog) {
    for group in manifest {
        let dc_id = match map_datacenter_code(group.dc) {
            Some(id) => id,
            None => continue,
        };

        let mut dc_row = match catalog.datacenter(dc_id) {
            Some(row) => row,
            None => {
                log::warn!(
                    "datacenter row {} (code {}) not found, skipping group",
                    dc_id,
                    group.dc
                );
                continue;
            }
        };

        dc_row.name = group.name.clone();
        dc_row.region = CUSTOM_REGION;
        catalog.put_datacenter(dc_row);

        for world in &group.worlds {
            let mut world_row = match catalog.world(world.id) {
                Some(row) => row,
                None => {
                    log::warn!("world row {} not found, skipping", world.id);
                    continue;
                }
            };

            world_row.is_public = true;
            world_row.datacenter = Some(DataCenterRef {
                id: dc_id,
                language: Language::ChineseSimplified,
            });

            catalog.put_world(world_row);
        }

        log::info!(
            "patched datacenter {} as '{}' with {} worlds",
            dc_id,
            group.name,
            group.worlds.len()
        );
    }
}

/// Loads and parses a region manifest from `path`.
pub fn load_manifest(path: &Path) -> Result<RegionManifest> {
    let json = fs::read_to_string(path)
        .wrap_err_with(|| format!("couldn't read region manifest at {}", path.display()))?;

    serde_json::from_str(&json)
        .wrap_err_with(|| format!("couldn't parse region manifest at {}", path.display()))
}

/// The manifest applied when no `server.json` ships with the assets.
static BUILTIN_MANIFEST: Lazy<RegionManifest> = Lazy::new(|| {
    fn world(id: u32, name: &str) -> ManifestWorld {
        ManifestWorld {
            id,
            name: name.to_string(),
        }
    }

    vec![
        ManifestDataCenter {
            name: "陆行鸟".to_string(),
            dc: 1,
            worlds: vec![
                world(1175, "晨曦王座"),
                world(1174, "沃仙曦染"),
                world(1173, "宇宙和音"),
                world(1167, "红玉海"),
                world(1060, "萌芽池"),
                world(1081, "神意之地"),
                world(1044, "幻影群岛"),
                world(1042, "拉诺西亚"),
            ],
        },
        ManifestDataCenter {
            name: "莫古力".to_string(),
            dc: 6,
            worlds: vec![
                world(1121, "拂晓之间"),
                world(1166, "龙巢神殿"),
                world(1113, "旅人栈桥"),
                world(1076, "白金幻象"),
                world(1176, "梦羽宝境"),
                world(1171, "神拳痕"),
                world(1170, "潮风亭"),
                world(1172, "白银乡"),
            ],
        },
        ManifestDataCenter {
            name: "猫小胖".to_string(),
            dc: 7,
            worlds: vec![
                world(1179, "琥珀原"),
                world(1178, "柔风海湾"),
                world(1177, "海猫茶屋"),
                world(1169, "延夏"),
                world(1106, "静语庄园"),
                world(1045, "摩杜纳"),
                world(1043, "紫水栈桥"),
            ],
        },
        ManifestDataCenter {
            name: "豆豆柴".to_string(),
            dc: 8,
            worlds: vec![
                world(1201, "红茶川"),
                world(1186, "伊修加德"),
                world(1180, "太阳海岸"),
                world(1183, "银泪湖"),
                world(1192, "水晶塔"),
                world(1202, "萨雷安"),
                world(1203, "加雷马"),
                world(1200, "亚马乌罗提"),
            ],
        },
    ]
});

/// Applies the embedded default manifest. Used on the bootstrap path when there is
/// no manifest file to read.
pub fn apply_builtin_overrides(catalog: &dyn AssetCatalog) {
    apply_region_overrides(&BUILTIN_MANIFEST, catalog);
}
