//! The facade the rest of the runtime talks to.
//!
//! `DataManager` wires the catalog, the region patch, the opcode store and the
//! pending-load pump together at startup, then exposes read accessors over all of
//! them. Each loading step is isolated: a missing manifest or opcode file leaves
//! that feature degraded and the rest working.

use std::{path::PathBuf, sync::Arc};

use eyre::{bail, Result};

use crate::{
    catalog::{AssetCatalog, DataCenterRecord, WorldRecord},
    language::Language,
    opcodes::{OpcodeStore, OpcodeTable, DEFAULT_MANIFEST_URL},
    pump::PendingLoadPump,
    region,
};

/// Startup configuration handed to [`DataManager::new`] by the host.
pub struct StartInfo {
    /// Directory holding the bundled data files (`serveropcode.json`,
    /// `clientopcode.json` and optionally `server.json`).
    pub asset_dir: PathBuf,

    /// Language used for localised lookups.
    pub language: Language,

    /// Region tag matched against the remote opcode manifest ("Global", "CN",
    /// "KR").
    pub region: String,

    /// Overrides the remote opcode manifest URL. `None` uses the default.
    pub opcode_url: Option<String>,
}

/// Provides game data to the runtime and its plugins.
pub struct DataManager {
    language: Language,
    catalog: Arc<dyn AssetCatalog>,
    opcodes: Arc<OpcodeStore>,
    data_ready: bool,

    // Held for its drop behaviour: dropping the manager stops the pump thread.
    _pump: PendingLoadPump,
}

impl DataManager {
    /// Sets up all data services. Fails only if the asset directory can't be
    /// found; every other loading problem degrades the affected feature and is
    /// logged instead.
    pub fn new(start: StartInfo, catalog: Arc<dyn AssetCatalog>) -> Result<DataManager> {
        if !start.asset_dir.is_dir() {
            bail!(
                "asset directory {} does not exist",
                start.asset_dir.display()
            );
        }

        log::info!("starting data load from {}", start.asset_dir.display());

        let opcodes = Arc::new(OpcodeStore::new(start.region));
        opcodes.bootstrap(&start.asset_dir);

        apply_region_patch(&start.asset_dir, &*catalog);

        let pump = PendingLoadPump::spawn(catalog.clone());

        let url = start
            .opcode_url
            .unwrap_or_else(|| DEFAULT_MANIFEST_URL.to_string());
        opcodes.spawn_refresh(url);

        Ok(DataManager {
            language: start.language,
            catalog,
            opcodes,
            data_ready: true,
            _pump: pump,
        })
    }

    /// The language lookups default to.
    pub fn language(&self) -> Language {
        self.language
    }

    /// True once construction-time loading has finished.
    pub fn is_data_ready(&self) -> bool {
        self.data_ready
    }

    /// True once the remote opcode refresh attempt has completed.
    pub fn opcodes_ready(&self) -> bool {
        self.opcodes.remote_ready()
    }

    /// Returns the world row with the given id.
    pub fn world(&self, id: u32) -> Option<WorldRecord> {
        self.catalog.world(id)
    }

    /// Returns the datacenter row with the given id.
    pub fn datacenter(&self, id: u32) -> Option<DataCenterRecord> {
        self.catalog.datacenter(id)
    }

    /// Returns the raw bytes of the file at `path`.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.catalog.file(path)
    }

    /// Returns true if a file exists at `path`.
    pub fn file_exists(&self, path: &str) -> bool {
        self.catalog.file_exists(path)
    }

    /// Returns the icon texture with the given id, in the manager's language.
    pub fn icon(&self, id: u32) -> Option<Vec<u8>> {
        self.icon_in(self.language, id, false)
    }

    /// Returns the icon texture with the given id, localised for `language`.
    pub fn icon_in(&self, language: Language, id: u32, high_res: bool) -> Option<Vec<u8>> {
        self.icon_with_type(language.icon_prefix(), id, high_res)
    }

    /// Returns the HQ variant of an item icon.
    pub fn hq_icon(&self, id: u32) -> Option<Vec<u8>> {
        self.icon_with_type("hq/", id, false)
    }

    /// Returns the icon with the given id and type prefix (e.g. `"hq/"` or a
    /// language folder). Falls back to the untyped icon when the typed variant
    /// doesn't exist.
    pub fn icon_with_type(&self, type_prefix: &str, id: u32, high_res: bool) -> Option<Vec<u8>> {
        let file = self.catalog.file(&icon_path(type_prefix, id, high_res));

        if type_prefix.is_empty() || file.is_some() {
            return file;
        }

        self.catalog.file(&icon_path("", id, high_res))
    }

    /// Returns a snapshot of the server-bound opcode table.
    pub fn server_opcodes(&self) -> Arc<OpcodeTable> {
        self.opcodes.server_table()
    }

    /// Returns a snapshot of the client-bound opcode table.
    pub fn client_opcodes(&self) -> Arc<OpcodeTable> {
        self.opcodes.client_table()
    }

    /// Looks up a server-bound opcode by name.
    pub fn server_opcode(&self, name: &str) -> Option<u16> {
        self.opcodes.server_opcode(name)
    }

    /// Looks up a client-bound opcode by name.
    pub fn client_opcode(&self, name: &str) -> Option<u16> {
        self.opcodes.client_opcode(name)
    }
}

/// Applies the region overrides from `server.json` if it exists, or from the
/// embedded defaults otherwise. A manifest that fails to load aborts the patch;
/// the manager carries on with unpatched rows.
fn apply_region_patch(asset_dir: &std::path::Path, catalog: &dyn AssetCatalog) {
    let manifest_path = asset_dir.join("server.json");

    if !manifest_path.exists() {
        region::apply_builtin_overrides(catalog);
        return;
    }

    match region::load_manifest(&manifest_path) {
        Ok(manifest) => region::apply_region_overrides(&manifest, catalog),
        Err(err) => log::error!("region patch skipped: {err:?}"),
    }
}

/// Builds the repository path of an icon texture. Icons are grouped into
/// thousands-folders, with an optional type prefix folder and a `_hr1` suffix for
/// high-resolution variants.
fn icon_path(type_prefix: &str, id: u32, high_res: bool) -> String {
    let suffix = if high_res { "_hr1" } else { "" };

    format!(
        "ui/icon/{:03}000/{}{:06}{}.tex",
        id / 1000,
        type_prefix,
        id,
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use std::fs;

    /// A URL nothing listens on, so refresh attempts fail fast in tests.
    const DEAD_URL: &str = "http://127.0.0.1:9/opcodes.json";

    fn seeded_catalog() -> Arc<MemoryCatalog> {
        let catalog = MemoryCatalog::new();

        catalog.insert_datacenter(DataCenterRecord {
            id: 101,
            name: "placeholder".into(),
            region: 1,
        });

        catalog.insert_world(WorldRecord {
            id: 1042,
            name: "placeholder".into(),
            is_public: false,
            datacenter: None,
        });

        Arc::new(catalog)
    }

    fn start_info(asset_dir: PathBuf) -> StartInfo {
        StartInfo {
            asset_dir,
            language: Language::ChineseSimplified,
            region: "CN".to_string(),
            opcode_url: Some(DEAD_URL.to_string()),
        }
    }

    #[test]
    fn missing_asset_dir_is_fatal() {
        let result = DataManager::new(
            start_info(PathBuf::from("/definitely/not/here")),
            seeded_catalog(),
        );

        assert!(result.is_err());
    }

    #[test]
    fn construction_loads_opcodes_and_patches_region() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("serveropcode.json"),
            r#"{"ActorControlSelf": 291}"#,
        )
        .unwrap();
        fs::write(dir.path().join("clientopcode.json"), r#"{}"#).unwrap();
        fs::write(
            dir.path().join("server.json"),
            r#"[{"dc":1,"name_chs":"测试","worlds":[{"id":1042,"name_chs":"拉诺西亚"}]}]"#,
        )
        .unwrap();

        let catalog = seeded_catalog();
        let manager = DataManager::new(start_info(dir.path().to_path_buf()), catalog).unwrap();

        assert!(manager.is_data_ready());
        assert_eq!(manager.server_opcode("ActorControlSelf"), Some(291));

        let dc = manager.datacenter(101).unwrap();
        assert_eq!(dc.name, "测试");
        assert_eq!(dc.region, region::CUSTOM_REGION);

        let world = manager.world(1042).unwrap();
        assert!(world.is_public);
        assert_eq!(world.datacenter.unwrap().id, 101);
    }

    #[test]
    fn unparseable_manifest_degrades_to_unpatched() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("server.json"), "[ broken").unwrap();

        let manager =
            DataManager::new(start_info(dir.path().to_path_buf()), seeded_catalog()).unwrap();

        // Construction survives and rows are left untouched.
        assert!(manager.is_data_ready());
        assert_eq!(manager.datacenter(101).unwrap().name, "placeholder");
        assert!(!manager.world(1042).unwrap().is_public);
    }

    #[test]
    fn absent_manifest_applies_builtin_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let catalog = seeded_catalog();
        let manager = DataManager::new(start_info(dir.path().to_path_buf()), catalog).unwrap();

        // Datacenter 101 is the first builtin group.
        let dc = manager.datacenter(101).unwrap();
        assert_eq!(dc.name, "陆行鸟");
        assert_eq!(dc.region, region::CUSTOM_REGION);
        assert!(manager.world(1042).unwrap().is_public);
    }

    #[test]
    fn icon_paths_are_formatted_by_group() {
        assert_eq!(icon_path("", 66001, false), "ui/icon/066000/066001.tex");
        assert_eq!(
            icon_path("", 66001, true),
            "ui/icon/066000/066001_hr1.tex"
        );
        assert_eq!(
            icon_path("chs/", 66001, false),
            "ui/icon/066000/chs/066001.tex"
        );
        assert_eq!(icon_path("hq/", 4405, false), "ui/icon/004000/hq/004405.tex");
    }

    #[test]
    fn typed_icon_falls_back_to_generic() {
        let dir = tempfile::tempdir().unwrap();

        let catalog = seeded_catalog();
        catalog.insert_file("ui/icon/066000/066001.tex", vec![1]);
        catalog.insert_file("ui/icon/066000/chs/066002.tex", vec![2]);

        let manager =
            DataManager::new(start_info(dir.path().to_path_buf()), catalog.clone()).unwrap();

        // No chs/ variant of 66001 exists, so the generic icon is returned.
        assert_eq!(manager.icon(66001), Some(vec![1]));

        // The chs/ variant of 66002 exists and wins.
        assert_eq!(
            manager.icon_in(Language::ChineseSimplified, 66002, false),
            Some(vec![2])
        );

        // No HQ or generic variant of 66003 at all.
        assert_eq!(manager.hq_icon(66003), None);
    }
}
