//! Network opcode tables.
//!
//! Two tables are kept: one for server-bound messages and one for client-bound
//! messages. Both start out from JSON files shipped with the assets, and a
//! background refresh later merges in codes from a community-maintained remote
//! manifest. Readers get `Arc` snapshots; the refresh publishes a whole new table
//! instead of editing the one readers might be holding.

use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread,
    time::Duration,
};

use eyre::Result;
use serde::Deserialize;

/// A mapping from symbolic message name to its numeric opcode.
pub type OpcodeTable = HashMap<String, u16>;

/// Where the remote opcode manifest is fetched from.
pub const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/karashiiro/FFXIVOpcodes/master/opcodes.min.json";

/// Names of the sub-lists we read from a remote manifest entry.
const SERVER_LIST: &str = "ServerZoneIpcType";
const CLIENT_LIST: &str = "ClientZoneIpcType";

/// Server-bound opcode names we track, paired with the name the remote manifest
/// uses for the same message.
const SERVER_ALIASES: &[(&str, &str)] = &[
    ("ActorControlSelf", "ActorControlSelf"),
    ("ContainerInfo", "ContainerInfo"),
    ("MarketBoardItemRequestStart", "MarketBoardItemListingCount"),
    ("MarketBoardHistory", "MarketBoardItemListingHistory"),
    ("MarketBoardOfferings", "MarketBoardItemListing"),
    ("MarketBoardPurchase", "MarketBoardPurchase"),
    ("InventoryActionAck", "InventoryActionAck"),
    ("MarketTaxRates", "ResultDialog"),
    ("RetainerInformation", "RetainerInformation"),
    ("ItemMarketBoardInfo", "ItemMarketBoardInfo"),
    ("CfNotifyPop", "CFNotify"),
];

/// Client-bound opcode names, paired as above.
const CLIENT_ALIASES: &[(&str, &str)] =
    &[("MarketBoardPurchaseHandler", "MarketBoardPurchaseHandler")];

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_ATTEMPTS: u32 = 3;
const FETCH_BASE_BACKOFF: Duration = Duration::from_millis(500);

/// A single name/code pair from the remote manifest.
#[derive(Clone, Debug, Deserialize)]
pub struct RemoteOpcode {
    pub name: String,
    pub opcode: u16,
}

/// One entry of the remote manifest. Each entry covers one deployment region.
#[derive(Clone, Debug, Deserialize)]
pub struct RemoteOpcodeEntry {
    pub version: String,
    pub region: String,
    pub lists: HashMap<String, Vec<RemoteOpcode>>,
}

/// Owns the client and server opcode tables and keeps them current.
pub struct OpcodeStore {
    /// Region tag used to pick the relevant remote manifest entry.
    region: String,

    server: Mutex<Arc<OpcodeTable>>,
    client: Mutex<Arc<OpcodeTable>>,

    /// Set once the remote refresh attempt has finished, whether or not it
    /// actually changed anything.
    remote_ready: AtomicBool,
}

impl OpcodeStore {
    /// Creates a store with empty tables. Lookups against an empty table return
    /// `None` rather than faulting, so a store is usable before `bootstrap`.
    pub fn new(region: impl Into<String>) -> OpcodeStore {
        OpcodeStore {
            region: region.into(),
            server: Mutex::new(Arc::new(OpcodeTable::new())),
            client: Mutex::new(Arc::new(OpcodeTable::new())),
            remote_ready: AtomicBool::new(false),
        }
    }

    /// Loads both tables from the JSON files in `asset_dir`. A file that is
    /// missing or malformed leaves its table empty; the other table still loads.
    pub fn bootstrap(&self, asset_dir: &Path) {
        match load_table(&asset_dir.join("serveropcode.json")) {
            Ok(table) => {
                log::info!("loaded {} server opcodes", table.len());
                *self.lock_server() = Arc::new(table);
            }
            Err(err) => log::error!("couldn't load server opcodes: {err:?}"),
        }

        match load_table(&asset_dir.join("clientopcode.json")) {
            Ok(table) => {
                log::info!("loaded {} client opcodes", table.len());
                *self.lock_client() = Arc::new(table);
            }
            Err(err) => log::error!("couldn't load client opcodes: {err:?}"),
        }
    }

    /// Returns a snapshot of the server-bound table.
    pub fn server_table(&self) -> Arc<OpcodeTable> {
        self.lock_server().clone()
    }

    /// Returns a snapshot of the client-bound table.
    pub fn client_table(&self) -> Arc<OpcodeTable> {
        self.lock_client().clone()
    }

    /// Looks up a server-bound opcode by name.
    pub fn server_opcode(&self, name: &str) -> Option<u16> {
        self.lock_server().get(name).copied()
    }

    /// Looks up a client-bound opcode by name.
    pub fn client_opcode(&self, name: &str) -> Option<u16> {
        self.lock_client().get(name).copied()
    }

    /// Returns true once the remote refresh attempt has completed.
    pub fn remote_ready(&self) -> bool {
        self.remote_ready.load(Ordering::Acquire)
    }

    /// Merges a fetched manifest into the tables. Finds the entry whose region
    /// matches ours, pulls codes for the aliased names out of its sub-lists, and
    /// publishes updated copies of both tables. No matching entry means no change.
    pub fn apply_remote(&self, entries: &[RemoteOpcodeEntry]) {
        let entry = match entries.iter().find(|entry| entry.region == self.region) {
            Some(entry) => entry,
            None => {
                log::warn!("no remote opcode entry for region {}", self.region);
                return;
            }
        };

        let server_remote = list_to_table(entry, SERVER_LIST);
        let client_remote = list_to_table(entry, CLIENT_LIST);

        let merged_server = merged(&self.server_table(), &server_remote, SERVER_ALIASES);
        let merged_client = merged(&self.client_table(), &client_remote, CLIENT_ALIASES);

        *self.lock_server() = Arc::new(merged_server);
        *self.lock_client() = Arc::new(merged_client);

        log::info!(
            "merged remote opcodes for region {} (manifest version {})",
            self.region,
            entry.version
        );
    }

    /// Starts a background thread that fetches the remote manifest from `url` and
    /// merges it in. This never blocks the caller; failures are logged and leave
    /// the tables untouched.
    pub fn spawn_refresh(self: &Arc<Self>, url: String) {
        let store = Arc::clone(self);

        thread::spawn(move || {
            match fetch_with_retry(&url) {
                Ok(entries) => store.apply_remote(&entries),
                Err(err) => log::error!("couldn't fetch remote opcodes: {err:?}"),
            }

            store.remote_ready.store(true, Ordering::Release);
        });
    }

    fn lock_server(&self) -> MutexGuard<'_, Arc<OpcodeTable>> {
        self.server.lock().expect("server table lock poisoned")
    }

    fn lock_client(&self) -> MutexGuard<'_, Arc<OpcodeTable>> {
        self.client.lock().expect("client table lock poisoned")
    }
}

/// Reads a `{"Name": code, ...}` JSON file into a table.
fn load_table(path: &Path) -> Result<OpcodeTable> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Flattens one named sub-list of a manifest entry into a table. A missing list
/// just yields an empty table.
fn list_to_table(entry: &RemoteOpcodeEntry, list_name: &str) -> OpcodeTable {
    entry
        .lists
        .get(list_name)
        .map(|list| {
            list.iter()
                .map(|item| (item.name.clone(), item.opcode))
                .collect()
        })
        .unwrap_or_default()
}

/// Returns a copy of `original` with every aliased name that exists in `remote`
/// inserted or overwritten under its local name.
fn merged(original: &OpcodeTable, remote: &OpcodeTable, aliases: &[(&str, &str)]) -> OpcodeTable {
    let mut table = original.clone();

    for &(local_name, remote_name) in aliases {
        if let Some(&code) = remote.get(remote_name) {
            log::trace!("setting {local_name} to {code} from the remote manifest");
            table.insert(local_name.to_string(), code);
        }
    }

    table
}

fn fetch_manifest(url: &str) -> Result<Vec<RemoteOpcodeEntry>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()?;

    let response = client.get(url).send()?.error_for_status()?;

    Ok(serde_json::from_reader(response)?)
}

/// Fetches the manifest, retrying with a doubling delay between attempts.
fn fetch_with_retry(url: &str) -> Result<Vec<RemoteOpcodeEntry>> {
    let mut backoff = FETCH_BASE_BACKOFF;

    for attempt in 1..FETCH_ATTEMPTS {
        match fetch_manifest(url) {
            Ok(entries) => return Ok(entries),
            Err(err) => {
                log::warn!("opcode fetch attempt {attempt} failed: {err:?}");
                thread::sleep(backoff);
                backoff *= 2;
            }
        }
    }

    fetch_manifest(url)
}
