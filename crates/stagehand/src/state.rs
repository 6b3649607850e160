//! Shared application state.
//!
//! One `App` per process, built at startup and handed around as an
//! `Arc`. Every component owns its own locking; nothing here reaches
//! into another component's internals.

use std::sync::Arc;
use std::time::Instant;

use livewire::error::BridgeError;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::calllog::CallLog;
use crate::catalog::CatalogCache;
use crate::config::Config;
use crate::oscbridge::OscBridgeClient;
use crate::pipeline::Pipeline;
use crate::readiness::ReadyFlag;
use crate::stores::{
    builtin_parameter_maps, MacroController, ParameterMap, Snapshot, Store, TemplateStore,
};
use crate::tcp::TcpCommandClient;
use crate::tools_registry::{self, ToolSpec};
use crate::udp::RealtimeSender;

pub struct App {
    pub config: Config,
    pub tcp: Arc<TcpCommandClient>,
    pub bridge: Arc<OscBridgeClient>,
    pub realtime: RealtimeSender,
    pub pipeline: Pipeline,
    pub catalog: CatalogCache,

    pub snapshots: Store<Snapshot>,
    pub macros: Store<MacroController>,
    pub param_maps: Store<ParameterMap>,
    pub chains: TemplateStore,

    pub daw_connected: ReadyFlag,
    pub catalog_populated: ReadyFlag,
    pub call_log: CallLog,
    pub tools: Vec<ToolSpec>,
    pub started_at: Instant,
}

impl App {
    /// Wire up every component. Fails only on local bind errors; the
    /// DAW itself may come up later.
    pub async fn build(config: Config) -> Result<Arc<Self>, BridgeError> {
        let daw_connected = ReadyFlag::new();
        let catalog_populated = ReadyFlag::new();

        let tcp = Arc::new(TcpCommandClient::new(
            format!("127.0.0.1:{}", config.ports.tcp),
            daw_connected.clone(),
        ));

        let bridge = Arc::new(
            OscBridgeClient::bind(config.ports.osc_send, config.ports.osc_recv)
                .await
                .map_err(|e| {
                    BridgeError::internal(format!(
                        "cannot bind OSC port {}: {}",
                        config.ports.osc_recv, e
                    ))
                })?,
        );

        let realtime = RealtimeSender::bind(config.ports.udp_rt).await.map_err(|e| {
            BridgeError::internal(format!("cannot open real-time socket: {}", e))
        })?;

        let pipeline = Pipeline::new(Arc::clone(&tcp), Arc::clone(&bridge));
        let catalog = CatalogCache::new(config.paths.catalog_dir.clone(), catalog_populated.clone());
        if catalog.load_from_disk() {
            info!("catalog ready from disk snapshot");
        }

        let param_maps = Store::new("parameter maps");
        for map in builtin_parameter_maps() {
            param_maps.insert(map.id.clone(), map);
        }

        let chains = TemplateStore::open(config.paths.catalog_dir.clone());

        let app = Arc::new(Self {
            tcp,
            bridge,
            realtime,
            pipeline,
            catalog,
            snapshots: Store::new("snapshots"),
            macros: Store::new("macro controllers"),
            param_maps,
            chains,
            daw_connected,
            catalog_populated,
            call_log: CallLog::new(),
            tools: tools_registry::registry(),
            started_at: Instant::now(),
            config,
        });

        Ok(app)
    }

    pub fn find_tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// The capabilities document: connection states, readiness, and
    /// versions. Served from memory plus the cached bridge ping; no DAW
    /// command is issued.
    pub async fn capabilities(&self) -> Value {
        let bridge_version = self.bridge.version().await;
        json!({
            "daw_connected": self.tcp.is_connected(),
            "bridge_connected": bridge_version.is_some(),
            "catalog_populated": self.catalog.is_populated(),
            "catalog_items": self.catalog.len(),
            "tool_count": self.tools.len(),
            "server_version": env!("CARGO_PKG_VERSION"),
            "bridge_version": bridge_version,
        })
    }

    /// Background task: wait for the first DAW session, then populate
    /// the catalog if the disk snapshot did not already cover it.
    pub async fn populate_when_ready(self: Arc<Self>) {
        self.daw_connected.wait().await;
        if self.catalog.is_populated() {
            return;
        }
        match self.catalog.populate(&self.pipeline).await {
            Ok(count) => info!("background catalog populate finished: {} items", count),
            Err(e) => warn!("background catalog populate failed: {}", e),
        }
    }
}
