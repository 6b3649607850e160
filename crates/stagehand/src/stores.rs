//! Cross-call shared stores.
//!
//! Snapshots, macro controllers, and parameter maps live for the
//! process; effect-chain templates are written through to disk after
//! every mutation and reloaded at startup. Each store owns its own
//! mutex, critical sections copy out and release.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use livewire::error::BridgeError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{info, warn};

const TEMPLATES_FILE: &str = "effect_chains.json";

/// Which device a snapshot or binding points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRef {
    pub track_index: u32,
    pub device_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamValue {
    pub name: String,
    pub value: f64,
}

/// A captured set of parameter values, restorable as a group.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub device_ref: DeviceRef,
    pub parameters: Vec<ParamValue>,
}

/// Response curve for a macro binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    Linear,
    Exponential,
    Logarithmic,
}

impl Curve {
    /// Shape a 0..1 input before scaling into the output range.
    pub fn shape(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Curve::Linear => t,
            Curve::Exponential => t * t,
            Curve::Logarithmic => t.sqrt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroBinding {
    pub device_ref: DeviceRef,
    pub parameter_name: String,
    pub min_out: f64,
    pub max_out: f64,
    pub curve: Curve,
}

impl MacroBinding {
    /// Map a 0..1 macro position to this binding's output value.
    pub fn output_for(&self, position: f64) -> f64 {
        let shaped = self.curve.shape(position);
        self.min_out + shaped * (self.max_out - self.min_out)
    }
}

/// One knob fanned out across several device parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroController {
    pub id: String,
    pub bindings: Vec<MacroBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamMapping {
    pub original_name: String,
    pub friendly_name: String,
    pub category: String,
}

/// Friendly-name lookup for a device kind. Read-only after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMap {
    pub id: String,
    pub device_kind: String,
    pub mappings: Vec<ParamMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDevice {
    pub uri: String,
    #[serde(default)]
    pub parameter_overrides: BTreeMap<String, f64>,
}

/// An ordered device chain with overrides, persisted on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectChainTemplate {
    pub name: String,
    pub devices: Vec<ChainDevice>,
}

/// Mutex-guarded map keyed by caller-supplied identifiers.
/// Iteration copies out so locks stay short.
#[derive(Debug)]
pub struct Store<T> {
    label: &'static str,
    inner: Mutex<HashMap<String, T>>,
}

impl<T: Clone> Store<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, id: String, value: T) {
        self.inner.lock().expect("store mutex").insert(id, value);
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.inner.lock().expect("store mutex").get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<T> {
        self.inner.lock().expect("store mutex").remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().expect("store mutex").contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .lock()
            .expect("store mutex")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn values(&self) -> Vec<T> {
        self.inner
            .lock()
            .expect("store mutex")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("store mutex").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// Effect-chain templates: the same interface plus write-through
/// persistence to one JSON document.
#[derive(Debug)]
pub struct TemplateStore {
    inner: Mutex<HashMap<String, EffectChainTemplate>>,
    path: PathBuf,
}

impl TemplateStore {
    /// Open the store, loading whatever survives on disk. A corrupt
    /// file is moved aside and logged, never fatal.
    pub fn open(dir: PathBuf) -> Self {
        let path = dir.join(TEMPLATES_FILE);
        let templates = match load_json_map::<EffectChainTemplate>(&path) {
            Ok(Some(map)) => {
                info!("loaded {} effect-chain templates", map.len());
                map
            }
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("effect-chain templates unreadable ({}), starting empty", e);
                let aside = path.with_extension("json.corrupt");
                if let Err(e) = std::fs::rename(&path, &aside) {
                    warn!("could not move corrupt template file aside: {}", e);
                }
                HashMap::new()
            }
        };
        Self {
            inner: Mutex::new(templates),
            path,
        }
    }

    pub fn save(&self, template: EffectChainTemplate) -> Result<(), BridgeError> {
        let snapshot = {
            let mut inner = self.inner.lock().expect("template mutex");
            inner.insert(template.name.clone(), template);
            inner.clone()
        };
        self.persist(&snapshot)
    }

    pub fn get(&self, name: &str) -> Option<EffectChainTemplate> {
        self.inner.lock().expect("template mutex").get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Result<Option<EffectChainTemplate>, BridgeError> {
        let (removed, snapshot) = {
            let mut inner = self.inner.lock().expect("template mutex");
            let removed = inner.remove(name);
            (removed, inner.clone())
        };
        if removed.is_some() {
            self.persist(&snapshot)?;
        }
        Ok(removed)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .lock()
            .expect("template mutex")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("template mutex").len()
    }

    fn persist(&self, map: &HashMap<String, EffectChainTemplate>) -> Result<(), BridgeError> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| BridgeError::internal("template path has no parent"))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| BridgeError::internal(format!("create template dir: {}", e)))?;
        let json = serde_json::to_vec_pretty(map)
            .map_err(|e| BridgeError::internal(format!("encode templates: {}", e)))?;
        let tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| BridgeError::internal(format!("temp template file: {}", e)))?;
        std::fs::write(tmp.path(), &json)
            .map_err(|e| BridgeError::internal(format!("write templates: {}", e)))?;
        tmp.persist(&self.path)
            .map_err(|e| BridgeError::internal(format!("persist templates: {}", e)))?;
        Ok(())
    }
}

fn load_json_map<T: DeserializeOwned>(
    path: &std::path::Path,
) -> Result<Option<HashMap<String, T>>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| BridgeError::internal(format!("read {}: {}", path.display(), e)))?;
    let map = serde_json::from_str(&contents)
        .map_err(|e| BridgeError::internal(format!("parse {}: {}", path.display(), e)))?;
    Ok(Some(map))
}

/// Built-in friendly-name maps for common device kinds.
pub fn builtin_parameter_maps() -> Vec<ParameterMap> {
    fn m(original: &str, friendly: &str, category: &str) -> ParamMapping {
        ParamMapping {
            original_name: original.to_string(),
            friendly_name: friendly.to_string(),
            category: category.to_string(),
        }
    }

    vec![
        ParameterMap {
            id: "wavetable-core".to_string(),
            device_kind: "wavetable".to_string(),
            mappings: vec![
                m("Osc 1 Transp", "oscillator 1 transpose", "pitch"),
                m("Osc 1 Pos", "wavetable position", "timbre"),
                m("Filter 1 Freq", "filter cutoff", "filter"),
                m("Filter 1 Res", "filter resonance", "filter"),
                m("Env 1 Attack", "amp attack", "envelope"),
                m("Env 1 Release", "amp release", "envelope"),
            ],
        },
        ParameterMap {
            id: "eq-eight-core".to_string(),
            device_kind: "eq_eight".to_string(),
            mappings: vec![
                m("1 Frequency A", "band 1 frequency", "eq"),
                m("1 Gain A", "band 1 gain", "eq"),
                m("4 Frequency A", "band 4 frequency", "eq"),
                m("4 Gain A", "band 4 gain", "eq"),
            ],
        },
        ParameterMap {
            id: "compressor-core".to_string(),
            device_kind: "compressor".to_string(),
            mappings: vec![
                m("Threshold", "threshold", "dynamics"),
                m("Ratio", "ratio", "dynamics"),
                m("Attack", "attack", "dynamics"),
                m("Release", "release", "dynamics"),
                m("Output Gain", "makeup gain", "dynamics"),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn store_iteration_returns_copies() {
        let store: Store<Snapshot> = Store::new("snapshots");
        store.insert(
            "warm-pad".to_string(),
            Snapshot {
                id: "warm-pad".to_string(),
                created_at: Utc::now(),
                device_ref: DeviceRef {
                    track_index: 0,
                    device_index: 0,
                },
                parameters: vec![ParamValue {
                    name: "cutoff".to_string(),
                    value: 0.5,
                }],
            },
        );
        let copy = store.get("warm-pad").unwrap();
        assert_eq!(copy.parameters[0].value, 0.5);
        assert_eq!(store.ids(), vec!["warm-pad".to_string()]);
    }

    #[test]
    fn curve_shapes_bracket_linear() {
        assert_eq!(Curve::Linear.shape(0.25), 0.25);
        assert!(Curve::Exponential.shape(0.25) < 0.25);
        assert!(Curve::Logarithmic.shape(0.25) > 0.25);
        // Endpoints agree for every curve.
        for curve in [Curve::Linear, Curve::Exponential, Curve::Logarithmic] {
            assert_eq!(curve.shape(0.0), 0.0);
            assert_eq!(curve.shape(1.0), 1.0);
        }
    }

    #[test]
    fn binding_scales_into_output_range() {
        let binding = MacroBinding {
            device_ref: DeviceRef {
                track_index: 0,
                device_index: 1,
            },
            parameter_name: "cutoff".to_string(),
            min_out: 200.0,
            max_out: 1200.0,
            curve: Curve::Linear,
        };
        assert_eq!(binding.output_for(0.0), 200.0);
        assert_eq!(binding.output_for(0.5), 700.0);
        assert_eq!(binding.output_for(1.0), 1200.0);
        // Out-of-range input clamps.
        assert_eq!(binding.output_for(2.0), 1200.0);
    }

    #[test]
    fn template_save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let template = EffectChainTemplate {
            name: "vocal-chain".to_string(),
            devices: vec![ChainDevice {
                uri: "query:AudioFx#Compressor".to_string(),
                parameter_overrides: BTreeMap::from([("Ratio".to_string(), 4.0)]),
            }],
        };

        {
            let store = TemplateStore::open(dir.path().to_path_buf());
            store.save(template.clone()).unwrap();
        }

        // A fresh store sees what the old one persisted.
        let reopened = TemplateStore::open(dir.path().to_path_buf());
        assert_eq!(reopened.get("vocal-chain").unwrap(), template);
        assert_eq!(reopened.names(), vec!["vocal-chain".to_string()]);
    }

    #[test]
    fn corrupt_template_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TEMPLATES_FILE), b"not json").unwrap();
        let store = TemplateStore::open(dir.path().to_path_buf());
        assert_eq!(store.len(), 0);
        assert!(dir.path().join("effect_chains.json.corrupt").exists());
    }

    #[test]
    fn builtin_maps_cover_common_devices() {
        let maps = builtin_parameter_maps();
        assert!(maps.iter().any(|m| m.device_kind == "wavetable"));
        assert!(maps.iter().any(|m| m.device_kind == "compressor"));
    }
}
