//! In-process engine used by unit tests
//!
//! Keeps just enough engine state (subsystems, listeners, namespaces, bdevs,
//! vhost controllers) to answer every method the bridge issues, records each
//! call, and lets a test inject a canned result or error per method.

use crate::domain::ports::EngineClient;
use crate::engine::protocol::*;
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

pub const DISCOVERY_NQN: &str = "nqn.2014-08.org.nvmexpress.discovery";
pub const ENGINE_VERSION: &str = "SPDK v23.01";

/// Canned outcome for one method
#[derive(Debug, Clone)]
pub enum Injected {
    Result(Value),
    Engine(i64, String),
    Transport(String),
}

#[derive(Default)]
struct State {
    subsystems: BTreeMap<String, Subsystem>,
    bdevs: BTreeMap<String, BdevIoStat>,
    qos: HashMap<String, QosLimitParams>,
    vhost: BTreeMap<String, VhostController>,
}

pub struct SimulatedEngine {
    state: Mutex<State>,
    calls: Mutex<Vec<(String, Option<Value>)>>,
    injected: Mutex<HashMap<String, Injected>>,
    delay: Option<Duration>,
}

fn no_device(what: &str) -> Error {
    Error::Engine {
        code: -19,
        message: format!("No such device: {}", what),
    }
}

fn exists(what: &str) -> Error {
    Error::Engine {
        code: -17,
        message: format!("File exists: {}", what),
    }
}

fn parse<T: DeserializeOwned>(params: Option<Value>) -> Result<T> {
    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(|e| Error::Engine {
        code: -32602,
        message: format!("Invalid parameters: {}", e),
    })
}

impl SimulatedEngine {
    pub fn new() -> Self {
        let mut state = State::default();
        state.subsystems.insert(
            DISCOVERY_NQN.to_string(),
            Subsystem {
                nqn: DISCOVERY_NQN.to_string(),
                subtype: "Discovery".into(),
                allow_any_host: true,
                ..Default::default()
            },
        );

        Self {
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
            injected: Mutex::new(HashMap::new()),
            delay: None,
        }
    }

    /// Every call sleeps this long before touching state
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn inject(&self, method: &str, outcome: Injected) {
        self.injected.lock().insert(method.to_string(), outcome);
    }

    pub fn clear_injections(&self) {
        self.injected.lock().clear();
    }

    pub fn add_bdev(&self, name: &str) {
        self.set_bdev_stats(BdevIoStat {
            name: name.to_string(),
            ..Default::default()
        });
    }

    pub fn set_bdev_stats(&self, stats: BdevIoStat) {
        self.state.lock().bdevs.insert(stats.name.clone(), stats);
    }

    pub fn subsystem(&self, nqn: &str) -> Option<Subsystem> {
        self.state.lock().subsystems.get(nqn).cloned()
    }

    pub fn vhost_controller(&self, ctrlr: &str) -> Option<VhostController> {
        self.state.lock().vhost.get(ctrlr).cloned()
    }

    pub fn qos_of(&self, bdev: &str) -> Option<QosLimitParams> {
        self.state.lock().qos.get(bdev).cloned()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }

    pub fn last_params(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .and_then(|(_, p)| p.clone())
    }

    fn dispatch(&self, method_name: &str, params: Option<Value>) -> Result<Value> {
        let mut state = self.state.lock();

        match method_name {
            method::SPDK_GET_VERSION => Ok(json!({
                "version": ENGINE_VERSION,
                "fields": {"major": 23, "minor": 1, "patch": 0, "suffix": ""}
            })),

            method::NVMF_CREATE_SUBSYSTEM => {
                let p: CreateSubsystemParams = parse(params)?;
                if state.subsystems.contains_key(&p.nqn) {
                    return Err(exists(&p.nqn));
                }
                state.subsystems.insert(
                    p.nqn.clone(),
                    Subsystem {
                        nqn: p.nqn,
                        subtype: "NVMe".into(),
                        allow_any_host: p.allow_any_host,
                        serial_number: p.serial_number,
                        model_number: p.model_number,
                        max_namespaces: p.max_namespaces,
                        ..Default::default()
                    },
                );
                Ok(json!(true))
            }

            method::NVMF_DELETE_SUBSYSTEM => {
                let p: SubsystemParams = parse(params)?;
                state
                    .subsystems
                    .remove(&p.nqn)
                    .ok_or_else(|| no_device(&p.nqn))?;
                Ok(json!(true))
            }

            method::NVMF_SUBSYSTEM_ADD_HOST => {
                let p: AddHostParams = parse(params)?;
                let subsystem = state
                    .subsystems
                    .get_mut(&p.nqn)
                    .ok_or_else(|| no_device(&p.nqn))?;
                subsystem.hosts.push(json!({"nqn": p.host}));
                Ok(json!(true))
            }

            method::NVMF_GET_SUBSYSTEMS => {
                let rows: Vec<&Subsystem> = state.subsystems.values().collect();
                Ok(serde_json::to_value(rows)?)
            }

            method::NVMF_GET_STATS => Ok(json!({
                "tick_rate": 2_000_000_000u64,
                "poll_groups": [{"name": "nvmf_tgt_poll_group_000", "admin_qpairs": 0, "io_qpairs": 0}]
            })),

            method::NVMF_SUBSYSTEM_ADD_LISTENER => {
                let p: ListenerParams = parse(params)?;
                let subsystem = state
                    .subsystems
                    .get_mut(&p.nqn)
                    .ok_or_else(|| no_device(&p.nqn))?;
                if subsystem
                    .listen_addresses
                    .iter()
                    .any(|l| l.same_endpoint(&p.listen_address))
                {
                    return Err(exists(&p.listen_address.traddr));
                }
                subsystem.listen_addresses.push(p.listen_address);
                Ok(json!(true))
            }

            method::NVMF_SUBSYSTEM_REMOVE_LISTENER => {
                let p: ListenerParams = parse(params)?;
                let subsystem = state
                    .subsystems
                    .get_mut(&p.nqn)
                    .ok_or_else(|| no_device(&p.nqn))?;
                let before = subsystem.listen_addresses.len();
                subsystem
                    .listen_addresses
                    .retain(|l| !l.same_endpoint(&p.listen_address));
                if subsystem.listen_addresses.len() == before {
                    return Err(no_device(&p.listen_address.traddr));
                }
                Ok(json!(true))
            }

            method::NVMF_SUBSYSTEM_ADD_NS => {
                let p: AddNamespaceParams = parse(params)?;
                let subsystem = state
                    .subsystems
                    .get_mut(&p.nqn)
                    .ok_or_else(|| no_device(&p.nqn))?;
                let nsid = match p.namespace.nsid {
                    Some(nsid) if nsid > 0 => nsid,
                    _ => subsystem.namespaces.iter().map(|n| n.nsid).max().unwrap_or(0) + 1,
                };
                if subsystem.namespaces.iter().any(|n| n.nsid == nsid) {
                    return Err(exists(&format!("nsid {}", nsid)));
                }
                subsystem.namespaces.push(SubsystemNamespace {
                    nsid,
                    bdev_name: p.namespace.bdev_name.clone(),
                    name: p.namespace.bdev_name,
                    uuid: p.namespace.uuid,
                    nguid: p.namespace.nguid,
                    eui64: p.namespace.eui64,
                });
                Ok(json!(nsid))
            }

            method::NVMF_SUBSYSTEM_REMOVE_NS => {
                let p: RemoveNamespaceParams = parse(params)?;
                let subsystem = state
                    .subsystems
                    .get_mut(&p.nqn)
                    .ok_or_else(|| no_device(&p.nqn))?;
                let before = subsystem.namespaces.len();
                subsystem.namespaces.retain(|n| n.nsid != p.nsid);
                Ok(json!(subsystem.namespaces.len() != before))
            }

            method::BDEV_GET_IOSTAT => {
                let p: BdevNameParams = parse(params)?;
                let stats = state.bdevs.get(&p.name).ok_or_else(|| no_device(&p.name))?;
                Ok(json!({"tick_rate": 2_000_000_000u64, "ticks": 1, "bdevs": [stats]}))
            }

            method::BDEV_SET_QOS_LIMIT => {
                let p: QosLimitParams = parse(params)?;
                if !state.bdevs.contains_key(&p.name) {
                    return Err(no_device(&p.name));
                }
                state.qos.insert(p.name.clone(), p);
                Ok(json!(true))
            }

            method::VHOST_CREATE_BLK_CONTROLLER => {
                let p: CreateBlkControllerParams = parse(params)?;
                if state.vhost.contains_key(&p.ctrlr) {
                    return Err(exists(&p.ctrlr));
                }
                state.vhost.insert(
                    p.ctrlr.clone(),
                    VhostController {
                        socket: format!("/var/tmp/{}", p.ctrlr),
                        ctrlr: p.ctrlr,
                        cpumask: "0x1".into(),
                        backend_specific: BackendSpecific {
                            block: Some(BlockBackend {
                                bdev: p.dev_name,
                                readonly: false,
                            }),
                            scsi: None,
                        },
                    },
                );
                Ok(json!(true))
            }

            method::VHOST_CREATE_SCSI_CONTROLLER => {
                let p: CreateScsiControllerParams = parse(params)?;
                if state.vhost.contains_key(&p.ctrlr) {
                    return Err(exists(&p.ctrlr));
                }
                state.vhost.insert(
                    p.ctrlr.clone(),
                    VhostController {
                        socket: format!("/var/tmp/{}", p.ctrlr),
                        ctrlr: p.ctrlr,
                        cpumask: "0x1".into(),
                        backend_specific: BackendSpecific {
                            block: None,
                            scsi: Some(Vec::new()),
                        },
                    },
                );
                Ok(json!(true))
            }

            method::VHOST_DELETE_CONTROLLER => {
                let p: DeleteControllerParams = parse(params)?;
                state.vhost.remove(&p.ctrlr).ok_or_else(|| no_device(&p.ctrlr))?;
                Ok(json!(true))
            }

            method::VHOST_GET_CONTROLLERS => {
                let p: GetControllersParams = parse(params.or(Some(json!({}))))?;
                let rows: Vec<&VhostController> = match &p.name {
                    Some(name) => vec![state.vhost.get(name).ok_or_else(|| no_device(name))?],
                    None => state.vhost.values().collect(),
                };
                Ok(serde_json::to_value(rows)?)
            }

            method::VHOST_SCSI_CONTROLLER_ADD_TARGET => {
                let p: AddTargetParams = parse(params)?;
                let controller = state.vhost.get_mut(&p.ctrlr).ok_or_else(|| no_device(&p.ctrlr))?;
                let targets = controller
                    .backend_specific
                    .scsi
                    .as_mut()
                    .ok_or_else(|| no_device(&p.ctrlr))?;
                let num = if p.scsi_target_num >= 0 {
                    p.scsi_target_num
                } else {
                    (0..).find(|n| !targets.iter().any(|t| t.scsi_dev_num == *n)).unwrap_or(0)
                };
                if targets.iter().any(|t| t.scsi_dev_num == num) {
                    return Err(exists(&format!("target {}", num)));
                }
                targets.push(ScsiTargetInfo {
                    scsi_dev_num: num,
                    id: num,
                    target_name: format!("Target {}", num),
                    luns: vec![ScsiLunInfo {
                        id: 0,
                        bdev_name: p.bdev_name,
                    }],
                });
                Ok(json!(num))
            }

            method::VHOST_SCSI_CONTROLLER_REMOVE_TARGET => {
                let p: RemoveTargetParams = parse(params)?;
                let controller = state.vhost.get_mut(&p.ctrlr).ok_or_else(|| no_device(&p.ctrlr))?;
                let targets = controller
                    .backend_specific
                    .scsi
                    .as_mut()
                    .ok_or_else(|| no_device(&p.ctrlr))?;
                let before = targets.len();
                targets.retain(|t| t.scsi_dev_num != p.scsi_target_num);
                Ok(json!(targets.len() != before))
            }

            other => Err(Error::Engine {
                code: -32601,
                message: format!("Method not found: {}", other),
            }),
        }
    }
}

#[async_trait]
impl EngineClient for SimulatedEngine {
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push((method.to_string(), params.clone()));

        let injected = self.injected.lock().get(method).cloned();
        match injected {
            Some(Injected::Result(value)) => Ok(value),
            Some(Injected::Engine(code, message)) => Err(Error::Engine { code, message }),
            Some(Injected::Transport(reason)) => Err(Error::Transport(reason)),
            None => self.dispatch(method, params),
        }
    }
}
