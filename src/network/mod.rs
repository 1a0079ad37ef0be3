//! Physical network model: devices, cables, pod bindings, and the frozen, path-indexed snapshot
//! used by the planner and the probability generator.

pub mod path;

use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;
use crate::pod::PodContainer;
use path::{all_shortest_paths, Path};

/// A device with a fixed number of numbered ports. Port canonical name is `"{id}:{port}"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// The device's id, unique within a [`NetworkTopo`].
    pub id: String,
    /// How many ports the device has, numbered `0..port_count`.
    pub port_count: u32,
}

impl Device {
    /// Create a new device.
    pub fn new(id: impl Into<String>, port_count: u32) -> Self {
        Self {
            id: id.into(),
            port_count,
        }
    }

    /// The canonical name of one of this device's ports.
    pub fn port_name(&self, port: u32) -> Result<String, NetworkError> {
        if port >= self.port_count {
            return Err(NetworkError::PortOutOfRange {
                device: self.id.clone(),
                port,
                count: self.port_count,
            });
        }
        Ok(format!("{}:{port}", self.id))
    }

    /// All of this device's port canonical names, in port-index order.
    pub fn port_names(&self) -> Vec<String> {
        (0..self.port_count)
            .map(|p| format!("{}:{p}", self.id))
            .collect()
    }
}

/// A reference to a network endpoint, as accepted by [`FreezedNetwork::turn`].
///
/// An explicit tagged variant rather than structural matching on strings, so callers cannot
/// accidentally address the wrong kind of endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointRef {
    /// A device, addressed by id.
    Device(String),
    /// A pod, addressed by canonical id.
    Pod(String),
    /// A single port of a device, addressed by device id and port index.
    Port(String, u32),
    /// A raw canonical id, for callers that already have one.
    Raw(String),
}

impl EndpointRef {
    fn canonical_id(&self, topo: &NetworkTopo) -> Result<String, NetworkError> {
        match self {
            EndpointRef::Device(id) => Ok(id.clone()),
            EndpointRef::Pod(id) => Ok(id.clone()),
            EndpointRef::Port(device, port) => topo.port_name(device, *port),
            EndpointRef::Raw(id) => Ok(id.clone()),
        }
    }
}

/// Devices and the cables between their ports.
///
/// Invariant: every port participates in at most one cable.
///
/// `cabled_ports` is a derived index over `cables`, not part of the persisted form -- serializing
/// goes through [`NetworkTopoData`] and rebuilds it on the way back in, so a round-tripped topology
/// still enforces the one-cable-per-port invariant rather than silently losing its guard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "NetworkTopoData", into = "NetworkTopoData")]
pub struct NetworkTopo {
    devices: IndexMap<String, Device>,
    cables: BTreeSet<(String, String)>,
    cabled_ports: HashSet<String>,
}

/// Raw, directly-serializable form of a [`NetworkTopo`]; `cabled_ports` is recomputed from
/// `cables` on the way back in rather than persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkTopoData {
    devices: IndexMap<String, Device>,
    cables: BTreeSet<(String, String)>,
}

impl From<NetworkTopoData> for NetworkTopo {
    fn from(data: NetworkTopoData) -> Self {
        let cabled_ports = data
            .cables
            .iter()
            .flat_map(|(a, b)| [a.clone(), b.clone()])
            .collect();
        Self {
            devices: data.devices,
            cables: data.cables,
            cabled_ports,
        }
    }
}

impl From<NetworkTopo> for NetworkTopoData {
    fn from(topo: NetworkTopo) -> Self {
        Self {
            devices: topo.devices,
            cables: topo.cables,
        }
    }
}

impl NetworkTopo {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. Errors if a device with this id already exists.
    pub fn add_device(&mut self, device: Device) -> Result<(), NetworkError> {
        if self.devices.contains_key(&device.id) {
            return Err(NetworkError::DuplicateDevice(device.id));
        }
        self.devices.insert(device.id.clone(), device);
        Ok(())
    }

    /// Whether a device with this id exists.
    pub fn contains_device(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    fn port_name(&self, device_id: &str, port: u32) -> Result<String, NetworkError> {
        let device = self
            .devices
            .get(device_id)
            .ok_or_else(|| NetworkError::UnknownDevice(device_id.to_string()))?;
        device.port_name(port)
    }

    /// Cable together two device ports. Errors if either port is already cabled.
    pub fn cable(&mut self, a: (&str, u32), b: (&str, u32)) -> Result<(), NetworkError> {
        let a_port = self.port_name(a.0, a.1)?;
        let b_port = self.port_name(b.0, b.1)?;
        if self.cabled_ports.contains(&a_port) {
            return Err(NetworkError::PortAlreadyCabled(a_port));
        }
        if self.cabled_ports.contains(&b_port) {
            return Err(NetworkError::PortAlreadyCabled(b_port));
        }
        let pair = if a_port <= b_port {
            (a_port.clone(), b_port.clone())
        } else {
            (b_port.clone(), a_port.clone())
        };
        self.cables.insert(pair);
        self.cabled_ports.insert(a_port);
        self.cabled_ports.insert(b_port);
        Ok(())
    }

    /// Every device port canonical name (grouped by device, in device insertion order), followed
    /// by every device id, in device insertion order.
    pub fn ports(&self) -> Vec<String> {
        let mut result: Vec<String> = self
            .devices
            .values()
            .flat_map(|d| d.port_names())
            .collect();
        result.extend(self.devices.keys().cloned());
        result
    }
}

/// A network: a topology, the pods that may be bound to it, and the bindings themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    /// The device/cable topology.
    pub topo: NetworkTopo,
    /// The pods that may be bound to devices in this network.
    pub pods: PodContainer,
    binds: IndexMap<String, String>,
}

impl Network {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a pod to a device. Errors if the pod or device is unknown.
    pub fn bind(&mut self, pod_id: &str, device_id: &str) -> Result<(), NetworkError> {
        if !self.pods.contains(pod_id) {
            return Err(NetworkError::Pod(crate::error::PodError::UnknownPod(
                pod_id.to_string(),
            )));
        }
        if !self.topo.contains_device(device_id) {
            return Err(NetworkError::UnboundDevice {
                pod: pod_id.to_string(),
                device: device_id.to_string(),
            });
        }
        self.binds.insert(pod_id.to_string(), device_id.to_string());
        Ok(())
    }

    /// Every canonical endpoint name known to this network: topology ports and device ids, then
    /// every pod id (in pod-container insertion order).
    pub fn ports(&self) -> Vec<String> {
        let mut result = self.topo.ports();
        result.extend(self.pods.iter().map(|(id, _)| id.to_string()));
        result
    }

    /// Freeze this network: assign a stable index to every endpoint and precompute all-pairs
    /// shortest paths between pods.
    pub fn freeze(&self) -> Result<FreezedNetwork, NetworkError> {
        FreezedNetwork::build(
            self.topo.clone(),
            self.pods.clone(),
            self.binds.clone(),
            BTreeSet::new(),
        )
    }
}

/// One shortest path through the multi-layer graph, as an index sequence. Weakness is derived on
/// demand from the owning [`FreezedNetwork`]'s `offline_endpoints`, rather than stored on the path
/// itself -- ownership is one-way (the network owns its paths), avoiding a cyclic reference back
/// to the network.
pub type LinkPath = Path;

/// Raw, directly-serializable form of a [`FreezedNetwork`]; offline endpoints are recorded by
/// canonical id rather than index so that a round trip is stable even if index assignment details
/// change. Deserializing a [`FreezedNetwork`] goes through this type and an explicit constructor
/// ([`FreezedNetwork::build`]) that recomputes the index table and path cache once, rather than
/// relying on a post-deserialize hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezedNetworkData {
    /// The device/cable topology.
    pub topo: NetworkTopo,
    /// The pods bound into this network.
    pub pods: PodContainer,
    /// Pod id -> device id bindings.
    pub binds: IndexMap<String, String>,
    /// Canonical ids of endpoints currently marked offline.
    pub offline_endpoints: BTreeSet<String>,
}

/// Immutable snapshot of a [`Network`] with precomputed all-pairs shortest paths between pods.
///
/// The only permitted mutation after freezing is toggling endpoints on/off via [`turn`]/[`on`]/
/// [`off`]; the path table itself never changes.
///
/// [`turn`]: FreezedNetwork::turn
/// [`on`]: FreezedNetwork::on
/// [`off`]: FreezedNetwork::off
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "FreezedNetworkData", into = "FreezedNetworkData")]
pub struct FreezedNetwork {
    topo: NetworkTopo,
    pods: PodContainer,
    binds: IndexMap<String, String>,
    id_to_index: HashMap<String, usize>,
    index_to_id: Vec<String>,
    offline_endpoints: BTreeSet<usize>,
    paths: HashMap<usize, HashMap<usize, Vec<LinkPath>>>,
}

impl FreezedNetwork {
    /// The deterministic freeze procedure (see module docs): assign indices, build the
    /// multi-layer graph, and compute all-pairs shortest paths between pods with the same-type
    /// ignore pruning.
    pub fn build(
        topo: NetworkTopo,
        pods: PodContainer,
        binds: IndexMap<String, String>,
        offline_ids: BTreeSet<String>,
    ) -> Result<Self, NetworkError> {
        let mut index_to_id: Vec<String> = topo.ports();
        index_to_id.extend(pods.iter().map(|(id, _)| id.to_string()));
        let id_to_index: HashMap<String, usize> = index_to_id
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let n = index_to_id.len();

        let mut adjacency = vec![BTreeSet::new(); n];
        let mut edge = |a: usize, b: usize, adjacency: &mut Vec<BTreeSet<usize>>| {
            adjacency[a].insert(b);
            adjacency[b].insert(a);
        };

        for device in topo.devices_iter() {
            let device_idx = id_to_index[&device.id];
            for port in device.port_names() {
                let port_idx = id_to_index[&port];
                edge(device_idx, port_idx, &mut adjacency);
            }
        }
        for (a, b) in topo.cables_iter() {
            edge(id_to_index[a], id_to_index[b], &mut adjacency);
        }
        for (pod_id, device_id) in &binds {
            let pod_idx = *id_to_index
                .get(pod_id)
                .ok_or_else(|| NetworkError::UnboundDevice {
                    pod: pod_id.clone(),
                    device: device_id.clone(),
                })?;
            let device_idx =
                *id_to_index
                    .get(device_id)
                    .ok_or_else(|| NetworkError::UnboundDevice {
                        pod: pod_id.clone(),
                        device: device_id.clone(),
                    })?;
            edge(pod_idx, device_idx, &mut adjacency);
        }

        let pod_indices: BTreeSet<usize> = pods.iter().map(|(id, _)| id_to_index[id]).collect();
        let types = pods.types();

        let mut paths: HashMap<usize, HashMap<usize, Vec<LinkPath>>> = HashMap::new();
        for (pod_id, pod) in pods.iter() {
            let source = id_to_index[pod_id];
            let ignored: BTreeSet<usize> = types
                .get(&pod.name)
                .into_iter()
                .flatten()
                .map(|p| id_to_index[&p.id()])
                .collect();
            let raw = all_shortest_paths(&adjacency, source, &pod_indices, &ignored);
            let mut entry: HashMap<usize, Vec<LinkPath>> = HashMap::new();
            for &other in &pod_indices {
                if other == source {
                    continue;
                }
                entry.insert(other, raw.get(&other).cloned().unwrap_or_default());
            }
            paths.insert(source, entry);
        }

        let offline_endpoints = offline_ids
            .iter()
            .map(|id| {
                id_to_index
                    .get(id)
                    .copied()
                    .ok_or_else(|| NetworkError::UnknownEndpoint(EndpointRef::Raw(id.clone())))
            })
            .collect::<Result<BTreeSet<usize>, _>>()?;

        Ok(Self {
            topo,
            pods,
            binds,
            id_to_index,
            index_to_id,
            offline_endpoints,
            paths,
        })
    }

    /// Map an index back to its canonical endpoint id.
    pub fn name_of(&self, index: usize) -> &str {
        &self.index_to_id[index]
    }

    /// The canonical ids of every endpoint currently marked offline.
    pub fn offline(&self) -> BTreeSet<String> {
        self.offline_endpoints
            .iter()
            .map(|&i| self.index_to_id[i].clone())
            .collect()
    }

    /// Mark an endpoint online or offline.
    pub fn turn(&mut self, endpoint: &EndpointRef, online: bool) -> Result<(), NetworkError> {
        let id = endpoint.canonical_id(&self.topo)?;
        let index = self
            .id_to_index
            .get(&id)
            .copied()
            .ok_or_else(|| NetworkError::UnknownEndpoint(endpoint.clone()))?;
        if online {
            self.offline_endpoints.remove(&index);
        } else {
            self.offline_endpoints.insert(index);
        }
        Ok(())
    }

    /// Mark several endpoints offline.
    pub fn off(&mut self, endpoints: &[EndpointRef]) -> Result<(), NetworkError> {
        for endpoint in endpoints {
            self.turn(endpoint, false)?;
        }
        Ok(())
    }

    /// Mark several endpoints online.
    pub fn on(&mut self, endpoints: &[EndpointRef]) -> Result<(), NetworkError> {
        for endpoint in endpoints {
            self.turn(endpoint, true)?;
        }
        Ok(())
    }

    fn is_weak(&self, path: &LinkPath) -> bool {
        path.iter().any(|i| self.offline_endpoints.contains(i))
    }

    /// Return the precomputed paths between two pods, partitioned into (healthy, weak) by the
    /// current offline set.
    pub fn state(
        &self,
        source_pod: &str,
        target_pod: &str,
    ) -> Result<(Vec<LinkPath>, Vec<LinkPath>), NetworkError> {
        let s = *self
            .id_to_index
            .get(source_pod)
            .ok_or_else(|| NetworkError::UnknownEndpoint(EndpointRef::Pod(source_pod.to_string())))?;
        let t = *self
            .id_to_index
            .get(target_pod)
            .ok_or_else(|| NetworkError::UnknownEndpoint(EndpointRef::Pod(target_pod.to_string())))?;
        let raw = self
            .paths
            .get(&s)
            .and_then(|m| m.get(&t))
            .cloned()
            .unwrap_or_default();
        let (weak, healthy): (Vec<_>, Vec<_>) = raw.into_iter().partition(|p| self.is_weak(p));
        Ok((healthy, weak))
    }

    /// The pods known to this network.
    pub fn pods(&self) -> &PodContainer {
        &self.pods
    }

    /// The pod-id -> device-id bindings.
    pub fn binds(&self) -> &IndexMap<String, String> {
        &self.binds
    }
}

impl TryFrom<FreezedNetworkData> for FreezedNetwork {
    type Error = NetworkError;

    fn try_from(data: FreezedNetworkData) -> Result<Self, Self::Error> {
        FreezedNetwork::build(data.topo, data.pods, data.binds, data.offline_endpoints)
    }
}

impl From<FreezedNetwork> for FreezedNetworkData {
    fn from(network: FreezedNetwork) -> Self {
        FreezedNetworkData {
            offline_endpoints: network.offline(),
            topo: network.topo,
            pods: network.pods,
            binds: network.binds,
        }
    }
}

// Internal accessors used only by `FreezedNetwork::build`; kept here rather than made fully
// public since iteration order (not just membership) matters for determinism.
impl NetworkTopo {
    fn devices_iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    fn cables_iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.cables.iter().map(|(a, b)| (a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::Pod;

    fn line_network() -> Network {
        // host-0 -- tor-0 -- host-1, with one pod on each host.
        let mut topo = NetworkTopo::new();
        topo.add_device(Device::new("host-0", 1)).unwrap();
        topo.add_device(Device::new("tor-0", 2)).unwrap();
        topo.add_device(Device::new("host-1", 1)).unwrap();
        topo.cable(("host-0", 0), ("tor-0", 0)).unwrap();
        topo.cable(("tor-0", 1), ("host-1", 0)).unwrap();

        let mut pods = PodContainer::new();
        pods.add_pod(Pod::new("a", 0)).unwrap();
        pods.add_pod(Pod::new("b", 0)).unwrap();

        let mut net = Network::new();
        net.topo = topo;
        net.pods = pods;
        net.bind("a-0", "host-0").unwrap();
        net.bind("b-0", "host-1").unwrap();
        net
    }

    #[test]
    fn cabling_same_port_twice_fails() {
        let mut topo = NetworkTopo::new();
        topo.add_device(Device::new("d0", 2)).unwrap();
        topo.add_device(Device::new("d1", 2)).unwrap();
        topo.add_device(Device::new("d2", 2)).unwrap();
        topo.cable(("d0", 0), ("d1", 0)).unwrap();
        assert!(topo.cable(("d0", 0), ("d2", 0)).is_err());
    }

    #[test]
    fn port_out_of_range_rejected() {
        let mut topo = NetworkTopo::new();
        topo.add_device(Device::new("d0", 1)).unwrap();
        topo.add_device(Device::new("d1", 1)).unwrap();
        assert!(topo.cable(("d0", 5), ("d1", 0)).is_err());
    }

    #[test]
    fn path_correctness_on_a_line() {
        let net = line_network();
        let frozen = net.freeze().unwrap();
        let (healthy, weak) = frozen.state("a-0", "b-0").unwrap();
        assert!(weak.is_empty());
        assert_eq!(healthy.len(), 1);
        let path = &healthy[0];
        assert_eq!(frozen.name_of(path[0]), "a-0");
        assert_eq!(frozen.name_of(*path.last().unwrap()), "b-0");
    }

    #[test]
    fn toggling_a_port_reclassifies_without_recomputation() {
        let net = line_network();
        let mut frozen = net.freeze().unwrap();
        let (healthy, weak) = frozen.state("a-0", "b-0").unwrap();
        assert_eq!(healthy.len(), 1);
        assert!(weak.is_empty());

        frozen.off(&[EndpointRef::Port("host-0".into(), 0)]).unwrap();
        let (healthy, weak) = frozen.state("a-0", "b-0").unwrap();
        assert!(healthy.is_empty());
        assert_eq!(weak.len(), 1);

        frozen.on(&[EndpointRef::Port("host-0".into(), 0)]).unwrap();
        let (healthy, weak) = frozen.state("a-0", "b-0").unwrap();
        assert_eq!(healthy.len(), 1);
        assert!(weak.is_empty());
    }

    #[test]
    fn turning_unknown_endpoint_fails_loudly() {
        let net = line_network();
        let mut frozen = net.freeze().unwrap();
        assert!(frozen
            .turn(&EndpointRef::Pod("nope-0".into()), false)
            .is_err());
    }

    #[test]
    fn isolated_device_yields_empty_path_set() {
        let mut topo = NetworkTopo::new();
        topo.add_device(Device::new("host-0", 1)).unwrap();
        topo.add_device(Device::new("host-1", 1)).unwrap();

        let mut pods = PodContainer::new();
        pods.add_pod(Pod::new("a", 0)).unwrap();
        pods.add_pod(Pod::new("b", 0)).unwrap();

        let mut net = Network::new();
        net.topo = topo;
        net.pods = pods;
        net.bind("a-0", "host-0").unwrap();
        net.bind("b-0", "host-1").unwrap();

        let frozen = net.freeze().unwrap();
        let (healthy, weak) = frozen.state("a-0", "b-0").unwrap();
        assert!(healthy.is_empty() && weak.is_empty());
    }

    #[test]
    fn same_type_pods_are_never_transited() {
        // a-0 -- tor-0 -- a-1 -- tor-0's second port -- b-0
        let mut topo = NetworkTopo::new();
        topo.add_device(Device::new("h0", 1)).unwrap();
        topo.add_device(Device::new("tor-0", 3)).unwrap();
        topo.add_device(Device::new("h1", 1)).unwrap();
        topo.add_device(Device::new("h2", 1)).unwrap();
        topo.cable(("h0", 0), ("tor-0", 0)).unwrap();
        topo.cable(("h1", 0), ("tor-0", 1)).unwrap();
        topo.cable(("h2", 0), ("tor-0", 2)).unwrap();

        let mut pods = PodContainer::new();
        pods.add_pod(Pod::new("a", 0)).unwrap();
        pods.add_pod(Pod::new("a", 1)).unwrap();
        pods.add_pod(Pod::new("b", 0)).unwrap();

        let mut net = Network::new();
        net.topo = topo;
        net.pods = pods;
        net.bind("a-0", "h0").unwrap();
        net.bind("a-1", "h1").unwrap();
        net.bind("b-0", "h2").unwrap();

        let frozen = net.freeze().unwrap();
        let (healthy, _) = frozen.state("a-0", "b-0").unwrap();
        for path in &healthy {
            let names: Vec<_> = path.iter().map(|&i| frozen.name_of(i)).collect();
            assert!(!names.contains(&"a-1"));
        }
    }

    #[test]
    fn network_round_trips_through_serde() {
        let net = line_network();
        let json = serde_json::to_string(&net).unwrap();
        let reloaded: Network = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, net);
    }

    #[test]
    fn cable_uniqueness_survives_a_round_trip() {
        let mut topo = NetworkTopo::new();
        topo.add_device(Device::new("d0", 2)).unwrap();
        topo.add_device(Device::new("d1", 2)).unwrap();
        topo.add_device(Device::new("d2", 2)).unwrap();
        topo.cable(("d0", 0), ("d1", 0)).unwrap();

        let json = serde_json::to_string(&topo).unwrap();
        let mut reloaded: NetworkTopo = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, topo);

        // d0:0 is already cabled -- a round-tripped topology must still reject re-cabling it,
        // not silently accept it because `cabled_ports` was lost across the serde boundary.
        assert!(reloaded.cable(("d0", 0), ("d2", 0)).is_err());
    }

    #[test]
    fn freezed_network_round_trips_through_serde() {
        let net = line_network();
        let mut frozen = net.freeze().unwrap();
        frozen.off(&[EndpointRef::Pod("a-0".into())]).unwrap();

        let json = serde_json::to_string(&frozen).unwrap();
        let reloaded: FreezedNetwork = serde_json::from_str(&json).unwrap();
        pretty_assertions_sorted::assert_eq!(reloaded.offline(), frozen.offline());
        let (h1, w1) = frozen.state("a-0", "b-0").unwrap();
        let (h2, w2) = reloaded.state("a-0", "b-0").unwrap();
        assert_eq!(h1.len(), h2.len());
        assert_eq!(w1.len(), w2.len());
    }
}
