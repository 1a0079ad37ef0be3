//! Declarative TOML scenario manifests: pods, topology, an optional physical network, and the
//! weak connections to heal -- either given directly or derived from the network.

use serde::Deserialize;

use crate::connection::ConnectionState;
use crate::error::ScenarioError;
use crate::generator::ProbabilityConnectionStateGenerator;
use crate::network::{Device, Network, NetworkTopo};
use crate::pod::{Pod, PodConfig, PodContainer};

#[derive(Debug, Deserialize)]
struct ManifestPodType {
    name: String,
    count: u32,
    #[serde(default)]
    redundancy: Option<u32>,
    #[serde(default)]
    major: bool,
    #[serde(default)]
    connects: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestDevice {
    id: String,
    ports: u32,
}

#[derive(Debug, Deserialize)]
struct ManifestCable {
    a: (String, u32),
    b: (String, u32),
}

#[derive(Debug, Deserialize)]
struct ManifestBind {
    pod: String,
    device: String,
}

#[derive(Debug, Deserialize)]
struct ManifestNetwork {
    #[serde(default)]
    devices: Vec<ManifestDevice>,
    #[serde(default)]
    cables: Vec<ManifestCable>,
    #[serde(default)]
    binds: Vec<ManifestBind>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
enum ManifestWeak {
    Fixed { edges: Vec<(String, String)> },
    Probability,
}

#[derive(Debug, Deserialize)]
struct ScenarioManifest {
    pods: Vec<ManifestPodType>,
    #[serde(default)]
    network: Option<ManifestNetwork>,
    weak: ManifestWeak,
}

fn build_pods(types: &[ManifestPodType]) -> Result<PodContainer, ScenarioError> {
    let mut pods = PodContainer::new();
    for t in types {
        pods.add_pods((0..t.count).map(|i| Pod::new(t.name.clone(), i)))?;
        pods.configs
            .insert(t.name.clone(), PodConfig::new(t.redundancy, t.major));
        let others: Vec<&str> = t.connects.iter().map(|s| s.as_str()).collect();
        pods.connect(&t.name, &others);
    }
    Ok(pods)
}

fn build_network(manifest: &ManifestNetwork, pods: PodContainer) -> Result<Network, ScenarioError> {
    let mut topo = NetworkTopo::new();
    for device in &manifest.devices {
        topo.add_device(Device::new(device.id.clone(), device.ports))?;
    }
    for cable in &manifest.cables {
        topo.cable(
            (cable.a.0.as_str(), cable.a.1),
            (cable.b.0.as_str(), cable.b.1),
        )?;
    }
    let mut network = Network::new();
    network.topo = topo;
    network.pods = pods;
    for bind in &manifest.binds {
        network.bind(&bind.pod, &bind.device)?;
    }
    Ok(network)
}

/// Parse a TOML scenario manifest into a ready-to-plan [`ConnectionState`].
pub fn load_scenario(manifest: &str) -> Result<ConnectionState, ScenarioError> {
    let manifest: ScenarioManifest = toml::from_str(manifest)?;
    let pods = build_pods(&manifest.pods)?;

    match manifest.weak {
        ManifestWeak::Fixed { edges } => {
            let mut state = ConnectionState::new(pods);
            for (s, t) in edges {
                if !state.pods.contains(&s) {
                    return Err(ScenarioError::UnknownWeakEndpoint(s));
                }
                if !state.pods.contains(&t) {
                    return Err(ScenarioError::UnknownWeakEndpoint(t));
                }
                state.add_weak(&s, &t)?;
            }
            Ok(state)
        }
        ManifestWeak::Probability => {
            let net_manifest = manifest.network.as_ref().ok_or(ScenarioError::MissingNetwork)?;
            let network = build_network(net_manifest, pods)?;
            let frozen = network.freeze()?;
            let generator = ProbabilityConnectionStateGenerator::from_network(&frozen)?;
            Ok(generator.generate())
        }
    }
}
