use serde::{Deserialize, Serialize};

/// Fixed key of the one registry document.
pub const PORT_REGISTRY_ID: &str = "port-registry";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortAllocation {
    pub port: u16,
    pub testbed_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRegistry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub allocated_ports: Vec<PortAllocation>,
}

impl PortRegistry {
    pub fn new() -> PortRegistry {
        PortRegistry {
            id: PORT_REGISTRY_ID.to_string(),
            allocated_ports: Vec::new(),
        }
    }

    pub fn owner_of(&self, port: u16) -> Option<&str> {
        self.allocated_ports
            .iter()
            .find(|a| a.port == port)
            .map(|a| a.testbed_id.as_str())
    }

    pub fn ports_of(&self, testbed_id: &str) -> Vec<u16> {
        self.allocated_ports
            .iter()
            .filter(|a| a.testbed_id == testbed_id)
            .map(|a| a.port)
            .collect()
    }
}

impl Default for PortRegistry {
    fn default() -> Self {
        Self::new()
    }
}
