use std::collections::HashMap;

/// What the runtime needs to create one testbed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub exposed_port: String,
    pub host_port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectedContainer {
    pub ip_address: String,
    /// exposed `port/proto` -> host ports bound to it
    pub port_bindings: HashMap<String, Vec<u16>>,
}

impl InspectedContainer {
    pub fn host_port_for(&self, exposed_port: &str) -> Option<u16> {
        self.port_bindings
            .get(exposed_port)
            .and_then(|ports| ports.first().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummaryEntry {
    pub id: String,
    pub names: Vec<String>,
}

impl ContainerSummaryEntry {
    /// First name without docker's leading `/`.
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/'))
            .unwrap_or("")
    }

    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(10) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_for_takes_first_binding() {
        let mut port_bindings = HashMap::new();
        port_bindings.insert("6379/tcp".to_string(), vec![41000, 41001]);
        let inspected = InspectedContainer {
            ip_address: "172.17.0.2".to_string(),
            port_bindings,
        };
        assert_eq!(inspected.host_port_for("6379/tcp"), Some(41000));
        assert_eq!(inspected.host_port_for("27017/tcp"), None);
    }

    #[test]
    fn summary_names_are_trimmed() {
        let entry = ContainerSummaryEntry {
            id: "0123456789abcdef".to_string(),
            names: vec!["/abc-mongo".to_string()],
        };
        assert_eq!(entry.display_name(), "abc-mongo");
        assert_eq!(entry.short_id(), "0123456789");
    }
}
