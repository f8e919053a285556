use serde::{Deserialize, Serialize};

/// Body of `POST /createenv`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTestbedRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub containers: Vec<String>,
}

/// Acknowledgement returned before provisioning finishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestbedReceipt {
    pub status: String,
    pub request_id: String,
}

impl CreateTestbedReceipt {
    pub fn pending(testbed_id: &str) -> CreateTestbedReceipt {
        CreateTestbedReceipt {
            status: "pending".to_string(),
            request_id: testbed_id.to_string(),
        }
    }
}
