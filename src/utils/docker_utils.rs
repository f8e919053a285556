use bollard::Docker;

use crate::error::ProvisionError;

/// One client per process; bollard's `Docker` is cheap to clone and safe to share.
pub fn connect() -> Result<Docker, ProvisionError> {
    Docker::connect_with_local_defaults().map_err(|err| {
        tracing::error!("[ERROR] Docker connection error {}", err);
        ProvisionError::RuntimeOperationFailed(err.to_string())
    })
}
