use serde::Serialize;

use crate::{
    context::AppContext,
    error::ProvisionError,
    models::{
        service_image_models::supported_image,
        testbed_models::{ProvisionStep, TestbedStatus},
    },
};

use super::provision_controller::record_failure;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeardownReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
    pub released_ports: Vec<u16>,
}

/// Marks the testbed `Deleted`, then removes its containers and releases the ports of
/// the ones that went away. Marking first lets an in-flight build see the deletion and
/// clean up whatever it creates afterwards. Removal failures do not stop the loop.
pub async fn teardown_testbed(
    ctx: &AppContext,
    testbed_id: &str,
) -> Result<TeardownReport, ProvisionError> {
    ctx.testbeds.get_testbed(testbed_id).await?;
    if !ctx
        .testbeds
        .transition_status(testbed_id, &TestbedStatus::LIVE, TestbedStatus::Deleted)
        .await?
    {
        return Err(ProvisionError::Conflict(format!(
            "testbed {} is already deleted",
            testbed_id
        )));
    }
    let testbed = ctx.testbeds.get_testbed(testbed_id).await?;

    let mut report = TeardownReport::default();
    for record in &testbed.containers {
        let Some(image) = supported_image(&record.image) else {
            continue;
        };
        tracing::info!("deleting container {} and deallocating ports", record.host_name);
        match remove_if_present(ctx, &record.host_name).await {
            Ok(()) => {
                report.removed.push(record.image.clone());
                if record.service_port == 0 {
                    continue;
                }
                match ctx.ports.release(record.service_port, testbed_id).await {
                    Ok(true) => report.released_ports.push(record.service_port),
                    Ok(false) => tracing::warn!(
                        "port {} was not held by testbed {}",
                        record.service_port,
                        testbed_id
                    ),
                    Err(err) => {
                        record_failure(
                            ctx,
                            testbed_id,
                            image,
                            ProvisionStep::ReleasePort,
                            err.to_string(),
                        )
                        .await
                    }
                }
            }
            Err(err) => {
                report.failed.push(record.image.clone());
                record_failure(ctx, testbed_id, image, ProvisionStep::Remove, err.to_string()).await;
            }
        }
    }

    tracing::info!(
        "testbed {} deleted, removed {:?}, released ports {:?}",
        testbed_id,
        report.removed,
        report.released_ports
    );
    Ok(report)
}

/// Force-removes a container. One that no longer exists counts as removed.
pub(crate) async fn remove_if_present(ctx: &AppContext, name: &str) -> Result<(), ProvisionError> {
    match ctx.runtime.remove_container(name).await {
        Ok(()) => {
            tracing::info!("removed container {}", name);
            Ok(())
        }
        Err(ProvisionError::NotFound(message)) => {
            tracing::info!("container {} already gone: {}", name, message);
            Ok(())
        }
        Err(err) => Err(err),
    }
}
