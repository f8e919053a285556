use tokio::task::{JoinHandle, JoinSet};

use crate::{
    context::AppContext,
    db::testbeds::{ContainerField, ContainerFieldValue},
    error::ProvisionError,
    models::{
        docker_container_models::ContainerSpec,
        service_image_models::ServiceImage,
        service_request::CreateTestbedRequest,
        testbed_models::{container_name, ProvisionStep, StepFailure, Testbed, TestbedStatus},
    },
};

use super::teardown_controller::remove_if_present;

/// A persisted testbed and the background task provisioning it.
/// Dropping the handle detaches the task; the testbed record is the progress channel.
pub struct ProvisionTicket {
    pub testbed: Testbed,
    pub handle: JoinHandle<()>,
}

/// Persists an `Initiated` testbed and spawns its provisioning. Returns once the record exists.
pub async fn create_testbed(
    ctx: &AppContext,
    request: CreateTestbedRequest,
) -> Result<ProvisionTicket, ProvisionError> {
    let testbed = Testbed::new(&request.name, &request.containers);
    ctx.testbeds.insert_testbed(&testbed).await?;
    tracing::info!("created testbed document {} ({})", testbed.id, testbed.name);
    if !testbed.skipped_images.is_empty() {
        tracing::info!(
            "testbed {} skips unsupported images {:?}",
            testbed.id,
            testbed.skipped_images
        );
    }

    let task_ctx = ctx.clone();
    let task_testbed = testbed.clone();
    let handle = tokio::spawn(async move {
        provision_testbed(&task_ctx, &task_testbed).await;
    });
    Ok(ProvisionTicket { testbed, handle })
}

/// Pulls every supported image concurrently, then builds the containers one by one.
/// Step failures are logged and recorded on the testbed; they never abort the flow.
pub async fn provision_testbed(ctx: &AppContext, testbed: &Testbed) {
    let images = testbed.supported_images();
    tracing::info!("testbed {} images list is {:?}", testbed.id, images);

    pull_images(ctx, &testbed.id, &images).await;

    match ctx
        .testbeds
        .transition_status(&testbed.id, &[TestbedStatus::Initiated], TestbedStatus::InProgress)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!("testbed {} is no longer initiated, abandoning build", testbed.id);
            return;
        }
        Err(err) => tracing::error!("[ERROR] testbed {} status update: {}", testbed.id, err),
    }

    for image in images {
        if !still_live(ctx, &testbed.id).await {
            tracing::info!("testbed {} was deleted, stopping the build", testbed.id);
            return;
        }
        build_container(ctx, &testbed.id, image).await;
    }

    match ctx
        .testbeds
        .transition_status(&testbed.id, &[TestbedStatus::InProgress], TestbedStatus::Completed)
        .await
    {
        Ok(true) => tracing::info!("testbed {} completed", testbed.id),
        Ok(false) => tracing::info!("testbed {} left in-progress before completion", testbed.id),
        Err(err) => tracing::error!("[ERROR] testbed {} status update: {}", testbed.id, err),
    }
}

async fn pull_images(ctx: &AppContext, testbed_id: &str, images: &[ServiceImage]) {
    let mut pulls = JoinSet::new();
    for image in images.iter().copied() {
        let runtime = ctx.runtime.clone();
        let reference = image.reference(&ctx.settings.image_registry);
        pulls.spawn(async move {
            tracing::info!("pulling docker image {}", reference);
            let pull_result = runtime.pull_image(&reference).await;
            (image, reference, pull_result)
        });
    }

    while let Some(joined) = pulls.join_next().await {
        match joined {
            Ok((_, reference, Ok(()))) => tracing::info!("pulled docker image {}", reference),
            Ok((image, reference, Err(err))) => {
                let message = format!("pull {}: {}", reference, err);
                record_failure(ctx, testbed_id, image, ProvisionStep::Pull, message).await;
            }
            Err(join_err) => tracing::error!("[ERROR] pull task for {} failed: {}", testbed_id, join_err),
        }
    }
}

async fn build_container(ctx: &AppContext, testbed_id: &str, image: ServiceImage) {
    tracing::info!("building container {} for testbed {}", image, testbed_id);

    let host_port = match ctx.ports.reserve(testbed_id).await {
        Ok(port) => port,
        Err(err) => {
            record_failure(ctx, testbed_id, image, ProvisionStep::ReservePort, err.to_string()).await;
            return;
        }
    };

    let spec = ContainerSpec {
        name: container_name(testbed_id, image),
        image: image.reference(&ctx.settings.image_registry),
        exposed_port: image.internal_port().to_string(),
        host_port,
    };
    let container_id = match ctx.runtime.create_container(&spec).await {
        Ok(container_id) => {
            tracing::info!("container created successfully {} ({})", spec.name, container_id);
            container_id
        }
        Err(err) => {
            record_failure(ctx, testbed_id, image, ProvisionStep::Create, err.to_string()).await;
            if let Err(release_err) = ctx.ports.release(host_port, testbed_id).await {
                tracing::error!("[ERROR] releasing port {}: {}", host_port, release_err);
            }
            return;
        }
    };
    persist_fields(
        ctx,
        testbed_id,
        image,
        &[(ContainerField::CONTAINER_ID, ContainerFieldValue::Text(container_id.clone()))],
    )
    .await;
    if !still_live(ctx, testbed_id).await {
        abandon_container(ctx, testbed_id, &spec.name, host_port).await;
        return;
    }

    if let Err(err) = ctx.runtime.start_container(&container_id).await {
        record_failure(ctx, testbed_id, image, ProvisionStep::Start, err.to_string()).await;
    }

    let (ip_address, service_port) = match ctx.runtime.inspect_container(&container_id).await {
        Ok(inspected) => {
            let service_port = inspected.host_port_for(&spec.exposed_port).unwrap_or_else(|| {
                tracing::warn!(
                    "no host binding for {} on {}, keeping requested port {}",
                    spec.exposed_port,
                    spec.name,
                    host_port
                );
                host_port
            });
            (inspected.ip_address, service_port)
        }
        Err(err) => {
            record_failure(ctx, testbed_id, image, ProvisionStep::Inspect, err.to_string()).await;
            (String::new(), host_port)
        }
    };
    tracing::info!("container {} at {} host port {}", spec.name, ip_address, service_port);

    persist_fields(
        ctx,
        testbed_id,
        image,
        &[
            (ContainerField::IP_ADDRESS, ContainerFieldValue::Text(ip_address)),
            (ContainerField::SERVICE_PORT, ContainerFieldValue::Port(service_port)),
            (ContainerField::REST_PORT, ContainerFieldValue::Port(ctx.settings.rest_port)),
        ],
    )
    .await;
    if !still_live(ctx, testbed_id).await {
        abandon_container(ctx, testbed_id, &spec.name, host_port).await;
        return;
    }
    tracing::info!("done building container {} for testbed {}", image, testbed_id);
}

/// False once the testbed is `Deleted` or gone from the store.
async fn still_live(ctx: &AppContext, testbed_id: &str) -> bool {
    match ctx.testbeds.get_testbed(testbed_id).await {
        Ok(testbed) => !testbed.status.is_terminal(),
        Err(ProvisionError::NotFound(_)) => false,
        Err(err) => {
            tracing::error!("[ERROR] reading testbed {} status: {}", testbed_id, err);
            true
        }
    }
}

/// Undoes a container built for a testbed that was torn down meanwhile.
/// Teardown may have removed or released the same things already; both calls tolerate that.
async fn abandon_container(ctx: &AppContext, testbed_id: &str, name: &str, host_port: u16) {
    tracing::info!("testbed {} was deleted during the build, removing {}", testbed_id, name);
    if let Err(err) = remove_if_present(ctx, name).await {
        tracing::error!("[ERROR] removing abandoned container {}: {}", name, err);
    }
    match ctx.ports.release(host_port, testbed_id).await {
        Ok(released) => tracing::info!("abandoned port {} released: {}", host_port, released),
        Err(err) => tracing::error!("[ERROR] releasing port {}: {}", host_port, err),
    }
}

async fn persist_fields(
    ctx: &AppContext,
    testbed_id: &str,
    image: ServiceImage,
    fields: &[(ContainerField, ContainerFieldValue)],
) {
    if let Err(err) = ctx
        .testbeds
        .update_container_fields(testbed_id, image.as_str(), fields)
        .await
    {
        record_failure(ctx, testbed_id, image, ProvisionStep::Persist, err.to_string()).await;
    }
}

pub(crate) async fn record_failure(
    ctx: &AppContext,
    testbed_id: &str,
    image: ServiceImage,
    step: ProvisionStep,
    message: String,
) {
    tracing::warn!("testbed {} {} {:?} failed: {}", testbed_id, image, step, message);
    let failure = StepFailure::new(image.as_str(), step, message);
    if let Err(err) = ctx.testbeds.record_failure(testbed_id, &failure).await {
        tracing::error!("[ERROR] recording failure for testbed {}: {}", testbed_id, err);
    }
}
