use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::{
    context::AppContext,
    controllers::{
        provision_controller::create_testbed,
        stop_controller::{stop_containers, StopSelector},
        teardown_controller::teardown_testbed,
    },
    error::ProvisionError,
    models::{
        service_request::{CreateTestbedReceipt, CreateTestbedRequest},
        testbed_models::Testbed,
    },
};

pub fn testbed_router() -> Router<AppContext> {
    Router::new()
        .route("/", get(index_handler))
        .route("/createenv", post(create_env_handler))
        .route("/getenv", get(get_env_handler))
        .route("/getenv/{tag}", get(get_env_by_tag_handler))
        .route("/stop/{tag}", post(stop_handler))
        .route(
            "/delete/container/{tag}",
            post(delete_handler).delete(delete_handler),
        )
}

async fn index_handler() -> &'static str {
    "Nothing to do here as of now.\n"
}

/// Parses the body by hand so any malformed payload is a 400, whatever its content type.
async fn create_env_handler(
    State(ctx): State<AppContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateTestbedReceipt>), ProvisionError> {
    let request: CreateTestbedRequest = serde_json::from_slice(&body).map_err(|err| {
        tracing::error!("[ERROR] cannot parse create request: {}", err);
        ProvisionError::InvalidRequest(err.to_string())
    })?;
    let ticket = create_testbed(&ctx, request).await.map_err(|err| {
        tracing::error!("[ERROR] cannot create testbed record: {}", err);
        err
    })?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CreateTestbedReceipt::pending(&ticket.testbed.id)),
    ))
}

async fn get_env_handler(State(ctx): State<AppContext>) -> Result<String, ProvisionError> {
    let containers = ctx.runtime.list_containers().await?;
    let mut listing = String::from("Listing all the containers : \n");
    for container in &containers {
        listing.push_str(&format!(
            "{} {} \n",
            container.display_name(),
            container.short_id()
        ));
    }
    Ok(listing)
}

async fn get_env_by_tag_handler(
    State(ctx): State<AppContext>,
    Path(tag): Path<String>,
) -> Result<Json<Testbed>, ProvisionError> {
    Ok(Json(ctx.testbeds.get_testbed(&tag).await?))
}

async fn stop_handler(
    State(ctx): State<AppContext>,
    Path(tag): Path<String>,
) -> Result<String, ProvisionError> {
    let selector = StopSelector::parse(&tag)?;
    let report = stop_containers(ctx.runtime.as_ref(), &selector).await?;
    let mut text = String::new();
    for name in &report.stopped {
        text.push_str(&format!("Stopped {}\n", name));
    }
    for (name, err) in &report.failed {
        text.push_str(&format!("Stop container operation failed for {}: {}\n", name, err));
    }
    text.push_str("Finished stopping the containers.\n");
    Ok(text)
}

async fn delete_handler(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<String, ProvisionError> {
    let report = teardown_testbed(&ctx, &id).await.map_err(|err| {
        tracing::warn!("teardown of {} failed: {}", id, err);
        err
    })?;
    let mut text = format!("Deleting testbed {}\n", id);
    for image in &report.removed {
        text.push_str(&format!("Removed container {}\n", image));
    }
    for image in &report.failed {
        text.push_str(&format!("Failed to remove container {}\n", image));
    }
    for port in &report.released_ports {
        text.push_str(&format!("Deallocated port {}\n", port));
    }
    text.push_str(&format!("Testbed {} marked Deleted\n", id));
    Ok(text)
}
