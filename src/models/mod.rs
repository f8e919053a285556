pub mod docker_container_models;
pub mod port_registry_models;
pub mod service_image_models;
pub mod service_request;
pub mod testbed_models;
