pub mod docker_utils;
pub mod env_utils;
pub mod mongodb_utils;
pub mod port_utils;
