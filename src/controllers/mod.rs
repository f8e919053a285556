pub mod container_controller;
pub mod port_controller;
pub mod provision_controller;
pub mod stop_controller;
pub mod teardown_controller;
