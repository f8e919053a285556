pub mod memory_store;
pub mod port_registry;
pub mod testbeds;
