pub mod testbed_handler;
