pub mod actuator_client;
pub mod config;
pub mod config_registry;
pub mod controller;
pub mod decision;
pub mod error;
pub mod forecaster;
pub mod history;
pub mod history_registry;
pub mod models;
pub mod plant_table;
pub mod prediction_gate;
pub mod pulse_executor;
pub mod runtime;
pub mod supervisor;
pub mod telemetry_client;
