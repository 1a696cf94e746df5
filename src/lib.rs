pub mod batch;
pub mod configuration;
pub mod dispatcher;
pub mod domain;
pub mod email_client;
pub mod routes;
pub mod spreadsheet;
pub mod startup;
pub mod telemetry;
pub mod template;
