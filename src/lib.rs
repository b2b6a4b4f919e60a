// Library root
// -----------
// This crate exposes a small library surface for the interactive prediction
// demo. The binary (`main.rs`) loads the secrets, resolves the deployment and
// hands it to the UI loop.
//
// Module responsibilities:
// - `config`: reads the API token, API URL and deployment id once.
// - `api`: HTTP client for the prediction service and the deployment handle.
// - `table`: feature rows, CSV parsing and the prediction result table.
// - `render`: terminal rendering of the page blocks.
// - `ui`: the mode state machine and the `dialoguer` prompt loop.
pub mod api;
pub mod config;
pub mod error;
pub mod render;
pub mod table;
pub mod ui;
