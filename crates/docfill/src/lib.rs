//! Serves a web form that fills `.docx` proposal templates.
//!
//! The form posts the proposal fields, an optional template and an optional
//! logo to `/gerar`, which answers with the filled document. Document work is
//! done by [`docfill_docx`].

pub mod config;
pub mod fields;
pub mod flash;
pub mod form;
pub mod generate;
pub mod http;
pub mod upload;

pub use config::{ServeArgs, ServerConfig};
pub use http::{AppState, HttpServer, handle, make_http_server};
