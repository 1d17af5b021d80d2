//! Proposal generation: template resolution, filling and download naming.

use std::path::PathBuf;

use chrono::{DateTime, TimeZone};
use docfill_docx::{Document, LogoImage};
use docfill_std::error::prelude::*;
use docfill_std::time::file_stamp;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use unicode_normalization::UnicodeNormalization;

use crate::config::ServerConfig;
use crate::fields::{CLIENT_NAME, FieldMap};
use crate::upload::Upload;

/// The content type of generated documents.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// The message shown when no template can be used.
pub const MISSING_TEMPLATE_MESSAGE: &str =
    "Envie um template .docx ou coloque 'template.docx' na raiz do projeto.";

/// Characters left unescaped in RFC 5987 file names.
const FILENAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// A submitted proposal.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// The field values.
    pub fields: FieldMap,
    /// The uploaded template, if any.
    pub template: Option<Upload>,
    /// The uploaded logo, if any.
    pub logo: Option<Upload>,
}

/// The result of a generation.
#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    /// The filled document.
    Document {
        /// The download name.
        filename: String,
        /// The `.docx` bytes.
        data: Vec<u8>,
    },
    /// Neither an uploaded nor a default template is available.
    MissingTemplate,
}

/// Generates a proposal. Blocks on file and document work.
pub fn generate(config: &ServerConfig, req: GenerateRequest) -> Result<GenerateOutcome> {
    let uploaded = |upload: &Option<Upload>| -> Result<Option<PathBuf>> {
        match upload {
            Some(upload) if !upload.filename.is_empty() => {
                upload.save(&config.uploads_dir).map(Some)
            }
            _ => Ok(None),
        }
    };

    let template_path = match uploaded(&req.template)? {
        Some(path) => path,
        None if config.default_template.is_file() => config.default_template.clone(),
        None => {
            log::info!(
                "no template uploaded and {} does not exist",
                config.default_template.display()
            );
            return Ok(GenerateOutcome::MissingTemplate);
        }
    };
    let logo_path = uploaded(&req.logo)?;

    let mut doc = Document::open(&template_path)?;
    let changed = doc.fill(&req.fields);
    let logo_inserted = match &logo_path {
        Some(path) => doc.insert_logo_with(&config.logo, || LogoImage::open(path))?,
        None => false,
    };
    let data = doc.to_bytes()?;

    let filename = download_name(&req.fields, &docfill_std::time::now());
    log::info!(
        "generated {filename} from {} ({changed} paragraphs filled, logo inserted: {logo_inserted})",
        template_path.display()
    );
    Ok(GenerateOutcome::Document { filename, data })
}

/// The download name, `PROPOSTA_<client>_<YYYYmmdd_HHMMSS>.docx`.
pub fn download_name<Tz: TimeZone>(fields: &FieldMap, time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let client = fields.get(CLIENT_NAME).map_or("cliente", |name| name.trim());
    format!("PROPOSTA_{client}_{}.docx", file_stamp(time))
}

/// Builds an attachment `Content-Disposition` value.
///
/// Names that are not plain ASCII get an ASCII fallback plus an RFC 5987
/// `filename*` parameter.
pub fn content_disposition(filename: &str) -> String {
    let simple: String = filename
        .nfkd()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect();

    if simple == filename {
        format!("attachment; filename=\"{}\"", quote(filename))
    } else {
        let encoded = utf8_percent_encode(filename, FILENAME_SAFE);
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{encoded}",
            quote(&simple)
        )
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
