//! The proposal fields collected from the form.

use std::collections::HashMap;

use indexmap::IndexMap;

/// The field names, in form order.
pub const FIELDS: [&str; 14] = [
    "ID_HUBSPOT",
    "NOME_CLIENTE",
    "NOME_AUTOR",
    "NUMERO_REVISAO",
    "DATA_EMISSAO",
    "DATA_VALIDADE",
    "NOME_EXECUTIVO",
    "EMAIL_EXECUTIVO",
    "TELEFONE_EXECUTIVO",
    "QTD_HORA",
    "VALOR_HORA",
    "VALOR_TOTAL",
    "CNPJ_CLIENTE",
    "VALOR_HORA_EXCEDENTE",
];

/// The field holding the client name, used in download names.
pub const CLIENT_NAME: &str = "NOME_CLIENTE";

/// Field values by name, in [`FIELDS`] order.
pub type FieldMap = IndexMap<String, String>;

/// Builds the field map from submitted form values.
///
/// Every field is present; missing ones are empty and values are trimmed.
/// Form entries that are not fields are dropped.
pub fn field_map(form: &HashMap<String, String>) -> FieldMap {
    FIELDS
        .iter()
        .map(|&name| {
            let value = form.get(name).map(|v| v.trim()).unwrap_or_default();
            (name.to_owned(), value.to_owned())
        })
        .collect()
}

/// The human-readable label of a field.
pub fn label(name: &str) -> &'static str {
    match name {
        "ID_HUBSPOT" => "ID HubSpot",
        "NOME_CLIENTE" => "Nome do cliente",
        "NOME_AUTOR" => "Nome do autor",
        "NUMERO_REVISAO" => "Número da revisão",
        "DATA_EMISSAO" => "Data de emissão",
        "DATA_VALIDADE" => "Data de validade",
        "NOME_EXECUTIVO" => "Nome do executivo",
        "EMAIL_EXECUTIVO" => "E-mail do executivo",
        "TELEFONE_EXECUTIVO" => "Telefone do executivo",
        "QTD_HORA" => "Quantidade de horas",
        "VALOR_HORA" => "Valor da hora",
        "VALOR_TOTAL" => "Valor total",
        "CNPJ_CLIENTE" => "CNPJ do cliente",
        "VALOR_HORA_EXCEDENTE" => "Valor da hora excedente",
        _ => "",
    }
}

/// Parses a `NAME=VALUE` pair given on the command line.
pub fn parse_field_arg(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(format!("expected NAME=VALUE, got {arg:?}")),
    }
}
