//! The input form page.

use docfill_std::error::prelude::*;
use handlebars::Handlebars;
use serde::Serialize;

use crate::fields::{FIELDS, label};
use crate::flash::Flash;

const FORM_TEMPLATE_NAME: &str = "form";
const FORM_TEMPLATE: &str = include_str!("../assets/form.html.hbs");

#[derive(Debug, Serialize)]
struct FieldInput {
    name: &'static str,
    label: &'static str,
}

#[derive(Debug, Serialize)]
struct FormData<'a> {
    fields: Vec<FieldInput>,
    messages: &'a [Flash],
}

/// Renders the proposal form.
pub struct FormPage {
    handlebars: Handlebars<'static>,
}

impl std::fmt::Debug for FormPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormPage").finish_non_exhaustive()
    }
}

impl FormPage {
    /// Compiles the embedded form template.
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars
            .register_template_string(FORM_TEMPLATE_NAME, FORM_TEMPLATE)
            .context_ut("compile form template")?;
        Ok(Self { handlebars })
    }

    /// Renders the form with pending messages.
    pub fn render(&self, messages: &[Flash]) -> Result<String> {
        let data = FormData {
            fields: FIELDS
                .iter()
                .map(|&name| FieldInput {
                    name,
                    label: label(name),
                })
                .collect(),
            messages,
        };
        self.handlebars
            .render(FORM_TEMPLATE_NAME, &data)
            .context_ut("render form")
    }
}
