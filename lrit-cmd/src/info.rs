use std::{
    io::{stdout, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use lrit::file::LritFile;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Info {
    filename: String,
    data_bytes: usize,
    #[serde(flatten)]
    file: LritFile,
}

fn summarize(fpath: &Path) -> Result<Info> {
    let dat = std::fs::read(fpath).with_context(|| format!("reading {fpath:?}"))?;
    let file = LritFile::decode(&dat).with_context(|| format!("decoding {fpath:?}"))?;
    debug!(
        "{fpath:?}: {} header records not interpreted",
        file.other.len()
    );

    Ok(Info {
        filename: fpath.to_string_lossy().to_string(),
        data_bytes: file.data.len(),
        file,
    })
}

pub fn info(inputs: &[PathBuf], format: &Format) -> Result<()> {
    let infos = inputs
        .iter()
        .map(|p| summarize(p))
        .collect::<Result<Vec<Info>>>()?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &infos).context("serializing to json")
        }
        Format::Text => {
            let data = render_text(&infos).context("serializing info")?;
            stdout()
                .write_all(str::as_bytes(&data))
                .context("writing to stdout")
        }
    }
}

fn render_text(infos: &[Info]) -> Result<String> {
    let mut hb = handlebars::Handlebars::new();
    hb.register_template_string("info", TEXT_TEMPLATE)
        .context("registering template")?;

    hb.render("info", &infos).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ #each this }}{{ filename }}
===============================================================================
File type:   {{ primary.file_type_code }}
Header:      {{ primary.total_header_length }} bytes
Data:        {{ data_bytes }} bytes
Annotation:  {{ annotation }}
Time:        {{ timestamp }}
{{ #with image_structure }}Image:       {{ columns }} columns x {{ lines }} lines, {{ bits_per_pixel }} bits, compression {{ compression }}
{{ /with }}{{ #with segment }}Segment:     {{ sequence }} of {{ planned_start }}-{{ planned_end }}, channel {{ channel }}, spacecraft {{ spacecraft_id }}
{{ /with }}{{ #with navigation }}Projection:  {{ projection }} CFAC={{ column_scaling }} LFAC={{ line_scaling }} COFF={{ column_offset }} LOFF={{ line_offset }}
{{ /with }}Other:       {{ #each other }}{{ header_type }}{{ #if @last }}{{ else }}, {{ /if }}{{ /each }}

{{ /each }}";
