//! Input importers.
//!
//! An importer decides which file stands for a task's input, given the task's
//! `info`. Each one knows the conventions of one data source.

use crate::client::types::Task;
use crate::error::AnalystError;

/// One file to place in an archive.
#[derive(Debug, Clone, PartialEq)]
pub struct InputFile {
    pub url: String,
    /// Name of the archive entry, `{task_id}{extension}`.
    pub entry_name: String,
}

pub trait InputImporter: Send + Sync {
    fn name(&self) -> &str;

    /// The input file for a task, or `None` when the task carries none.
    fn select(&self, task: &Task) -> Option<InputFile>;
}

/// Flickr photos: the large rendition, then medium, then whatever `url` holds.
pub struct FlickrImporter;

impl InputImporter for FlickrImporter {
    fn name(&self) -> &str {
        "flickr"
    }

    fn select(&self, task: &Task) -> Option<InputFile> {
        ["url_b", "url_m", "url"]
            .iter()
            .find_map(|key| info_url(task, key))
            .map(|url| input_file(task, url, ".jpg"))
    }
}

/// IIIF images: the full-size rendition behind the task's `tileSource`.
pub struct IiifImporter;

impl IiifImporter {
    pub fn full_image_url(tile_source: &str) -> String {
        let base = tile_source
            .trim_end_matches('/')
            .trim_end_matches("/info.json");
        format!("{}/full/full/0/default.jpg", base)
    }
}

impl InputImporter for IiifImporter {
    fn name(&self) -> &str {
        "iiif"
    }

    fn select(&self, task: &Task) -> Option<InputFile> {
        let tile_source = info_url(task, "tileSource")?;
        let url = Self::full_image_url(&tile_source);
        Some(input_file(task, url, ".jpg"))
    }
}

pub struct PdfImporter;

impl InputImporter for PdfImporter {
    fn name(&self) -> &str {
        "pdf"
    }

    fn select(&self, task: &Task) -> Option<InputFile> {
        info_url(task, "pdf_url").map(|url| input_file(task, url, ".pdf"))
    }
}

/// Any info field holding a URL, named on the command line as `field:<name>`.
pub struct FieldImporter {
    name: String,
    field: String,
}

impl FieldImporter {
    pub fn new(field: &str) -> Self {
        Self {
            name: format!("field:{}", field),
            field: field.to_string(),
        }
    }
}

impl InputImporter for FieldImporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn select(&self, task: &Task) -> Option<InputFile> {
        info_url(task, &self.field).map(|url| input_file(task, url, ""))
    }
}

/// Resolves an importer by name.
pub fn importer_for(name: &str) -> Result<Box<dyn InputImporter>, AnalystError> {
    match name {
        "flickr" => Ok(Box::new(FlickrImporter)),
        "iiif" => Ok(Box::new(IiifImporter)),
        "pdf" => Ok(Box::new(PdfImporter)),
        other => match other.strip_prefix("field:") {
            Some(field) if !field.is_empty() => Ok(Box::new(FieldImporter::new(field))),
            _ => Err(AnalystError::Validation(format!("unknown importer: {}", other))),
        },
    }
}

fn info_url(task: &Task, key: &str) -> Option<String> {
    task.info
        .get(key)
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

fn input_file(task: &Task, url: String, fallback_ext: &str) -> InputFile {
    let ext = url_extension(&url).unwrap_or_else(|| fallback_ext.to_string());
    InputFile {
        entry_name: format!("{}{}", task.id, ext),
        url,
    }
}

/// The extension of the URL's last path segment, ignoring query and fragment.
pub fn url_extension(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    let valid = !stem.is_empty()
        && (1..=5).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| format!(".{}", ext.to_ascii_lowercase()))
}
