use std::path::{Path, PathBuf};

use url::Url;

use crate::PlanInput;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PdfSource {
    Remote(Url),
    Local(PathBuf),
}

/// A PDF known to the pipeline, either still on the web or already on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfRef {
    source: PdfSource,
    size: Option<u64>,
}

impl PdfRef {
    pub fn remote(url: Url) -> Self {
        Self {
            source: PdfSource::Remote(url),
            size: None,
        }
    }

    pub fn local(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            source: PdfSource::Local(path.into()),
            size: Some(size),
        }
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn url(&self) -> Option<&Url> {
        match &self.source {
            PdfSource::Remote(url) => Some(url),
            PdfSource::Local(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            PdfSource::Local(path) => Some(path),
            PdfSource::Remote(_) => None,
        }
    }

    /// Planner input for a local file of known size.
    pub fn to_plan_input(&self) -> Option<PlanInput> {
        match (&self.source, self.size) {
            (PdfSource::Local(path), Some(size)) => Some(PlanInput::new(path.clone(), size)),
            _ => None,
        }
    }
}
