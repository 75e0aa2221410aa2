//! Publishing annotations to the remote media service.
//!
//! Two modes share the same three-request protocol: the whole scene as one
//! SVG, or every object as its own SVG. Per-object uploads record the remote
//! identifiers on the object, so a second run skips what is already published.

mod parser;
mod protocol;
mod target;
mod transport;

pub use parser::{RegexResponseParser, ResponseParser, VALIDATION_FAILED_MARKER};
pub use protocol::{
    DEFAULT_LICENSE, MediaDetails, PLACE_PATH, Placement, ProtocolError, ProtocolStep,
    REGISTER_PATH, UPLOAD_PATH, UnitOutcome, UploadUnit, place_item, register_media, run_unit,
    upload_payload,
};
pub use target::{PageTargetMatcher, is_permitted_host};
pub use transport::{
    Form, FormField, FormValue, MediaTransport, TransportError, TransportResponse, UreqTransport,
};

#[cfg(test)]
pub(crate) use transport::scripted::ScriptedTransport;

use crate::export::{object_to_svg, path_filename, scene_to_svg};
use crate::scene::{Scene, UploadRecord};
use crate::shapes::Shape;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Host the uploads are allowed from.
pub const DEFAULT_HOST: &str = "researchcatalogue.net";

pub const DEFAULT_BASE_URL: &str = "https://www.researchcatalogue.net";

pub const DEFAULT_RIGHTS_HOLDER: &str = "Web Marker User";

#[derive(Debug, Clone, PartialEq)]
pub struct UploadConfig {
    pub base_url: String,
    /// Uploads are refused unless the page is served by this host.
    pub permitted_host: String,
    /// Delay after each successful object upload.
    pub throttle: Duration,
    /// Blank margin around an isolated object.
    pub padding: f64,
    /// Smallest width and height of an isolated object.
    pub min_size: f64,
    pub rights_holder: String,
    pub license: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            permitted_host: DEFAULT_HOST.to_string(),
            throttle: Duration::from_millis(500),
            padding: 10.0,
            min_size: 10.0,
            rights_holder: DEFAULT_RIGHTS_HOLDER.to_string(),
            license: DEFAULT_LICENSE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("uploads are only available on {host} pages")]
    HostNotPermitted { host: String },
    #[error("nothing to upload: the drawing is empty")]
    EmptyScene,
    #[error("all path uploads failed")]
    AllUploadsFailed,
    #[error("the overlay session is closed")]
    SessionClosed,
    #[error("could not render object for upload: {0}")]
    Render(String),
}

/// How a save reaches the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// Whole scene as one SVG.
    Single,
    /// One SVG per object.
    Objects,
}

/// Result of one object in a per-object batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectOutcome {
    Uploaded {
        media_id: String,
        item_id: Option<String>,
    },
    /// Already published by an earlier run; no request was made.
    Skipped {
        media_id: String,
        item_id: Option<String>,
    },
    Failed(UploadError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectUploadResult {
    /// Position of the object in the scene.
    pub index: usize,
    pub outcome: ObjectOutcome,
}

impl ObjectUploadResult {
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, ObjectOutcome::Skipped { .. })
    }

    pub fn error(&self) -> Option<&UploadError> {
        match &self.outcome {
            ObjectOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Per-object batch summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub results: Vec<ObjectUploadResult>,
}

impl BatchReport {
    fn count(&self, f: impl Fn(&ObjectOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| f(&r.outcome)).count()
    }

    /// Objects published by this run.
    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, ObjectOutcome::Uploaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ObjectOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ObjectOutcome::Failed(_)))
    }

    /// Short user-facing summary.
    pub fn summary(&self) -> String {
        let mut text = if self.skipped() > 0 {
            format!(
                "Uploaded {} new paths, {} already existed",
                self.uploaded(),
                self.skipped()
            )
        } else {
            format!("Successfully uploaded {} paths", self.uploaded())
        };
        if self.failed() > 0 {
            text.push_str(&format!(", {} failed", self.failed()));
        }
        text
    }
}

/// Per-object progress, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub current: usize,
    pub total: usize,
}

impl UploadProgress {
    pub fn message(&self) -> String {
        format!("Uploading path {}/{}...", self.current, self.total)
    }
}

/// Drives the media protocol for a page.
pub struct UploadSynchronizer<T: MediaTransport> {
    config: UploadConfig,
    transport: Arc<T>,
    parser: Box<dyn ResponseParser>,
    targets: PageTargetMatcher,
}

impl<T: MediaTransport> UploadSynchronizer<T> {
    /// Synchronizer with the default response parser.
    pub fn new(config: UploadConfig, transport: Arc<T>) -> Result<Self, regex::Error> {
        Self::with_parser(config, transport, Box::new(RegexResponseParser::new()?))
    }

    pub fn with_parser(
        config: UploadConfig,
        transport: Arc<T>,
        parser: Box<dyn ResponseParser>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            config,
            transport,
            parser,
            targets: PageTargetMatcher::new()?,
        })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    fn rights_holder(&self, rights_holder: Option<&str>) -> String {
        match rights_holder.map(str::trim) {
            Some(holder) if !holder.is_empty() => holder.to_string(),
            _ => self.config.rights_holder.clone(),
        }
    }

    /// Host check and exposition lookup shared by both modes.
    fn exposition_for(&self, page_url: &str) -> Result<String, UploadError> {
        if !is_permitted_host(page_url, &self.config.permitted_host) {
            return Err(UploadError::HostNotPermitted {
                host: self.config.permitted_host.clone(),
            });
        }
        self.targets
            .exposition_id(page_url)
            .ok_or(UploadError::Protocol(ProtocolError::MissingExposition))
    }

    /// Upload the whole scene as one SVG, placed over the full surface.
    pub async fn upload_single(
        &self,
        scene: &Scene,
        page_url: &str,
        rights_holder: Option<&str>,
        filename: &str,
    ) -> Result<UnitOutcome, UploadError> {
        let exposition = self.exposition_for(page_url)?;
        let page = self.targets.page_id(page_url);
        log::info!("Uploading drawing to exposition {} (page {:?})", exposition, page);

        let details = MediaDetails {
            name: format!("Web Marker Drawing - {}", local_time(&Local::now())),
            rights_holder: self.rights_holder(rights_holder),
            description: format!("Drawing created with Web Marker extension on {page_url}"),
            license: self.config.license.clone(),
        };
        let svg = scene_to_svg(scene);
        let unit = UploadUnit {
            exposition: &exposition,
            page: page.as_deref(),
            details: &details,
            svg: &svg,
            filename,
            placement: Placement::new(
                0,
                0,
                scene.width().round() as i64,
                scene.height().round() as i64,
            ),
        };

        let outcome = run_unit(self.transport.as_ref(), self.parser.as_ref(), &unit)
            .await
            .inspect_err(|e| log::error!("Single SVG upload failed: {}", e))?;
        Ok(outcome)
    }

    /// Upload every object not yet published, in scene order.
    ///
    /// Successful objects get an [`UploadRecord`]; failures are kept per
    /// object and do not stop the batch. Fails only when the scene is empty
    /// or nothing was uploaded or skipped.
    pub async fn upload_objects(
        &self,
        scene: &mut Scene,
        page_url: &str,
        rights_holder: Option<&str>,
        mut progress: impl FnMut(UploadProgress),
    ) -> Result<BatchReport, UploadError> {
        let exposition = self.exposition_for(page_url)?;
        // Eraser strokes only mask other objects and have no image of their own
        let batch: Vec<_> = scene
            .objects()
            .iter()
            .enumerate()
            .filter(|(_, object)| !object.shape.is_eraser())
            .map(|(index, object)| (index, object.id()))
            .collect();
        if batch.is_empty() {
            return Err(UploadError::EmptyScene);
        }
        let page = self.targets.page_id(page_url);
        let rights_holder = self.rights_holder(rights_holder);

        let total = batch.len();
        log::info!("Uploading {} objects to exposition {}", total, exposition);

        let mut report = BatchReport::default();
        for (position, (index, id)) in batch.into_iter().enumerate() {
            let Some(object) = scene.get(id) else {
                continue;
            };
            let number = position + 1;

            if object.is_uploaded() {
                if let Some(record) = &object.upload {
                    log::info!(
                        "Object {} already uploaded (media {}), skipping",
                        number,
                        record.media_id
                    );
                    report.results.push(ObjectUploadResult {
                        index,
                        outcome: ObjectOutcome::Skipped {
                            media_id: record.media_id.clone(),
                            item_id: record.item_id.clone(),
                        },
                    });
                }
                continue;
            }

            progress(UploadProgress {
                current: number,
                total,
            });

            let bounds = object.shape.visual_bounds();
            let blank = matches!(&object.shape, Shape::Freehand(stroke) if stroke.is_empty());
            if blank || !bounds.is_finite() {
                let error = UploadError::Render(format!("object {} has no geometry", number));
                log::error!("Failed to upload path {}: {}", number, error);
                report.results.push(ObjectUploadResult {
                    index,
                    outcome: ObjectOutcome::Failed(error),
                });
                continue;
            }

            let now = Local::now();
            let details = MediaDetails {
                name: format!("Web Marker Path {} - {}", number, local_time(&now)),
                rights_holder: rights_holder.clone(),
                description: format!(
                    "Individual drawing path {} created with Web Marker extension on {}",
                    number,
                    page_url
                ),
                license: self.config.license.clone(),
            };
            let svg = object_to_svg(object, self.config.padding, self.config.min_size);
            let filename = path_filename(position, &now);
            let unit = UploadUnit {
                exposition: &exposition,
                page: page.as_deref(),
                details: &details,
                svg: &svg,
                filename: &filename,
                placement: Placement::from_bounds(bounds, self.config.min_size),
            };

            match run_unit(self.transport.as_ref(), self.parser.as_ref(), &unit).await {
                Ok(outcome) => {
                    if let Some(object) = scene.get_mut(id) {
                        object.mark_uploaded(UploadRecord::new(
                            outcome.media_id.clone(),
                            outcome.item_id.clone(),
                        ));
                    }
                    log::info!("Uploaded path {}/{}", number, total);
                    report.results.push(ObjectUploadResult {
                        index,
                        outcome: ObjectOutcome::Uploaded {
                            media_id: outcome.media_id,
                            item_id: outcome.item_id,
                        },
                    });
                    self.transport.pause(self.config.throttle).await;
                }
                Err(e) => {
                    log::error!("Failed to upload path {}: {}", number, e);
                    report.results.push(ObjectUploadResult {
                        index,
                        outcome: ObjectOutcome::Failed(e.into()),
                    });
                }
            }
        }

        log::info!(
            "Upload complete: {}/{} uploaded, {} skipped",
            report.uploaded(),
            total,
            report.skipped()
        );
        if report.uploaded() == 0 && report.skipped() == 0 {
            return Err(UploadError::AllUploadsFailed);
        }
        Ok(report)
    }
}

fn local_time(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
