//! The three-request media protocol: register, upload, place.

use super::parser::ResponseParser;
use super::transport::{Form, MediaTransport, TransportError, TransportResponse};
use kurbo::Rect;
use std::fmt;
use thiserror::Error;

pub const REGISTER_PATH: &str = "/simple-media/add";
pub const UPLOAD_PATH: &str = "/file/edit";
pub const PLACE_PATH: &str = "/item/add";

/// Default license of registered media.
pub const DEFAULT_LICENSE: &str = "cc-by-nc-nd";

/// One request of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStep {
    Register,
    Upload,
    Place,
}

impl fmt::Display for ProtocolStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProtocolStep::Register => "media registration",
            ProtocolStep::Upload => "file upload",
            ProtocolStep::Place => "item placement",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("{step} failed with HTTP status {status}")]
    Status { step: ProtocolStep, status: u16 },
    #[error("{step} response did not contain an identifier")]
    MissingIdentifier { step: ProtocolStep },
    #[error("item placement was rejected by the server form validation")]
    ValidationFailed,
    #[error("no exposition id in the page address")]
    MissingExposition,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Descriptive fields of a media entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDetails {
    pub name: String,
    pub rights_holder: String,
    pub description: String,
    pub license: String,
}

/// Item rectangle on the remote page, in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl Placement {
    pub fn new(left: i64, top: i64, width: i64, height: i64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rounded bounding box, each side at least `min_size`.
    pub fn from_bounds(bounds: Rect, min_size: f64) -> Self {
        Self {
            left: bounds.x0.round() as i64,
            top: bounds.y0.round() as i64,
            width: bounds.width().max(min_size).round() as i64,
            height: bounds.height().max(min_size).round() as i64,
        }
    }
}

/// Everything one protocol unit sends.
#[derive(Debug, Clone)]
pub struct UploadUnit<'a> {
    pub exposition: &'a str,
    /// Page to place the item on; placement is skipped without one.
    pub page: Option<&'a str>,
    pub details: &'a MediaDetails,
    pub svg: &'a str,
    pub filename: &'a str,
    pub placement: Placement,
}

/// Identifiers produced by a completed unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub media_id: String,
    pub item_id: Option<String>,
}

fn expect_success(step: ProtocolStep, response: &TransportResponse) -> Result<(), ProtocolError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ProtocolError::Status {
            step,
            status: response.status,
        })
    }
}

/// Step 1: create an empty media entry and return its id.
pub async fn register_media<T: MediaTransport + ?Sized>(
    transport: &T,
    parser: &dyn ResponseParser,
    exposition: &str,
    details: &MediaDetails,
) -> Result<String, ProtocolError> {
    let form = Form::new()
        .text("research", exposition)
        .text("image[mediatype]", "image")
        .text("image[name]", details.name.as_str())
        .text("image[copyrightholder]", details.rights_holder.as_str())
        .text("image[license]", details.license.as_str())
        .text("image[description]", details.description.as_str())
        .text("image[submitbutton]", "image[submitbutton]")
        .text("iframe-submit", "true")
        .file("media", "", "application/octet-stream", Vec::new());

    let response = transport.post_form(REGISTER_PATH, form).await?;
    expect_success(ProtocolStep::Register, &response)?;
    parser
        .media_id(&response.body)
        .ok_or(ProtocolError::MissingIdentifier {
            step: ProtocolStep::Register,
        })
}

/// Step 2: attach the SVG payload to a registered media entry.
pub async fn upload_payload<T: MediaTransport + ?Sized>(
    transport: &T,
    media_id: &str,
    svg: &str,
    filename: &str,
) -> Result<(), ProtocolError> {
    let form = Form::new()
        .text("file", media_id)
        .text("submit-async-file", "false")
        .text("image[submitbutton]", "imageimage[submitbutton]")
        .text("iframe-submit", "true")
        .file("media", filename, "image/svg+xml", svg.as_bytes().to_vec());

    let response = transport.post_form(UPLOAD_PATH, form).await?;
    expect_success(ProtocolStep::Upload, &response)
}

/// Step 3: place the media on a page and return the item id.
///
/// The status is not checked: the service answers rejected forms with a
/// success status, and the body is what tells the outcome.
pub async fn place_item<T: MediaTransport + ?Sized>(
    transport: &T,
    parser: &dyn ResponseParser,
    exposition: &str,
    page: &str,
    media_id: &str,
    placement: Placement,
) -> Result<String, ProtocolError> {
    let form = Form::new()
        .text("research", exposition)
        .text("weave", page)
        .text("toolType", "picture")
        .text("tool", "picture")
        .text("file", media_id)
        .text("left", placement.left.to_string())
        .text("top", placement.top.to_string())
        .text("width", placement.width.to_string())
        .text("height", placement.height.to_string());

    let response = transport.post_form(PLACE_PATH, form).await?;
    if parser.validation_failed(&response.body) {
        return Err(ProtocolError::ValidationFailed);
    }
    parser
        .item_id(&response.body)
        .ok_or(ProtocolError::MissingIdentifier {
            step: ProtocolStep::Place,
        })
}

/// Run the protocol for one unit, stopping at the first failed step.
pub async fn run_unit<T: MediaTransport + ?Sized>(
    transport: &T,
    parser: &dyn ResponseParser,
    unit: &UploadUnit<'_>,
) -> Result<UnitOutcome, ProtocolError> {
    let media_id = register_media(transport, parser, unit.exposition, unit.details).await?;
    log::info!("Registered media {}", media_id);

    upload_payload(transport, &media_id, unit.svg, unit.filename).await?;
    log::info!("Uploaded {} to media {}", unit.filename, media_id);

    let item_id = match unit.page {
        Some(page) => {
            let item_id =
                place_item(transport, parser, unit.exposition, page, &media_id, unit.placement)
                    .await?;
            log::info!("Placed media {} as item {} on page {}", media_id, item_id, page);
            Some(item_id)
        }
        None => {
            log::info!("No page target, media {} left unplaced", media_id);
            None
        }
    };

    Ok(UnitOutcome { media_id, item_id })
}
