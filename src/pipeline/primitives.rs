//! Primitive extraction: read an intermediate SVG page and list its drawable
//! elements with bounding boxes.
//!
//! Every `path`, `rect`, `circle`, `ellipse`, `line`, `polyline` and
//! `polygon` is visited, including elements inside `<defs>` and `<symbol>`.
//! Coordinates are taken as written; `transform` attributes are not applied.
//!
//! Primitives come out grouped by kind (see [`PrimitiveKind::load_order`]),
//! in document order within each kind. Merging is order-dependent, so this
//! order decides seeds and diagram numbering.
//!
//! Parsing is CPU-bound and runs on the blocking pool, like the other
//! synchronous parsers of the pipeline.

use crate::error::PageError;
use crate::geometry::{BoundingBox, Primitive, PrimitiveKind};
use crate::pipeline::pathdata;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// The artifact could not be read as an SVG document.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("XML error at byte {position}: {detail}")]
    Xml { position: usize, detail: String },

    #[error("root element is '{0}', not 'svg'")]
    NotSvg(String),

    #[error("document is empty")]
    Empty,
}

/// Read `artifact` and extract its primitives.
pub async fn extract_primitives(artifact: &Path, page: usize) -> Result<Vec<Primitive>, PageError> {
    let content = tokio::fs::read_to_string(artifact)
        .await
        .map_err(|e| PageError::ArtifactUnreadable {
            page,
            detail: format!("{}: {}", artifact.display(), e),
        })?;

    let primitives = tokio::task::spawn_blocking(move || parse_primitives(&content))
        .await
        .map_err(|e| PageError::ArtifactUnreadable {
            page,
            detail: format!("Parse task panicked: {}", e),
        })?
        .map_err(|e| PageError::ArtifactUnreadable {
            page,
            detail: e.to_string(),
        })?;

    debug!("Page {}: {} primitives in {}", page, primitives.len(), artifact.display());
    Ok(primitives)
}

/// Parse SVG text into primitives, in load order.
pub fn parse_primitives(content: &str) -> Result<Vec<Primitive>, ArtifactError> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut primitives = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                let local = e.local_name();
                let tag = local.as_ref();
                if !seen_root {
                    if tag != b"svg" {
                        return Err(ArtifactError::NotSvg(String::from_utf8_lossy(tag).into_owned()));
                    }
                    seen_root = true;
                } else if let Some(kind) = PrimitiveKind::from_tag(tag) {
                    let attrs = AttrMap::from_event(&e);
                    match element_bbox(kind, &attrs) {
                        Ok(Some(bbox)) => primitives.push(Primitive { index: 0, kind, bbox }),
                        Ok(None) => {}
                        Err(detail) => warn!("Skipping malformed <{:?}>: {}", kind, detail),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ArtifactError::Xml {
                    position: reader.buffer_position(),
                    detail: e.to_string(),
                });
            }
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(ArtifactError::Empty);
    }

    // Stable: document order survives within each kind.
    primitives.sort_by_key(|p| p.kind.load_order());
    for (i, p) in primitives.iter_mut().enumerate() {
        p.index = i;
    }
    Ok(primitives)
}

/// Keep primitives whose area is at least `min_area`.
pub fn filter_by_area(primitives: Vec<Primitive>, min_area: f64) -> Vec<Primitive> {
    primitives.into_iter().filter(|p| p.area() >= min_area).collect()
}

struct AttrMap {
    attrs: HashMap<String, String>,
}

impl AttrMap {
    fn from_event(e: &BytesStart<'_>) -> Self {
        let mut attrs = HashMap::new();
        for attr in e.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = String::from_utf8_lossy(&attr.value).to_string();
            attrs.insert(key, value);
        }
        Self { attrs }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Plain SVG length; a `px` suffix is accepted, a missing attribute is 0.
    fn length(&self, key: &str) -> f64 {
        self.get(key)
            .and_then(|v| v.trim().trim_end_matches("px").trim().parse().ok())
            .unwrap_or(0.0)
    }
}

/// Bounding box of one element, `Ok(None)` when it draws nothing.
fn element_bbox(kind: PrimitiveKind, attrs: &AttrMap) -> Result<Option<BoundingBox>, String> {
    let bbox = match kind {
        PrimitiveKind::Path => {
            let d = attrs.get("d").unwrap_or("");
            return pathdata::path_bbox(d).map_err(|e| e.to_string());
        }
        PrimitiveKind::Rect => {
            let (x, y) = (attrs.length("x"), attrs.length("y"));
            let (w, h) = (attrs.length("width"), attrs.length("height"));
            if w <= 0.0 || h <= 0.0 {
                return Ok(None);
            }
            BoundingBox::new(x, y, x + w, y + h)
        }
        PrimitiveKind::Circle => {
            let (cx, cy, r) = (attrs.length("cx"), attrs.length("cy"), attrs.length("r"));
            if r <= 0.0 {
                return Ok(None);
            }
            BoundingBox::new(cx - r, cy - r, cx + r, cy + r)
        }
        PrimitiveKind::Ellipse => {
            let (cx, cy) = (attrs.length("cx"), attrs.length("cy"));
            let (rx, ry) = (attrs.length("rx"), attrs.length("ry"));
            if rx <= 0.0 || ry <= 0.0 {
                return Ok(None);
            }
            BoundingBox::new(cx - rx, cy - ry, cx + rx, cy + ry)
        }
        PrimitiveKind::Line => BoundingBox::new(
            attrs.length("x1"),
            attrs.length("y1"),
            attrs.length("x2"),
            attrs.length("y2"),
        ),
        PrimitiveKind::Polyline | PrimitiveKind::Polygon => {
            let points = parse_points(attrs.get("points").unwrap_or(""));
            if points.len() < 2 {
                return Ok(None);
            }
            match BoundingBox::from_points(points) {
                Some(b) => b,
                None => return Ok(None),
            }
        }
    };
    Ok(bbox.is_finite().then_some(bbox))
}

/// Parse a `points` list such as `"10,20 30,40"`; a trailing odd
/// coordinate is dropped.
fn parse_points(points_str: &str) -> Vec<(f64, f64)> {
    let normalized = points_str.replace(',', " ");
    let coords: Vec<f64> = normalized
        .split_whitespace()
        .filter_map(|s| s.parse::<f64>().ok())
        .collect();
    coords.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}
