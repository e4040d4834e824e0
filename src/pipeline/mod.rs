//! Pipeline stages for diagram extraction.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and external tools can be swapped behind their trait without touching
//! the geometry.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ vectorize ──▶ primitives ──▶ merge ──▶ export
//! (PDFs)   (pdftocairo)   (quick-xml)   (boxes)   (inkscape crop + autofit)
//! ```
//!
//! 1. [`input`]      — enumerate a corpus directory, validate `%PDF` magic
//! 2. [`vectorize`]  — one SVG artifact per page; page count via lopdf
//! 3. [`primitives`] — drawable elements with exact bounding boxes
//!    ([`pathdata`] handles `d` attributes), filtered by area
//! 4. [`merge`]      — edge-alignment clustering into diagram regions
//! 5. [`export`]     — crop each region, then fit its canvas
//!
//! [`page`] chains steps 2–5 for one page, [`workspace`] owns the directory
//! layout and cleanup, and [`command`] runs external tools with a timeout.

pub mod command;
pub mod export;
pub mod input;
pub mod merge;
pub mod page;
pub mod pathdata;
pub mod primitives;
pub mod vectorize;
pub mod workspace;
