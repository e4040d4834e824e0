//! SVG path-data (`d` attribute) bounding boxes.
//!
//! Supports the full command set (`M L H V C S Q T A Z`, absolute and
//! relative, implicit repeats, compact arc flags). Bounds are exact: curve
//! extrema come from the derivative roots, arc extrema from the centre
//! parameterisation. Only drawn segments contribute; a lone moveto does not.

use crate::geometry::BoundingBox;
use once_cell::sync::Lazy;
use regex::Regex;
use std::f64::consts::{PI, TAU};
use thiserror::Error;

static RE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").unwrap());

/// Malformed path data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathDataError {
    #[error("path data must start with a moveto, found '{found}' at offset {offset}")]
    MissingMoveTo { found: char, offset: usize },

    #[error("unexpected '{found}' at offset {offset}")]
    UnexpectedToken { found: char, offset: usize },

    #[error("command '{command}' is missing parameters at offset {offset}")]
    MissingParameters { command: char, offset: usize },
}

/// Bounding box of everything the path draws, or `None` when it draws nothing.
pub fn path_bbox(d: &str) -> Result<Option<BoundingBox>, PathDataError> {
    let mut cursor = Cursor::new(d);
    let mut bounds = Bounds::default();

    let mut current = (0.0_f64, 0.0_f64);
    let mut subpath_start = current;
    // Last control point of the previous C/S or Q/T segment, for reflection.
    let mut last_cubic_ctrl: Option<(f64, f64)> = None;
    let mut last_quad_ctrl: Option<(f64, f64)> = None;
    let mut first = true;

    while let Some((command, offset)) = cursor.command()? {
        if first && !matches!(command, 'M' | 'm') {
            return Err(PathDataError::MissingMoveTo { found: command, offset });
        }
        first = false;

        let relative = command.is_ascii_lowercase();
        let upper = command.to_ascii_uppercase();

        if upper == 'Z' {
            if current != subpath_start {
                bounds.line(current, subpath_start);
            }
            current = subpath_start;
            last_cubic_ctrl = None;
            last_quad_ctrl = None;
            continue;
        }

        let mut groups = 0usize;
        while cursor.has_number() || groups == 0 {
            let base = if relative { current } else { (0.0, 0.0) };
            let mut cubic_ctrl = None;
            let mut quad_ctrl = None;

            match upper {
                'M' => {
                    let p = cursor.point(command, base)?;
                    if groups == 0 {
                        current = p;
                        subpath_start = p;
                    } else {
                        // Extra coordinate pairs after a moveto are linetos.
                        bounds.line(current, p);
                        current = p;
                    }
                }
                'L' => {
                    let p = cursor.point(command, base)?;
                    bounds.line(current, p);
                    current = p;
                }
                'H' => {
                    let x = cursor.number(command)? + base.0;
                    let p = (x, current.1);
                    bounds.line(current, p);
                    current = p;
                }
                'V' => {
                    let y = cursor.number(command)? + base.1;
                    let p = (current.0, y);
                    bounds.line(current, p);
                    current = p;
                }
                'C' => {
                    let c1 = cursor.point(command, base)?;
                    let c2 = cursor.point(command, base)?;
                    let p = cursor.point(command, base)?;
                    bounds.cubic(current, c1, c2, p);
                    cubic_ctrl = Some(c2);
                    current = p;
                }
                'S' => {
                    let c1 = reflect(last_cubic_ctrl, current);
                    let c2 = cursor.point(command, base)?;
                    let p = cursor.point(command, base)?;
                    bounds.cubic(current, c1, c2, p);
                    cubic_ctrl = Some(c2);
                    current = p;
                }
                'Q' => {
                    let c = cursor.point(command, base)?;
                    let p = cursor.point(command, base)?;
                    bounds.quadratic(current, c, p);
                    quad_ctrl = Some(c);
                    current = p;
                }
                'T' => {
                    let c = reflect(last_quad_ctrl, current);
                    let p = cursor.point(command, base)?;
                    bounds.quadratic(current, c, p);
                    quad_ctrl = Some(c);
                    current = p;
                }
                'A' => {
                    let rx = cursor.number(command)?;
                    let ry = cursor.number(command)?;
                    let rotation = cursor.number(command)?;
                    let large_arc = cursor.flag(command)?;
                    let sweep = cursor.flag(command)?;
                    let p = cursor.point(command, base)?;
                    bounds.arc(current, rx, ry, rotation, large_arc, sweep, p);
                    current = p;
                }
                _ => {
                    return Err(PathDataError::UnexpectedToken { found: command, offset });
                }
            }

            last_cubic_ctrl = cubic_ctrl;
            last_quad_ctrl = quad_ctrl;
            groups += 1;
        }
    }

    Ok(bounds.finish())
}

/// Mirror the previous control point through `current`; falls back to
/// `current` itself when the previous segment was of another kind.
fn reflect(ctrl: Option<(f64, f64)>, current: (f64, f64)) -> (f64, f64) {
    match ctrl {
        Some((cx, cy)) => (2.0 * current.0 - cx, 2.0 * current.1 - cy),
        None => current,
    }
}

// ── Tokenising ───────────────────────────────────────────────────────────

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn skip_separators(&mut self) {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && (bytes[self.pos].is_ascii_whitespace() || bytes[self.pos] == b',') {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_separators();
        self.src[self.pos..].chars().next()
    }

    /// Next command letter, `None` at end of input.
    fn command(&mut self) -> Result<Option<(char, usize)>, PathDataError> {
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let offset = self.pos;
        if "MmLlHhVvCcSsQqTtAaZz".contains(c) {
            self.pos += 1;
            Ok(Some((c, offset)))
        } else {
            Err(PathDataError::UnexpectedToken { found: c, offset })
        }
    }

    fn has_number(&mut self) -> bool {
        matches!(self.peek(), Some(c) if c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    }

    fn number(&mut self, command: char) -> Result<f64, PathDataError> {
        self.skip_separators();
        let rest = &self.src[self.pos..];
        let m = RE_NUMBER.find(rest).ok_or(PathDataError::MissingParameters {
            command,
            offset: self.pos,
        })?;
        let value = m.as_str().parse::<f64>().map_err(|_| PathDataError::MissingParameters {
            command,
            offset: self.pos,
        })?;
        self.pos += m.end();
        Ok(value)
    }

    /// Arc flags are a single `0`/`1` and may be written without separators.
    fn flag(&mut self, command: char) -> Result<bool, PathDataError> {
        match self.peek() {
            Some('0') => {
                self.pos += 1;
                Ok(false)
            }
            Some('1') => {
                self.pos += 1;
                Ok(true)
            }
            _ => Err(PathDataError::MissingParameters {
                command,
                offset: self.pos,
            }),
        }
    }

    fn point(&mut self, command: char, base: (f64, f64)) -> Result<(f64, f64), PathDataError> {
        let x = self.number(command)?;
        let y = self.number(command)?;
        Ok((x + base.0, y + base.1))
    }
}

// ── Segment bounds ───────────────────────────────────────────────────────

#[derive(Default)]
struct Bounds {
    bbox: Option<BoundingBox>,
}

impl Bounds {
    fn point(&mut self, (x, y): (f64, f64)) {
        self.bbox = Some(match self.bbox {
            Some(b) => b.include_point(x, y),
            None => BoundingBox::new(x, y, x, y),
        });
    }

    fn line(&mut self, from: (f64, f64), to: (f64, f64)) {
        self.point(from);
        self.point(to);
    }

    fn cubic(&mut self, p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) {
        self.line(p0, p3);
        let mut ts = cubic_extrema(p0.0, p1.0, p2.0, p3.0);
        ts.extend(cubic_extrema(p0.1, p1.1, p2.1, p3.1));
        for t in ts {
            self.point((cubic_at(p0.0, p1.0, p2.0, p3.0, t), cubic_at(p0.1, p1.1, p2.1, p3.1, t)));
        }
    }

    fn quadratic(&mut self, p0: (f64, f64), p1: (f64, f64), p2: (f64, f64)) {
        self.line(p0, p2);
        for t in [quadratic_extremum(p0.0, p1.0, p2.0), quadratic_extremum(p0.1, p1.1, p2.1)]
            .into_iter()
            .flatten()
        {
            self.point((quadratic_at(p0.0, p1.0, p2.0, t), quadratic_at(p0.1, p1.1, p2.1, t)));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn arc(
        &mut self,
        from: (f64, f64),
        rx: f64,
        ry: f64,
        rotation_deg: f64,
        large_arc: bool,
        sweep: bool,
        to: (f64, f64),
    ) {
        if from == to {
            return;
        }
        let (mut rx, mut ry) = (rx.abs(), ry.abs());
        if rx == 0.0 || ry == 0.0 {
            self.line(from, to);
            return;
        }
        self.line(from, to);

        let phi = rotation_deg.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();

        // Endpoint to centre parameterisation.
        let dx2 = (from.0 - to.0) / 2.0;
        let dy2 = (from.1 - to.1) / 2.0;
        let x1p = cos_phi * dx2 + sin_phi * dy2;
        let y1p = -sin_phi * dx2 + cos_phi * dy2;

        let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
        if lambda > 1.0 {
            let s = lambda.sqrt();
            rx *= s;
            ry *= s;
        }

        let num = rx * rx * ry * ry - rx * rx * y1p * y1p - ry * ry * x1p * x1p;
        let den = rx * rx * y1p * y1p + ry * ry * x1p * x1p;
        let mut coef = if den == 0.0 { 0.0 } else { (num / den).max(0.0).sqrt() };
        if large_arc == sweep {
            coef = -coef;
        }
        let cxp = coef * rx * y1p / ry;
        let cyp = -coef * ry * x1p / rx;
        let cx = cos_phi * cxp - sin_phi * cyp + (from.0 + to.0) / 2.0;
        let cy = sin_phi * cxp + cos_phi * cyp + (from.1 + to.1) / 2.0;

        let theta1 = ((y1p - cyp) / ry).atan2((x1p - cxp) / rx);
        let theta2 = ((-y1p - cyp) / ry).atan2((-x1p - cxp) / rx);
        let mut delta = theta2 - theta1;
        if !sweep && delta > 0.0 {
            delta -= TAU;
        } else if sweep && delta < 0.0 {
            delta += TAU;
        }

        let at = |theta: f64| {
            let (s, c) = theta.sin_cos();
            (
                cx + rx * cos_phi * c - ry * sin_phi * s,
                cy + rx * sin_phi * c + ry * cos_phi * s,
            )
        };

        let theta_x = (-ry * sin_phi).atan2(rx * cos_phi);
        let theta_y = (ry * cos_phi).atan2(rx * sin_phi);
        for theta in [theta_x, theta_x + PI, theta_y, theta_y + PI] {
            if angle_in_sweep(theta, theta1, delta) {
                self.point(at(theta));
            }
        }
    }

    fn finish(self) -> Option<BoundingBox> {
        self.bbox
    }
}

fn angle_in_sweep(theta: f64, start: f64, delta: f64) -> bool {
    if delta >= 0.0 {
        (theta - start).rem_euclid(TAU) <= delta
    } else {
        (start - theta).rem_euclid(TAU) <= -delta
    }
}

/// Parameters in (0, 1) where the cubic's derivative vanishes.
fn cubic_extrema(p0: f64, p1: f64, p2: f64, p3: f64) -> Vec<f64> {
    let a = -p0 + 3.0 * p1 - 3.0 * p2 + p3;
    let b = 2.0 * (p0 - 2.0 * p1 + p2);
    let c = p1 - p0;
    let mut roots = Vec::with_capacity(2);
    if a.abs() < 1e-12 {
        if b.abs() > 1e-12 {
            roots.push(-c / b);
        }
    } else {
        let disc = b * b - 4.0 * a * c;
        if disc >= 0.0 {
            let sq = disc.sqrt();
            roots.push((-b + sq) / (2.0 * a));
            roots.push((-b - sq) / (2.0 * a));
        }
    }
    roots.retain(|t| *t > 0.0 && *t < 1.0);
    roots
}

fn cubic_at(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    mt * mt * mt * p0 + 3.0 * mt * mt * t * p1 + 3.0 * mt * t * t * p2 + t * t * t * p3
}

fn quadratic_extremum(p0: f64, p1: f64, p2: f64) -> Option<f64> {
    let denom = p0 - 2.0 * p1 + p2;
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = (p0 - p1) / denom;
    (t > 0.0 && t < 1.0).then_some(t)
}

fn quadratic_at(p0: f64, p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    mt * mt * p0 + 2.0 * mt * t * p1 + t * t * p2
}
