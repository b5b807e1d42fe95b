// dimensions.rs - Physical size from free-text catalog strings
//
// Catalog entries mix imperial and metric, e.g.
//   "29 1/8 x 36 1/4 in. (73.7 x 92.1 cm)"
//   "H. 73.7 cm; W. 92.1 cm"
// Only centimeter values are read. 1 scene unit = 100 cm.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::error::{Error, Result};

pub const CM_PER_UNIT: f32 = 100.0;

pub const DEFAULT_WIDTH_CM: f32 = 50.0;
pub const DEFAULT_HEIGHT_CM: f32 = 60.0;
/// Thin stretched canvas
pub const DEFAULT_DEPTH_CM: f32 = 0.03;

const NUM: &str = r"(\d+(?:\.\d+)?)";

// "A x B cm" with an optional third "x C"
static PAIR_CM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{NUM}\s*[x×]\s*{NUM}(?:\s*[x×]\s*{NUM})?\s*cm\b")).expect("valid pair regex")
});

// A labelled value may carry inches first: "H. 29 1/8 in. (73.7 cm)"
fn labelled(label: char) -> Regex {
    let pattern = format!(r"\b{label}\.\s*(?:\d+(?:\.\d+)?(?:\s+\d+/\d+)?\s*in\.?\s*\(\s*)?{NUM}\s*cm\b");
    Regex::new(&pattern).expect("valid labelled regex")
}

static HEIGHT_CM: LazyLock<Regex> = LazyLock::new(|| labelled('H'));
static WIDTH_CM: LazyLock<Regex> = LazyLock::new(|| labelled('W'));
static DEPTH_CM: LazyLock<Regex> = LazyLock::new(|| labelled('D'));

static ANY_CM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"{NUM}\s*cm\b")).expect("valid cm regex"));

// The whole statement says the size is missing: "Dimensions unavailable."
static UNAVAILABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:dimensions?|size)?\s*(?:are\s+|is\s+)?(?:unavailable|not\s+available|unknown)\s*\.?\s*$")
        .expect("valid unavailable regex")
});

/// No usable dimensions in the text. Callers substitute [`PhysicalDimensions::fallback`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("could not recover dimensions from {text:?}")]
pub struct NotParseable {
    pub text: String,
}

/// Physical size of a piece in scene units.
///
/// `width_units` is the first catalog value and `height_units` the second,
/// whatever the catalog meant by them; the mesh builder owns the mapping to
/// screen axes.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalDimensions {
    width_units: f32,
    height_units: f32,
    depth_units: Option<f32>,
    source_text: String,
}

impl PhysicalDimensions {
    /// Manual entry, in centimeters.
    pub fn from_centimeters(width_cm: f32, height_cm: f32, depth_cm: Option<f32>) -> Result<Self> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(width_cm) || !valid(height_cm) {
            return Err(Error::InvalidDimensions(format!(
                "width and height must be positive, got {width_cm} x {height_cm} cm"
            )));
        }
        if let Some(d) = depth_cm.filter(|d| !valid(*d)) {
            return Err(Error::InvalidDimensions(format!("depth must be positive, got {d} cm")));
        }

        let text = match depth_cm {
            Some(d) => format!("{width_cm} x {height_cm} x {d} cm"),
            None => format!("{width_cm} x {height_cm} cm"),
        };
        Ok(Self {
            width_units: width_cm / CM_PER_UNIT,
            height_units: height_cm / CM_PER_UNIT,
            depth_units: depth_cm.map(|d| d / CM_PER_UNIT),
            source_text: text,
        })
    }

    /// Fixed 50 x 60 x 0.03 cm stand-in for unparseable catalog text.
    pub fn fallback(source_text: impl Into<String>) -> Self {
        Self {
            width_units: DEFAULT_WIDTH_CM / CM_PER_UNIT,
            height_units: DEFAULT_HEIGHT_CM / CM_PER_UNIT,
            depth_units: Some(DEFAULT_DEPTH_CM / CM_PER_UNIT),
            source_text: source_text.into(),
        }
    }

    pub fn width_units(&self) -> f32 {
        self.width_units
    }

    pub fn height_units(&self) -> f32 {
        self.height_units
    }

    /// Catalogued depth, or the thin-canvas default.
    pub fn depth_units(&self) -> f32 {
        self.depth_units.unwrap_or(DEFAULT_DEPTH_CM / CM_PER_UNIT)
    }

    /// Replace the depth with a manual value, in centimeters.
    pub fn with_depth_cm(mut self, depth_cm: f32) -> Result<Self> {
        if !(depth_cm.is_finite() && depth_cm > 0.0) {
            return Err(Error::InvalidDimensions(format!("depth must be positive, got {depth_cm} cm")));
        }
        self.depth_units = Some(depth_cm / CM_PER_UNIT);
        Ok(self)
    }

    pub fn explicit_depth_units(&self) -> Option<f32> {
        self.depth_units
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }
}

/// Parse a catalog dimension string. Pure.
pub fn parse(text: &str) -> std::result::Result<PhysicalDimensions, NotParseable> {
    let not_parseable = || NotParseable { text: text.to_owned() };

    if UNAVAILABLE.is_match(text) {
        return Err(not_parseable());
    }

    let (width_cm, height_cm, mut depth_cm) = pair_cm(text)
        .or_else(|| labelled_cm(text))
        .or_else(|| scan_cm(text))
        .ok_or_else(not_parseable)?;

    if depth_cm.is_none() {
        depth_cm = capture_cm(&DEPTH_CM, text);
    }

    let positive = |v: f32| v.is_finite() && v > 0.0;
    if !positive(width_cm) || !positive(height_cm) {
        return Err(not_parseable());
    }

    Ok(PhysicalDimensions {
        width_units: width_cm / CM_PER_UNIT,
        height_units: height_cm / CM_PER_UNIT,
        depth_units: depth_cm.filter(|d| positive(*d)).map(|d| d / CM_PER_UNIT),
        source_text: text.to_owned(),
    })
}

/// [`parse`], substituting the default size on failure.
pub fn parse_or_default(text: &str) -> PhysicalDimensions {
    match parse(text) {
        Ok(dims) => dims,
        Err(e) => {
            info!(text, "{e}; using default 50 x 60 cm");
            PhysicalDimensions::fallback(text)
        }
    }
}

type Cm = (f32, f32, Option<f32>);

fn number(m: Option<regex::Match<'_>>) -> Option<f32> {
    m?.as_str().parse().ok()
}

fn pair_cm(text: &str) -> Option<Cm> {
    let caps = PAIR_CM.captures(text)?;
    Some((number(caps.get(1))?, number(caps.get(2))?, number(caps.get(3))))
}

fn labelled_cm(text: &str) -> Option<Cm> {
    let height = capture_cm(&HEIGHT_CM, text)?;
    let width = capture_cm(&WIDTH_CM, text)?;
    Some((width, height, None))
}

fn scan_cm(text: &str) -> Option<Cm> {
    let values: Vec<f32> = ANY_CM
        .captures_iter(text)
        .filter_map(|caps| number(caps.get(1)))
        .collect();
    match values.as_slice() {
        [w, h] => Some((*w, *h, None)),
        [w, h, d, ..] => Some((*w, *h, Some(*d))),
        _ => None,
    }
}

fn capture_cm(re: &Regex, text: &str) -> Option<f32> {
    number(re.captures(text)?.get(1))
}
