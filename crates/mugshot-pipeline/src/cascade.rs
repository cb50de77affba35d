//! Boosted cascade of Haar-like features.
//!
//! [`HaarCascade`] holds a pre-trained frontal-face classifier and
//! evaluates it on one detection window at a time. Cascades are loaded
//! from the OpenCV cascade XML format (`<cascade>` with `stageType BOOST`
//! and `featureType HAAR`), which is how the stock face models ship.
//!
//! Evaluation works on a pair of integral images (plain and squared) so
//! that every rectangle sum costs four lookups. Each window is variance
//! normalized over its inner rectangle before features are compared with
//! the tree thresholds.
//!
//! Only upright features are supported. Cascades with tilted features or
//! a non-Haar feature type are rejected when parsed.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::types::Dimensions;

/// Errors raised while building or parsing a cascade.
#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    /// The document is not well-formed XML.
    #[error("malformed cascade XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A required element is absent.
    #[error("cascade is missing `{0}`")]
    MissingField(&'static str),

    /// A numeric field could not be parsed.
    #[error("invalid number `{value}` in `{field}`")]
    InvalidNumber {
        /// Element the value came from.
        field: &'static str,
        /// Offending text.
        value: String,
    },

    /// The cascade uses a capability this evaluator does not implement.
    #[error("unsupported cascade: {0}")]
    Unsupported(String),

    /// The cascade is internally inconsistent.
    #[error("inconsistent cascade: {0}")]
    Malformed(String),
}

/// One weighted rectangle of a Haar-like feature, in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedRect {
    /// Left edge inside the window.
    pub x: u32,
    /// Top edge inside the window.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Multiplier applied to the rectangle's pixel sum.
    pub weight: f64,
}

/// A Haar-like feature: a weighted sum of one to three rectangle sums.
#[derive(Debug, Clone, PartialEq)]
pub struct HaarFeature {
    /// The rectangles making up the feature.
    pub rects: Vec<WeightedRect>,
}

/// A split node of a weak classifier's decision tree.
///
/// Child indices follow the OpenCV convention: a positive value is the
/// index of another node, zero or a negative value `-n` is leaf `n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    /// Child taken when the feature value is below `threshold`.
    pub left: i32,
    /// Child taken otherwise.
    pub right: i32,
    /// Index into [`HaarCascade`]'s feature table.
    pub feature: usize,
    /// Split threshold on the normalized feature value.
    pub threshold: f64,
}

/// A boosted weak classifier (a decision tree, usually a stump).
#[derive(Debug, Clone, PartialEq)]
pub struct WeakClassifier {
    /// Split nodes; node 0 is the root.
    pub nodes: Vec<TreeNode>,
    /// Leaf votes.
    pub leaves: Vec<f64>,
}

/// One cascade stage: the window passes when the summed votes of its
/// weak classifiers reach `threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// Minimum vote total for the window to pass.
    pub threshold: f64,
    /// Weak classifiers voting in this stage.
    pub classifiers: Vec<WeakClassifier>,
}

/// Outcome of running the cascade on one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every stage passed.
    Accepted,
    /// The window was rejected by the stage at this index.
    Rejected {
        /// Index of the rejecting stage.
        stage: usize,
    },
}

/// A validated boosted cascade of Haar-like features.
#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    window: Dimensions,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    /// Build a cascade from its parts, checking that every index and
    /// rectangle is consistent with the window.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::Malformed`] when the window is smaller than
    /// 3x3, there are no stages, a tree references a missing node, leaf
    /// or feature, or a feature rectangle leaves the window.
    pub fn new(
        window: Dimensions,
        stages: Vec<Stage>,
        features: Vec<HaarFeature>,
    ) -> Result<Self, CascadeError> {
        if window.width < 3 || window.height < 3 {
            return Err(CascadeError::Malformed(format!(
                "detection window {window} is smaller than 3x3"
            )));
        }
        if stages.is_empty() {
            return Err(CascadeError::Malformed("cascade has no stages".to_owned()));
        }
        for (index, feature) in features.iter().enumerate() {
            validate_feature(index, feature, window)?;
        }
        for (stage_index, stage) in stages.iter().enumerate() {
            if stage.classifiers.is_empty() {
                return Err(CascadeError::Malformed(format!(
                    "stage {stage_index} has no weak classifiers"
                )));
            }
            for classifier in &stage.classifiers {
                validate_classifier(stage_index, classifier, features.len())?;
            }
        }
        Ok(Self {
            window,
            stages,
            features,
        })
    }

    /// Parse a cascade from OpenCV cascade XML.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::Xml`] for malformed documents,
    /// [`CascadeError::MissingField`] / [`CascadeError::InvalidNumber`] for
    /// incomplete or unreadable fields, [`CascadeError::Unsupported`] for
    /// non-Haar or tilted cascades, and [`CascadeError::Malformed`] when the
    /// parsed parts are inconsistent.
    pub fn from_xml(xml: &str) -> Result<Self, CascadeError> {
        let mut reader = Reader::from_reader(xml.as_bytes());
        reader.trim_text(true);
        let mut buf = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut draft = Draft::default();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    path.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    draft.open(&path);
                }
                Event::End(_) => {
                    path.pop();
                }
                Event::Text(e) => {
                    let text = e.unescape()?;
                    draft.text(&path, &text)?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        draft.finish()
    }

    /// Size of the detection window the cascade was trained on.
    #[must_use]
    pub const fn window(&self) -> Dimensions {
        self.window
    }

    /// Number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Number of distinct features.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Run the cascade on the window whose top-left corner is `(x, y)`.
    ///
    /// The window must lie inside the image the integral images were
    /// built from.
    #[must_use]
    pub fn evaluate(&self, integral: &IntegralImages, x: u32, y: u32) -> Verdict {
        let inner_w = self.window.width - 2;
        let inner_h = self.window.height - 2;
        let area = f64::from(inner_w) * f64::from(inner_h);
        let sum = integral.sum(x + 1, y + 1, inner_w, inner_h);
        let squared = integral.squared_sum(x + 1, y + 1, inner_w, inner_h);
        let spread = area.mul_add(squared, -(sum * sum));
        let norm = if spread > 0.0 { spread.sqrt() } else { 1.0 };
        let inv_norm = norm.recip();

        for (index, stage) in self.stages.iter().enumerate() {
            let votes: f64 = stage
                .classifiers
                .iter()
                .map(|classifier| self.vote(classifier, integral, x, y, inv_norm))
                .sum();
            if votes < stage.threshold {
                return Verdict::Rejected { stage: index };
            }
        }
        Verdict::Accepted
    }

    /// Walk one decision tree and return its leaf vote.
    fn vote(
        &self,
        classifier: &WeakClassifier,
        integral: &IntegralImages,
        x: u32,
        y: u32,
        inv_norm: f64,
    ) -> f64 {
        let mut index = 0_usize;
        loop {
            let node = &classifier.nodes[index];
            let value = self.feature_value(node.feature, integral, x, y) * inv_norm;
            let next = if value < node.threshold {
                node.left
            } else {
                node.right
            };
            match usize::try_from(next) {
                Ok(child) if child > 0 => index = child,
                _ => return classifier.leaves[next.unsigned_abs() as usize],
            }
        }
    }

    fn feature_value(&self, feature: usize, integral: &IntegralImages, x: u32, y: u32) -> f64 {
        self.features[feature]
            .rects
            .iter()
            .map(|r| r.weight * integral.sum(x + r.x, y + r.y, r.width, r.height))
            .sum()
    }
}

fn validate_feature(
    index: usize,
    feature: &HaarFeature,
    window: Dimensions,
) -> Result<(), CascadeError> {
    if feature.rects.is_empty() || feature.rects.len() > 3 {
        return Err(CascadeError::Malformed(format!(
            "feature {index} has {} rectangles, expected 1 to 3",
            feature.rects.len()
        )));
    }
    for r in &feature.rects {
        let right = u64::from(r.x) + u64::from(r.width);
        let bottom = u64::from(r.y) + u64::from(r.height);
        if right > u64::from(window.width) || bottom > u64::from(window.height) {
            return Err(CascadeError::Malformed(format!(
                "feature {index} rectangle {}x{}+{}+{} leaves the {window} window",
                r.width, r.height, r.x, r.y
            )));
        }
    }
    Ok(())
}

fn validate_classifier(
    stage: usize,
    classifier: &WeakClassifier,
    feature_count: usize,
) -> Result<(), CascadeError> {
    let malformed = |what: String| CascadeError::Malformed(format!("stage {stage}: {what}"));
    if classifier.nodes.is_empty() {
        return Err(malformed("weak classifier has no nodes".to_owned()));
    }
    for (index, node) in classifier.nodes.iter().enumerate() {
        if node.feature >= feature_count {
            return Err(malformed(format!(
                "node {index} uses feature {} of {feature_count}",
                node.feature
            )));
        }
        for child in [node.left, node.right] {
            match usize::try_from(child) {
                // Children always come after their parent, which rules out cycles.
                Ok(next) if next > 0 => {
                    if next <= index || next >= classifier.nodes.len() {
                        return Err(malformed(format!("node {index} points at node {next}")));
                    }
                }
                _ => {
                    let leaf = child.unsigned_abs() as usize;
                    if leaf >= classifier.leaves.len() {
                        return Err(malformed(format!("node {index} points at leaf {leaf}")));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Plain and squared integral images of a luminance raster.
///
/// Both have one extra leading row and column of zeros, so the sum over
/// any rectangle is `D - B - C + A` of its corners.
pub struct IntegralImages {
    sum: ImageBuffer<Luma<u64>, Vec<u64>>,
    squared: ImageBuffer<Luma<u64>, Vec<u64>>,
    stride: usize,
}

impl IntegralImages {
    /// Compute the integral images of `gray`.
    #[must_use]
    pub fn new(gray: &GrayImage) -> Self {
        let sum: ImageBuffer<Luma<u64>, Vec<u64>> = integral_image(gray);
        let squared: ImageBuffer<Luma<u64>, Vec<u64>> = integral_squared_image(gray);
        Self {
            stride: gray.width() as usize + 1,
            sum,
            squared,
        }
    }

    /// Sum of pixel values over a rectangle.
    #[must_use]
    pub fn sum(&self, x: u32, y: u32, width: u32, height: u32) -> f64 {
        Self::rect(self.sum.as_raw(), self.stride, x, y, width, height)
    }

    /// Sum of squared pixel values over a rectangle.
    #[must_use]
    pub fn squared_sum(&self, x: u32, y: u32, width: u32, height: u32) -> f64 {
        Self::rect(self.squared.as_raw(), self.stride, x, y, width, height)
    }

    #[allow(clippy::cast_precision_loss)]
    fn rect(table: &[u64], stride: usize, x: u32, y: u32, width: u32, height: u32) -> f64 {
        let (left, top) = (x as usize, y as usize);
        let (right, bottom) = (left + width as usize, top + height as usize);
        let a = table[top * stride + left];
        let b = table[top * stride + right];
        let c = table[bottom * stride + left];
        let d = table[bottom * stride + right];
        ((d + a) - (b + c)) as f64
    }
}

// ───────────────────────── XML parsing ──────────────────────────

/// Partially parsed cascade, filled in as XML events arrive.
#[derive(Default)]
struct Draft {
    seen_cascade: bool,
    width: Option<u32>,
    height: Option<u32>,
    stages: Vec<StageDraft>,
    features: Vec<FeatureDraft>,
}

#[derive(Default)]
struct StageDraft {
    threshold: Option<f64>,
    classifiers: Vec<ClassifierDraft>,
}

#[derive(Default)]
struct ClassifierDraft {
    nodes: Vec<TreeNode>,
    leaves: Vec<f64>,
}

#[derive(Default)]
struct FeatureDraft {
    rects: Vec<WeightedRect>,
}

/// The part of `path` below the `<cascade>` element, if inside one.
fn cascade_scope(path: &[String]) -> Option<Vec<&str>> {
    let start = path.iter().position(|tag| tag == "cascade")?;
    Some(path[start + 1..].iter().map(String::as_str).collect())
}

impl Draft {
    fn open(&mut self, path: &[String]) {
        let Some(scope) = cascade_scope(path) else {
            return;
        };
        match scope.as_slice() {
            [] => self.seen_cascade = true,
            ["stages", "_"] => self.stages.push(StageDraft::default()),
            ["stages", "_", "weakClassifiers", "_"] => {
                if let Some(stage) = self.stages.last_mut() {
                    stage.classifiers.push(ClassifierDraft::default());
                }
            }
            ["features", "_"] => self.features.push(FeatureDraft::default()),
            _ => {}
        }
    }

    fn text(&mut self, path: &[String], text: &str) -> Result<(), CascadeError> {
        let Some(scope) = cascade_scope(path) else {
            return Ok(());
        };
        match scope.as_slice() {
            ["stageType"] if text != "BOOST" => {
                return Err(CascadeError::Unsupported(format!("stage type {text}")));
            }
            ["featureType"] if text != "HAAR" => {
                return Err(CascadeError::Unsupported(format!("feature type {text}")));
            }
            ["featureParams", "maxCatCount"] if parse::<u32>("maxCatCount", text)? != 0 => {
                return Err(CascadeError::Unsupported(
                    "categorical features".to_owned(),
                ));
            }
            ["width"] => self.width = Some(parse("width", text)?),
            ["height"] => self.height = Some(parse("height", text)?),
            ["stages", "_", "stageThreshold"] => {
                if let Some(stage) = self.stages.last_mut() {
                    stage.threshold = Some(parse("stageThreshold", text)?);
                }
            }
            ["stages", "_", "weakClassifiers", "_", "internalNodes"] => {
                if let Some(classifier) = self.current_classifier() {
                    classifier.nodes = parse_nodes(text)?;
                }
            }
            ["stages", "_", "weakClassifiers", "_", "leafValues"] => {
                if let Some(classifier) = self.current_classifier() {
                    classifier.leaves = text
                        .split_whitespace()
                        .map(|v| parse("leafValues", v))
                        .collect::<Result<_, _>>()?;
                }
            }
            ["features", "_", "rects", "_"] => {
                let rect = parse_rect(text)?;
                if let Some(feature) = self.features.last_mut() {
                    feature.rects.push(rect);
                }
            }
            ["features", "_", "tilted"] if parse::<u32>("tilted", text)? != 0 => {
                return Err(CascadeError::Unsupported("tilted features".to_owned()));
            }
            _ => {}
        }
        Ok(())
    }

    fn current_classifier(&mut self) -> Option<&mut ClassifierDraft> {
        self.stages.last_mut()?.classifiers.last_mut()
    }

    fn finish(self) -> Result<HaarCascade, CascadeError> {
        if !self.seen_cascade {
            return Err(CascadeError::MissingField("cascade"));
        }
        let window = Dimensions::new(
            self.width.ok_or(CascadeError::MissingField("width"))?,
            self.height.ok_or(CascadeError::MissingField("height"))?,
        );
        let stages = self
            .stages
            .into_iter()
            .map(|stage| {
                Ok(Stage {
                    threshold: stage
                        .threshold
                        .ok_or(CascadeError::MissingField("stageThreshold"))?,
                    classifiers: stage
                        .classifiers
                        .into_iter()
                        .map(|c| WeakClassifier {
                            nodes: c.nodes,
                            leaves: c.leaves,
                        })
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, CascadeError>>()?;
        let features = self
            .features
            .into_iter()
            .map(|f| HaarFeature { rects: f.rects })
            .collect();
        HaarCascade::new(window, stages, features)
    }
}

fn parse<T: std::str::FromStr>(field: &'static str, text: &str) -> Result<T, CascadeError> {
    text.trim()
        .parse()
        .map_err(|_| CascadeError::InvalidNumber {
            field,
            value: text.to_owned(),
        })
}

/// Parse `internalNodes`: groups of `left right feature threshold`.
fn parse_nodes(text: &str) -> Result<Vec<TreeNode>, CascadeError> {
    let values: Vec<&str> = text.split_whitespace().collect();
    if values.is_empty() || values.len() % 4 != 0 {
        return Err(CascadeError::Malformed(format!(
            "internalNodes holds {} values, expected groups of 4",
            values.len()
        )));
    }
    values
        .chunks_exact(4)
        .map(|node| {
            Ok(TreeNode {
                left: parse("internalNodes", node[0])?,
                right: parse("internalNodes", node[1])?,
                feature: parse("internalNodes", node[2])?,
                threshold: parse("internalNodes", node[3])?,
            })
        })
        .collect()
}

/// Parse one feature rectangle: `x y width height weight`.
fn parse_rect(text: &str) -> Result<WeightedRect, CascadeError> {
    let values: Vec<&str> = text.split_whitespace().collect();
    let [x, y, width, height, weight] = values.as_slice() else {
        return Err(CascadeError::Malformed(format!(
            "feature rectangle `{text}` needs 5 values"
        )));
    };
    Ok(WeightedRect {
        x: parse("rects", x)?,
        y: parse("rects", y)?,
        width: parse("rects", width)?,
        height: parse("rects", height)?,
        weight: parse("rects", weight)?,
    })
}
