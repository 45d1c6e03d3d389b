//! Object-store key derivation for pipeline artifacts.
//!
//! Every key the external pipeline writes is a function of the uploaded
//! filename. Two interpolation keys coexist: the main and per-visualization
//! summaries use the raw filename, ML artifacts use [`base_name`]. The
//! pipeline already writes both shapes, so neither may be normalized here.

pub const CLEANED_PREFIX: &str = "cleaned_";

/// `cleaned_` + filename, unless the prefix is already there.
pub fn cleaned_name(filename: &str) -> String {
    if filename.starts_with(CLEANED_PREFIX) { filename.to_string() } else { format!("{CLEANED_PREFIX}{filename}") }
}

/// Pipeline identifier used for ML artifacts: prefix removed, non-CSV extension removed.
pub fn base_name(filename: &str) -> String {
    let rest = filename.strip_prefix(CLEANED_PREFIX).unwrap_or(filename);
    if rest.ends_with(".csv") { return rest.to_string(); }
    strip_extension(rest).to_string()
}

/// Stem used for visualization metadata: prefix removed, final extension always removed.
pub fn visualization_stem(filename: &str) -> String {
    let cleaned = cleaned_name(filename);
    let rest = cleaned.strip_prefix(CLEANED_PREFIX).unwrap_or(&cleaned);
    strip_extension(rest).to_string()
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') { Some((stem, _)) => stem, None => name }
}

pub fn metadata_key(filename: &str) -> String {
    format!("visualizations/{}_visualization_metadata.json", visualization_stem(filename))
}

pub fn summary_key(filename: &str) -> String { format!("chatgpt_api/summary_{filename}.txt") }

pub fn visualization_summary_key(vis_name: &str, filename: &str) -> String {
    format!("chatgpt_api/summary_{vis_name}_{filename}.txt")
}

/// The three models the pipeline trains, in the order their artifacts are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MlModel { LinearRegression, DecisionTree, FeatureImportance }

impl MlModel {
    pub const ALL: [MlModel; 3] = [MlModel::LinearRegression, MlModel::DecisionTree, MlModel::FeatureImportance];

    pub fn name(self) -> &'static str {
        match self {
            Self::LinearRegression => "linear_regression",
            Self::DecisionTree => "decision_tree",
            Self::FeatureImportance => "feature_importance",
        }
    }

    /// Short code used in summary keys and the `summary_type` download parameter.
    pub fn summary_code(self) -> &'static str {
        match self { Self::LinearRegression => "lr", Self::DecisionTree => "dt", Self::FeatureImportance => "rf" }
    }

    pub fn from_summary_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.summary_code() == code)
    }

    pub fn plot_key(self, base: &str) -> String { format!("ML_predictions/{}_{base}.png", self.name()) }
    pub fn summary_key(self, base: &str) -> String { format!("chatgpt_api/{}_summary_{base}.txt", self.summary_code()) }
}

/// All keys derived from one uploaded filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedNames {
    pub original: String,
    pub cleaned_name: String,
    pub base_name: String,
    pub metadata_key: String,
    pub summary_key: String,
    pub ml_plot_keys: [String; 3],
    pub ml_summary_keys: [String; 3],
}

impl DerivedNames {
    pub fn derive(filename: &str) -> Self {
        let base = base_name(filename);
        Self {
            original: filename.to_string(),
            cleaned_name: cleaned_name(filename),
            metadata_key: metadata_key(filename),
            summary_key: summary_key(filename),
            ml_plot_keys: MlModel::ALL.map(|m| m.plot_key(&base)),
            ml_summary_keys: MlModel::ALL.map(|m| m.summary_key(&base)),
            base_name: base,
        }
    }

    pub fn visualization_summary_key(&self, vis_name: &str) -> String { visualization_summary_key(vis_name, &self.original) }
}

/// Map a public object URL back to its storage key.
///
/// Only `%20` is decoded; the pipeline never emits other escapes in names.
pub fn storage_key_from_public_url(url: &str, public_prefix: &str) -> String {
    url.strip_prefix(public_prefix).unwrap_or(url).replace("%20", " ")
}
