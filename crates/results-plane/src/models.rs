use serde::{Serialize, Deserialize};
use utoipa::ToSchema;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::naming::MlModel;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct UploadRecord {
	pub storage_key: String,
	pub original_filename: String,
	pub size_bytes: u64,
	pub sha256: String,
	pub uploaded_at: DateTime<Utc>,
}

/// Everything the results view needs for one uploaded file.
///
/// A record is only reusable from cache when both `cleaned_csv_url` and
/// `summary` are set; the ML page may create records holding only `ml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, ToSchema)]
pub struct ResultRecord {
	pub cleaned_csv_url: Option<String>,
	pub cleaned_csv_signed_url: Option<String>,
	pub summary: Option<String>,
	/// Keyed by visualization name, in metadata order.
	pub visualization_signed_urls: IndexMap<String, String>,
	pub visualization_summaries: IndexMap<String, String>,
	pub original_filename: String,
	pub ml: Option<MlPageRecord>,
}

impl ResultRecord {
	pub fn is_complete(&self) -> bool { self.cleaned_csv_url.is_some() && self.summary.is_some() }

	/// Names of the populated fields, for cache introspection.
	pub fn field_names(&self) -> Vec<&'static str> {
		let mut names = Vec::new();
		if self.cleaned_csv_url.is_some() { names.push("cleaned_csv_url"); }
		if self.cleaned_csv_signed_url.is_some() { names.push("cleaned_csv_signed_url"); }
		if self.summary.is_some() { names.push("summary"); }
		if !self.visualization_signed_urls.is_empty() { names.push("visualization_signed_urls"); }
		if !self.visualization_summaries.is_empty() { names.push("visualization_summaries"); }
		names.push("original_filename");
		if self.ml.is_some() { names.push("ml"); }
		names
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, ToSchema)]
pub struct MlAvailabilityRecord {
	pub available: bool,
	pub base_name: String,
	pub checked_paths: Vec<String>,
	pub found_files: Vec<String>,
	pub found_summaries: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, ToSchema)]
pub struct MlModelArtifacts {
	pub plot_url: Option<String>,
	pub summary: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, ToSchema)]
pub struct MlPageRecord {
	pub filename: String,
	pub linear_regression: MlModelArtifacts,
	pub decision_tree: MlModelArtifacts,
	pub feature_importance: MlModelArtifacts,
}

impl MlPageRecord {
	pub fn model_mut(&mut self, model: MlModel) -> &mut MlModelArtifacts {
		match model {
			MlModel::LinearRegression => &mut self.linear_regression,
			MlModel::DecisionTree => &mut self.decision_tree,
			MlModel::FeatureImportance => &mut self.feature_importance,
		}
	}
}
