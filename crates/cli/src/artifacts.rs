use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use flatwise_core::config::DataConfig;
use flatwise_core::domain::listing::{ListingIndex, ListingRecord};
use flatwise_core::{ApplicationError, BayesianNetwork, CategoryTable, CriteriaConfig, NetworkSpec};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Everything the pipeline reads at startup, loaded once and shared read-only.
#[derive(Clone, Debug)]
pub struct Artifacts {
    pub listings: Arc<[ListingRecord]>,
    pub network: Arc<BayesianNetwork>,
    pub categories: Arc<CategoryTable>,
    pub criteria: CriteriaConfig,
}

impl Artifacts {
    pub fn load(data: &DataConfig) -> Result<Self, ApplicationError> {
        let listings = load_listings(&data.listings)?;
        let network = load_network(&data.network)?;
        let categories = load_categories(&data.categories)?;
        let criteria = load_criteria(&data.criteria)?;

        tracing::info!(
            event_name = "artifacts.loaded",
            listings = listings.len(),
            network = network.name().unwrap_or("unnamed"),
            criteria = criteria.len(),
            "pipeline artifacts loaded"
        );

        Ok(Self {
            listings: listings.into(),
            network: Arc::new(network),
            categories: Arc::new(categories),
            criteria,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListingRow {
    #[serde(default)]
    index: Option<usize>,
    town: String,
    flat_type: String,
    flat_model: String,
    storey_range: String,
    #[serde(default)]
    block: Option<String>,
    #[serde(default)]
    street_name: Option<String>,
    floor_area_sqm: f64,
    remaining_lease_years: f64,
    resale_price: f64,
    #[serde(default)]
    dist_mrt_km: Option<f64>,
}

impl ListingRow {
    fn into_record(self, position: usize) -> ListingRecord {
        ListingRecord {
            index: ListingIndex(self.index.unwrap_or(position)),
            town: self.town,
            flat_type: self.flat_type,
            flat_model: self.flat_model,
            storey_range: self.storey_range,
            block: self.block.filter(|block| !block.is_empty()),
            street_name: self.street_name.filter(|street| !street.is_empty()),
            floor_area_sqm: self.floor_area_sqm,
            remaining_lease_years: self.remaining_lease_years,
            resale_price: self.resale_price,
            dist_mrt_km: self.dist_mrt_km,
        }
    }
}

/// Reads the processed listings CSV. Rows keep their file position as the
/// listing index unless the file carries an explicit `index` column.
pub fn load_listings(path: &Path) -> Result<Vec<ListingRecord>, ApplicationError> {
    let file = File::open(path).map_err(|error| {
        ApplicationError::Artifact(format!("failed to open listings `{}`: {error}", path.display()))
    })?;

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut listings = Vec::new();
    for (position, row) in reader.deserialize::<ListingRow>().enumerate() {
        // +2: one-based lines plus the header row.
        let line = position + 2;
        let row = row.map_err(|error| {
            ApplicationError::Artifact(format!(
                "listings `{}` line {line}: {error}",
                path.display()
            ))
        })?;
        listings.push(row.into_record(position));
    }

    Ok(listings)
}

pub fn load_network(path: &Path) -> Result<BayesianNetwork, ApplicationError> {
    let spec: NetworkSpec = read_json(path, "network")?;
    Ok(BayesianNetwork::from_spec(spec)?)
}

pub fn load_categories(path: &Path) -> Result<CategoryTable, ApplicationError> {
    read_json(path, "category table")
}

pub fn load_criteria(path: &Path) -> Result<CriteriaConfig, ApplicationError> {
    read_json(path, "criteria")
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, ApplicationError> {
    let raw = fs::read_to_string(path).map_err(|error| {
        ApplicationError::Artifact(format!("failed to read {what} `{}`: {error}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|error| {
        ApplicationError::Artifact(format!("invalid {what} `{}`: {error}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{load_categories, load_criteria, load_listings};
    use flatwise_core::domain::listing::{ListingIndex, NumericField};
    use flatwise_core::ModelVariable;

    #[test]
    fn listings_keep_file_position_and_blank_distance() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("listings.csv");
        fs::write(
            &path,
            "town,flat_type,flat_model,storey_range,block,street_name,floor_area_sqm,remaining_lease_years,resale_price,dist_mrt_km,month\n\
             BEDOK,4 ROOM,Model A,04 TO 06,101,BEDOK NTH AVE 4,92,61.5,420000,0.8,2023-01\n\
             TAMPINES,5 ROOM,Improved,10 TO 12,,,118,75,610000,,2023-02\n",
        )
        .expect("write csv");

        let listings = load_listings(&path).expect("listings load");
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].index, ListingIndex(0));
        assert_eq!(listings[1].index, ListingIndex(1));
        assert_eq!(listings[0].address(), "BEDOK NTH AVE 4, Block 101");
        assert_eq!(listings[1].numeric(NumericField::DistMrtKm), None);
        assert_eq!(listings[1].block, None);
    }

    #[test]
    fn explicit_index_column_wins_over_position() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("listings.csv");
        fs::write(
            &path,
            "index,town,flat_type,flat_model,storey_range,floor_area_sqm,remaining_lease_years,resale_price\n\
             41,BEDOK,4 ROOM,Model A,04 TO 06,92,61.5,420000\n",
        )
        .expect("write csv");

        let listings = load_listings(&path).expect("listings load");
        assert_eq!(listings[0].index, ListingIndex(41));
    }

    #[test]
    fn malformed_row_reports_line_number() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("listings.csv");
        fs::write(
            &path,
            "town,flat_type,flat_model,storey_range,floor_area_sqm,remaining_lease_years,resale_price\n\
             BEDOK,4 ROOM,Model A,04 TO 06,92,61.5,420000\n\
             BEDOK,4 ROOM,Model A,04 TO 06,ninety,61.5,420000\n",
        )
        .expect("write csv");

        let error = load_listings(&path).expect_err("second row is malformed");
        assert_eq!(error.class(), "artifact");
        assert!(error.to_string().contains("line 3"), "unexpected error: {error}");
    }

    #[test]
    fn json_artifacts_deserialize_into_validated_types() {
        let dir = TempDir::new().expect("tempdir");
        let categories = dir.path().join("categories.json");
        fs::write(
            &categories,
            r#"{
                "remaining_lease_years": ["(40, 60]", "(60, 80]", "(80, 100]"],
                "floor_area_sqm": ["(30, 80]", "(80, 130]"],
                "resale_price": ["(100000, 400000]", "(400000, 700000]"]
            }"#,
        )
        .expect("write categories");
        let table = load_categories(&categories).expect("categories load");
        assert_eq!(table.bins(ModelVariable::RemainingLeaseYears).expect("lease bins").len(), 3);

        let criteria = dir.path().join("criteria.json");
        fs::write(
            &criteria,
            r#"{
                "resale_price": {"direction": "cost", "label": "Price"},
                "floor_area_sqm": {"direction": "benefit", "label": "Floor Area"}
            }"#,
        )
        .expect("write criteria");
        let criteria = load_criteria(&criteria).expect("criteria load");
        assert_eq!(criteria.len(), 2);

        let missing = dir.path().join("absent.json");
        let error = load_criteria(&missing).expect_err("file is absent");
        assert_eq!(error.class(), "artifact");
    }
}
