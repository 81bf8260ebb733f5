//! The static car listing used to show records similar to a prediction.
//!
//! Only display and similarity needs are served here; the dataset plays no part in
//! training.

use std::collections::HashSet;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::predictor::PredictorError;

/// Columns every row needs to take part in similarity lookup.
pub const REQUIRED_FEATURES: [&str; 3] = ["year", "max_power", "mileage"];

/// One cleaned row of the reference dataset.
///
/// Serializes to the display columns only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarRecord {
    pub brand: String,
    pub name: String,
    pub year: i64,
    pub km_driven: Option<i64>,
    pub fuel: String,
    pub transmission: String,
    pub owner: String,
    pub selling_price: Option<f64>,
    #[serde(skip_serializing)]
    pub max_power: Option<f64>,
    #[serde(skip_serializing)]
    pub mileage: Option<f64>,
    #[serde(skip_serializing)]
    pub engine: Option<f64>,
}

impl CarRecord {
    /// Numeric value of a model feature, if the row has it.
    pub fn feature(&self, name: &str) -> Option<f64> {
        match name {
            "year" => Some(self.year as f64),
            "max_power" => self.max_power,
            "mileage" => self.mileage,
            "engine" => self.engine,
            "km_driven" => self.km_driven.map(|v| v as f64),
            "selling_price" => self.selling_price,
            _ => None,
        }
    }

    fn identity(&self) -> (String, String, i64, Option<i64>, String, String, String) {
        (
            self.name.clone(),
            self.brand.clone(),
            self.year,
            self.km_driven,
            self.fuel.clone(),
            self.transmission.clone(),
            self.owner.clone(),
        )
    }
}

/// Reads the leading number of a cell such as `"18.6 kmpl"` or `"74 bhp"`.
pub fn leading_number(cell: &str) -> Option<f64> {
    cell.split_whitespace()
        .next()
        .and_then(|token| token.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Loads and cleans the reference dataset.
///
/// Unit suffixes are stripped, the brand is taken from the first word of the name,
/// rows missing any [`REQUIRED_FEATURES`] are dropped and duplicate listings are
/// collapsed to their first occurrence.
pub fn load_reference_dataset(path: impl AsRef<Path>) -> Result<Vec<CarRecord>, PredictorError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path).map_err(|e| {
        PredictorError::DatasetError(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let headers = reader
        .headers()
        .map_err(|e| PredictorError::DatasetError(format!("Failed to read headers: {}", e)))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);

    for required in REQUIRED_FEATURES.iter().chain(["name"].iter()) {
        if column(*required).is_none() {
            return Err(PredictorError::DatasetError(format!(
                "Required column '{}' not found in {}",
                required,
                path.display()
            )));
        }
    }

    let name_col = column("name");
    let year_col = column("year");
    let km_col = column("km_driven");
    let fuel_col = column("fuel");
    let transmission_col = column("transmission");
    let owner_col = column("owner");
    let price_col = column("selling_price");
    let power_col = column("max_power");
    let mileage_col = column("mileage");
    let engine_col = column("engine");

    let mut records = Vec::new();
    let mut seen = HashSet::new();
    let mut total = 0usize;
    let mut incomplete = 0usize;

    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            PredictorError::DatasetError(format!("Failed to parse row {}: {}", line + 2, e))
        })?;
        total += 1;

        let text = |col: Option<usize>| col.and_then(|c| row.get(c)).unwrap_or("").trim().to_string();
        let number = |col: Option<usize>| col.and_then(|c| row.get(c)).and_then(leading_number);

        let year = number(year_col).map(|y| y.trunc() as i64);
        let max_power = number(power_col);
        let mileage = number(mileage_col);
        let (year, max_power, mileage) = match (year, max_power, mileage) {
            (Some(y), Some(p), Some(m)) => (y, p, m),
            _ => {
                incomplete += 1;
                continue;
            }
        };

        let name = text(name_col);
        let record = CarRecord {
            brand: name.split_whitespace().next().unwrap_or_default().to_string(),
            name,
            year,
            km_driven: number(km_col).map(|v| v.trunc() as i64),
            fuel: text(fuel_col),
            transmission: text(transmission_col),
            owner: text(owner_col),
            selling_price: number(price_col),
            max_power: Some(max_power),
            mileage: Some(mileage),
            engine: number(engine_col),
        };

        if seen.insert(record.identity()) {
            records.push(record);
        }
    }

    info!(
        "Loaded {} reference rows from {} ({} read, {} incomplete, {} duplicates)",
        records.len(),
        path.display(),
        total,
        incomplete,
        total - incomplete - records.len()
    );
    Ok(records)
}
