#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use carprice::predictor::{EncoderSet, LabelEncoder, LinearRegression, LogisticRegression, PolynomialRegression};
use carprice::{Estimator, StandardScaler, BRAND_VOCABULARY};

pub const PRICE_CLASSES: [&str; 4] = ["0", "1", "2", "3"];

pub const CARS_CSV: &str = "\
name,year,selling_price,km_driven,fuel,seller_type,transmission,owner,mileage,engine,max_power,torque,seats
Maruti Swift Dzire VDI,2014,450000,145500,Diesel,Individual,Manual,First Owner,23.4 kmpl,1248 CC,74 bhp,190Nm@ 2000rpm,5
Skoda Rapid 1.5 TDI Ambition,2014,370000,120000,Diesel,Individual,Manual,Second Owner,21.14 kmpl,1498 CC,103.52 bhp,250Nm@ 1500-2500rpm,5
Honda City 2017-2020 EXi,2006,158000,140000,Petrol,Individual,Manual,Third Owner,17.7 kmpl,1497 CC,78 bhp,12.7@ 2700(kgm@ rpm),5
Hyundai i20 Sportz Diesel,2010,225000,127000,Diesel,Individual,Manual,First Owner,23.0 kmpl,1396 CC,90 bhp,22.4 kgm at 1750-2750rpm,5
Maruti Swift VXI BSIII,2007,130000,120000,Petrol,Individual,Manual,First Owner,16.1 kmpl,1298 CC,88.2 bhp,11.5@ 4500(kgm@ rpm),5
Maruti Baleno Alpha 1.2,2019,750000,8000,Petrol,Individual,Manual,First Owner,21.4 kmpl,1197 CC,83.1 bhp,115Nm@ 4000rpm,5
Toyota Glanza V,2019,740000,12000,Petrol,Individual,Manual,First Owner,21.01 kmpl,1197 CC,81.8 bhp,113Nm@ 4200rpm,5
Hyundai Verna 1.6 SX,2018,1050000,35000,Diesel,Dealer,Manual,First Owner,22.0 kmpl,1582 CC,126.2 bhp,260Nm@ 1500-3000rpm,5
Tata Indica Vista,2012,200000,80000,Diesel,Individual,Manual,Second Owner,,1248 CC,,,5
";

pub fn regression_scaler() -> StandardScaler {
    StandardScaler::new(
        vec!["year".into(), "max_power".into(), "mileage".into()],
        vec![2014.0, 90.0, 19.0],
        vec![4.0, 35.0, 4.0],
    )
    .unwrap()
}

pub fn classification_scaler() -> StandardScaler {
    StandardScaler::new(
        vec!["year".into(), "max_power".into(), "mileage".into(), "engine".into()],
        vec![2014.0, 90.0, 19.0, 1450.0],
        vec![4.0, 35.0, 4.0, 500.0],
    )
    .unwrap()
}

pub fn a1_model() -> Estimator {
    Estimator::Linear(LinearRegression {
        coef: vec![0.35, 0.25, -0.05],
        intercept: 13.0,
    })
}

pub fn a2_model() -> Estimator {
    // x0 x1 x2 x0² x0x1 x0x2 x1² x1x2 x2²
    Estimator::Polynomial(PolynomialRegression {
        degree: 2,
        n_inputs: 3,
        coef: vec![0.3, 0.2, -0.04, 0.01, 0.02, 0.0, -0.01, 0.0, 0.005],
        intercept: 13.1,
    })
}

/// Four price classes; newer, stronger cars score higher classes.
pub fn a3_model() -> Estimator {
    let width = 4 + BRAND_VOCABULARY.len();
    let coef = (0..PRICE_CLASSES.len())
        .map(|class| {
            let c = class as f64 - 1.5;
            let mut row = vec![0.0; width];
            // contract order: year, engine, max_power, mileage, brand_*
            row[0] = 1.2 * c;
            row[1] = 0.4 * c;
            row[2] = 0.9 * c;
            row[3] = -0.1 * c;
            row
        })
        .collect();
    Estimator::Logistic(LogisticRegression {
        coef,
        intercept: vec![0.0, 0.3, 0.3, 0.0],
    })
}

pub fn a3_encoders() -> EncoderSet {
    let mut encoders = EncoderSet::default();
    encoders
        .label_encoders
        .insert("brand".into(), LabelEncoder::fit(BRAND_VOCABULARY));
    encoders.target_encoder = Some(LabelEncoder::fit(PRICE_CLASSES));
    encoders
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) {
    fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

/// Writes every local artifact file into `dir`.
pub fn write_artifacts(dir: &Path) {
    write_json(&dir.join("cppm_a1_model.json"), &a1_model());
    write_json(&dir.join("cppm_a1_scaler.json"), &regression_scaler());
    write_json(&dir.join("cppm_a2_model.json"), &a2_model());
    write_json(&dir.join("cppm_a2_scaler.json"), &regression_scaler());
    write_json(&dir.join("cppm_a3_scaler.json"), &classification_scaler());
    write_json(&dir.join("cppm_a3_encoders.json"), &a3_encoders());
}

/// Lays out the classification model the way a file registry serves it.
pub fn write_registry_model(root: &Path, name: &str, version: u32) -> PathBuf {
    let dir = root.join(name).join(version.to_string());
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("model.json");
    write_json(&path, &a3_model());
    path
}

pub fn write_dataset(path: &Path) {
    fs::write(path, CARS_CSV).unwrap();
}
