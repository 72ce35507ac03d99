use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::{BufReader, BufWriter, Read},
    path::Path,
};

use derive_more::Display;
use log::{info, warn};
use serde::{de::DeserializeOwned, Serialize};

use crate::dom::{Customer, Defect, Product, RepairRequest, Repairer};
use crate::problem::{DefectId, ProductId, RepairProblem};

#[derive(Debug, Display)]
pub enum ParseError {
    #[display(fmt = "could not open {}: {}", _0, _1)]
    Io(String, std::io::Error),
    #[display(fmt = "malformed record in {}: {}", _0, _1)]
    Csv(String, csv::Error),
    #[display(fmt = "malformed json: {}", _0)]
    Json(serde_json::Error),
}

impl std::error::Error for ParseError {}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::Json(err)
    }
}

/// Reads every record of a csv export, skipping rows without an id.
pub fn read_records<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let id = headers.iter().position(|h| h == "id");

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        // trailing blank rows in the exports
        if id.map_or(false, |i| row.get(i).map_or(true, str::is_empty)) {
            continue;
        }
        records.push(row.deserialize(Some(&headers))?);
    }

    Ok(records)
}

fn read_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ParseError> {
    let name = path.display().to_string();
    let file = File::open(path).map_err(|err| ParseError::Io(name.clone(), err))?;
    read_records(BufReader::new(file)).map_err(|err| ParseError::Csv(name, err))
}

/// The records of one data directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairData {
    pub products: Vec<Product>,
    pub defects: Vec<Defect>,
    pub repairers: Vec<Repairer>,
    pub customers: Vec<Customer>,
    pub requests: Vec<RepairRequest>,
}

impl RepairData {
    /// Loads `products.csv`, `defects.csv`, `repairers.csv`, `repair_request.csv` and, if
    /// present, `customers.csv` from `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<RepairData, ParseError> {
        let dir = dir.as_ref();

        let customers = dir.join("customers.csv");
        let customers = match customers.exists() {
            true => read_file(&customers)?,
            false => {
                warn!("{} not found, skipping customer data", customers.display());
                Vec::new()
            }
        };

        let data = RepairData {
            products: read_file(&dir.join("products.csv"))?,
            defects: read_file(&dir.join("defects.csv"))?,
            repairers: read_file(&dir.join("repairers.csv"))?,
            customers,
            requests: read_file(&dir.join("repair_request.csv"))?,
        };

        info!(
            "Loaded {} products, {} defects, {} repairers and {} repair requests from {}",
            data.products.len(),
            data.defects.len(),
            data.repairers.len(),
            data.requests.len(),
            dir.display()
        );

        Ok(data)
    }

    /// The defects reported on each product. Every product is present, requests for unknown
    /// products are dropped.
    pub fn product_defects(&self) -> BTreeMap<ProductId, BTreeSet<DefectId>> {
        let mut defects: BTreeMap<ProductId, BTreeSet<DefectId>> = self
            .products
            .iter()
            .map(|p| (p.id, BTreeSet::new()))
            .collect();

        for request in &self.requests {
            match defects.get_mut(&request.product_id) {
                Some(set) => {
                    set.insert(request.defect_id);
                }
                None => warn!(
                    "Repair request {} refers to unknown product {}",
                    request.id, request.product_id
                ),
            }
        }

        defects
    }
}

pub fn read_problem<P: AsRef<Path>>(path: P) -> Result<RepairProblem, ParseError> {
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|err| ParseError::Io(path.display().to_string(), err))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Writes `value` as pretty printed json to `path`.
pub fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<(), ParseError> {
    let path = path.as_ref();
    let file =
        File::create(path).map_err(|err| ParseError::Io(path.display().to_string(), err))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}
