//! Records loaded from the repair service's data exports.
use serde::{Deserialize, Serialize};

use crate::problem::{DefectId, ProductId, RepairerId};

/// A garment waiting for repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category: String,
    pub size: String,
    pub color: String,
    pub composition: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    pub id: DefectId,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repairer {
    pub id: RepairerId,
    pub name: String,
    pub specialization: String,
    pub status: String,
    pub contact_email: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: usize,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub registration_date: String,
    pub customer_status: String,
}

/// One defect on one product, reported by a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairRequest {
    pub id: usize,
    pub customer_id: usize,
    pub product_id: ProductId,
    pub defect_id: DefectId,
}
