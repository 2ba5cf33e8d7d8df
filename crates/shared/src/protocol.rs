use serde::{Deserialize, Serialize};

use crate::domain::{CarId, DriverId, ManufacturerId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManufacturerSummary {
    pub id: ManufacturerId,
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarSummary {
    pub id: CarId,
    pub model: String,
    pub manufacturer_id: ManufacturerId,
    pub manufacturer_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSummary {
    pub id: DriverId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub license_number: String,
}

/// A driver together with the cars currently assigned to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverDetail {
    pub driver: DriverSummary,
    pub cars: Vec<CarSummary>,
}

/// A car together with the drivers it is currently assigned to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarDetail {
    pub car: CarSummary,
    pub drivers: Vec<DriverSummary>,
}

/// One page of a filtered, ordered listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPage {
    pub items: PageItems,
    pub page: u32,
    pub total_count: u64,
    pub page_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageItems {
    Drivers(Vec<DriverSummary>),
    Cars(Vec<CarSummary>),
    Manufacturers(Vec<ManufacturerSummary>),
}

impl PageItems {
    pub fn len(&self) -> usize {
        match self {
            Self::Drivers(items) => items.len(),
            Self::Cars(items) => items.len(),
            Self::Manufacturers(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDriver {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub license_number: String,
}

/// An open session, as handed back by login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub token: String,
    pub driver_id: DriverId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeSummary {
    pub num_drivers: u64,
    pub num_cars: u64,
    pub num_manufacturers: u64,
    pub num_visits: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub assigned: bool,
}
