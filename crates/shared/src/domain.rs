use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(DriverId);
id_newtype!(CarId);
id_newtype!(ManufacturerId);

/// The record collections that can be listed and searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Drivers,
    Cars,
    Manufacturers,
}

impl CollectionKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "drivers" => Some(Self::Drivers),
            "cars" => Some(Self::Cars),
            "manufacturers" => Some(Self::Manufacturers),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drivers => "drivers",
            Self::Cars => "cars",
            Self::Manufacturers => "manufacturers",
        }
    }
}
