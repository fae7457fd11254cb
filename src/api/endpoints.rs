//! API Endpoints

use serde::{Deserialize, Serialize};

/// Department resources exposed by the mock API.
///
/// The extra resources exist because the mock provider caps the number of
/// records per resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    #[default]
    Departments,
    #[serde(rename = "departments-2")]
    Departments2,
    #[serde(rename = "departments-3")]
    Departments3,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Departments => "/departments",
            Endpoint::Departments2 => "/departments-2",
            Endpoint::Departments3 => "/departments-3",
        }
    }
}
