// silver-core/src/domain/entity.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;
use crate::domain::schema::{self, EntitySchema};

/// The six entity types that flow from bronze to silver.
///
/// The variant order is the declared load order used by a full refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    Product,
    Sales,
    Location,
    CustomerDemographic,
    ProductCategory,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Customer,
        EntityKind::Product,
        EntityKind::Sales,
        EntityKind::Location,
        EntityKind::CustomerDemographic,
        EntityKind::ProductCategory,
    ];

    pub fn declared_order() -> Vec<EntityKind> {
        Self::ALL.to_vec()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Product => "product",
            Self::Sales => "sales",
            Self::Location => "location",
            Self::CustomerDemographic => "customer_demographic",
            Self::ProductCategory => "product_category",
        }
    }

    /// Table name shared by the bronze and silver extents.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Customer => "crm_cust_info",
            Self::Product => "crm_prd_info",
            Self::Sales => "crm_sales_details",
            Self::Location => "erp_loc_a101",
            Self::CustomerDemographic => "erp_cust_az12",
            Self::ProductCategory => "erp_px_cat_g1v2",
        }
    }

    /// Where the demo ingestion looks for the CSV when the project does not say otherwise.
    pub fn default_source_path(&self) -> &'static str {
        match self {
            Self::Customer => "datasets/source_crm/cust_info.csv",
            Self::Product => "datasets/source_crm/prd_info.csv",
            Self::Sales => "datasets/source_crm/sales_details.csv",
            Self::Location => "datasets/source_erp/LOC_A101.csv",
            Self::CustomerDemographic => "datasets/source_erp/CUST_AZ12.csv",
            Self::ProductCategory => "datasets/source_erp/PX_CAT_G1V2.csv",
        }
    }

    pub fn raw_schema(&self) -> &'static EntitySchema {
        schema::raw(*self)
    }

    pub fn cleansed_schema(&self) -> &'static EntitySchema {
        schema::cleansed(*self)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted || e.table_name() == wanted)
            .ok_or_else(|| DomainError::UnknownEntity(s.to_string()))
    }
}
