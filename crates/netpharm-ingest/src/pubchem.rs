//! PubChem PUG-REST client
//!
//! Resolves a CID or SMILES into canonical molecular attributes. PubChem has
//! renamed its SMILES properties over time, so the canonical form falls back
//! to `ConnectivitySMILES` and then plain `SMILES`.

use crate::endpoints;
use crate::http::ServiceClient;
use crate::sources::CompoundSource;
use async_trait::async_trait;
use netpharm_common::types::{Compound, CompoundQuery};
use netpharm_common::{NetpharmError, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// Name used in errors and logs
pub const SERVICE: &str = "PubChem";

#[derive(Debug, Deserialize)]
struct PropertyResponse {
    #[serde(rename = "PropertyTable")]
    property_table: PropertyTable,
}

#[derive(Debug, Deserialize)]
struct PropertyTable {
    #[serde(rename = "Properties", default)]
    properties: Vec<CompoundProperties>,
}

#[derive(Debug, Deserialize)]
struct CompoundProperties {
    #[serde(rename = "CID", default)]
    cid: Option<u64>,
    #[serde(rename = "CanonicalSMILES")]
    canonical_smiles: Option<String>,
    #[serde(rename = "ConnectivitySMILES")]
    connectivity_smiles: Option<String>,
    #[serde(rename = "IsomericSMILES")]
    isomeric_smiles: Option<String>,
    #[serde(rename = "SMILES")]
    smiles: Option<String>,
    #[serde(rename = "MolecularFormula")]
    molecular_formula: Option<String>,
    /// Reported as a string by current PubChem, as a number by older releases
    #[serde(rename = "MolecularWeight")]
    molecular_weight: Option<serde_json::Value>,
    #[serde(rename = "IUPACName")]
    iupac_name: Option<String>,
}

impl CompoundProperties {
    fn into_compound(self) -> Result<Compound> {
        let canonical_smiles = self
            .canonical_smiles
            .or(self.connectivity_smiles)
            .or_else(|| self.smiles.clone())
            .ok_or_else(|| NetpharmError::service(SERVICE, "response has no SMILES property"))?;

        let molecular_weight = match self.molecular_weight {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| NetpharmError::service(SERVICE, "response has no usable MolecularWeight"))?;

        Ok(Compound {
            // PubChem reports CID 0 for structures it has never registered
            cid: self.cid.filter(|cid| *cid > 0),
            canonical_smiles,
            isomeric_smiles: self.isomeric_smiles.or(self.smiles),
            molecular_formula: self.molecular_formula.unwrap_or_default(),
            molecular_weight,
            iupac_name: self.iupac_name,
        })
    }
}

/// PubChem compound resolver
pub struct PubChemClient {
    http: ServiceClient,
    base_url: String,
}

impl PubChemClient {
    pub fn new(http: ServiceClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CompoundSource for PubChemClient {
    async fn resolve(&self, query: &CompoundQuery) -> Result<Compound> {
        debug!(query = %query, "Resolving compound");

        let response: PropertyResponse = match query {
            CompoundQuery::Cid(cid) => {
                let url = endpoints::pubchem_cid_properties_url(&self.base_url, *cid);
                self.http.get_json(&url).await?
            },
            CompoundQuery::Smiles(smiles) => {
                let url = endpoints::pubchem_smiles_properties_url(&self.base_url);
                self.http
                    .post_form_json(&url, &[("smiles", smiles.clone())])
                    .await?
            },
        };

        let properties = response
            .property_table
            .properties
            .into_iter()
            .next()
            .ok_or_else(|| NetpharmError::not_found(format!("PubChem has no compound for {}", query)))?;

        let compound = properties.into_compound()?;
        info!(
            cid = ?compound.cid,
            formula = %compound.molecular_formula,
            weight = compound.molecular_weight,
            "Compound resolved"
        );
        Ok(compound)
    }
}
