//! Service endpoint URL builders
//!
//! Helper functions to construct request URLs for each external service.

// ============================================================================
// Default Service Locations
// ============================================================================

pub const PUBCHEM_BASE_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";
pub const REACTOME_BASE_URL: &str = "https://reactome.org/ContentService";
pub const STRING_BASE_URL: &str = "https://string-db.org";
pub const GPROFILER_BASE_URL: &str = "https://biit.cs.ut.ee/gprofiler";
pub const UNIPROT_BASE_URL: &str = "https://rest.uniprot.org";
pub const ALPHAFOLD_BASE_URL: &str = "https://alphafold.ebi.ac.uk";

/// NCBI taxonomy id of Homo sapiens
pub const HUMAN_TAXON_ID: u32 = 9606;

/// AlphaFold DB model version served under `/files`
pub const ALPHAFOLD_MODEL_VERSION: u32 = 4;

/// Compound properties requested from PubChem
pub const PUBCHEM_PROPERTIES: &str =
    "CanonicalSMILES,IsomericSMILES,ConnectivitySMILES,MolecularFormula,MolecularWeight,IUPACName";

fn trim(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

/// Build PubChem property URL for a CID
pub fn pubchem_cid_properties_url(base_url: &str, cid: u64) -> String {
    format!(
        "{}/compound/cid/{}/property/{}/JSON",
        trim(base_url),
        cid,
        PUBCHEM_PROPERTIES
    )
}

/// Build PubChem property URL for a SMILES lookup (SMILES goes in the POST body)
pub fn pubchem_smiles_properties_url(base_url: &str) -> String {
    format!(
        "{}/compound/smiles/property/{}/JSON",
        trim(base_url),
        PUBCHEM_PROPERTIES
    )
}

/// Build Reactome pathway search URL
pub fn reactome_search_url(base_url: &str, query: &str, species: &str) -> String {
    format!(
        "{}/search/query?query={}&species={}&types=Pathway&cluster=true",
        trim(base_url),
        urlencoding::encode(query),
        urlencoding::encode(species)
    )
}

/// Build Reactome record lookup URL
pub fn reactome_query_url(base_url: &str, id: &str) -> String {
    format!("{}/data/query/{}", trim(base_url), urlencoding::encode(id))
}

/// Build Reactome pathway participants URL
pub fn reactome_participants_url(base_url: &str, id: &str) -> String {
    format!("{}/data/participants/{}", trim(base_url), urlencoding::encode(id))
}

/// Build STRING network URL (TSV output)
pub fn string_network_url(base_url: &str) -> String {
    format!("{}/api/tsv/network", trim(base_url))
}

/// Build g:Profiler g:GOSt URL
pub fn gprofiler_profile_url(base_url: &str) -> String {
    format!("{}/api/gost/profile/", trim(base_url))
}

/// Build UniProtKB search URL for the reviewed entry of a gene
pub fn uniprot_search_url(base_url: &str, gene: &str, taxon_id: u32) -> String {
    let query = format!("gene_exact:{} AND organism_id:{} AND reviewed:true", gene, taxon_id);
    format!(
        "{}/uniprotkb/search?query={}&fields=accession&format=json&size=1",
        trim(base_url),
        urlencoding::encode(&query)
    )
}

/// File name of the AlphaFold model for a UniProt accession
pub fn alphafold_model_file(accession: &str) -> String {
    format!("AF-{}-F1-model_v{}.pdb", accession, ALPHAFOLD_MODEL_VERSION)
}

/// Build AlphaFold DB model download URL
pub fn alphafold_model_url(base_url: &str, accession: &str) -> String {
    format!("{}/files/{}", trim(base_url), alphafold_model_file(accession))
}
