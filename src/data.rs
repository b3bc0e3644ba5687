use crate::config::AppConfig;
use crate::topo::Topology;
use crate::types::{CountyShape, EducationIndex, EducationRecord};
use anyhow::{Context, Result};

/// Fetch and decode both datasets, then extract the county shapes.
/// The two fetches are sequential: the education request is issued only
/// after the topology body has been fully decoded. Any network or decode
/// failure aborts the run; there is no retry and no partial render.
pub async fn load_datasets(config: &AppConfig) -> Result<(Vec<CountyShape>, Vec<EducationRecord>)> {
    let client = reqwest::Client::new();

    println!("Fetching county boundaries from {}", config.input.counties_url);
    let topology = fetch_counties(&client, &config.input.counties_url).await?;

    println!("Fetching education data from {}", config.input.education_url);
    let education = fetch_education(&client, &config.input.education_url).await?;

    let shapes = topology.county_shapes()?;
    println!(
        "Loaded {} county shapes and {} education records",
        shapes.len(),
        education.len()
    );

    Ok((shapes, education))
}

async fn fetch_counties(client: &reqwest::Client, url: &str) -> Result<Topology> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch county topology from {}", url))?
        .error_for_status()
        .with_context(|| format!("County topology request failed: {}", url))?;

    response
        .json::<Topology>()
        .await
        .context("Failed to decode county topology JSON")
}

async fn fetch_education(client: &reqwest::Client, url: &str) -> Result<Vec<EducationRecord>> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch education data from {}", url))?
        .error_for_status()
        .with_context(|| format!("Education data request failed: {}", url))?;

    response
        .json::<Vec<EducationRecord>>()
        .await
        .context("Failed to decode education data JSON")
}

/// Index the statistics by FIPS so each shape joins in O(1).
/// Duplicate FIPS entries keep the last record seen.
pub fn build_education_index(records: Vec<EducationRecord>) -> EducationIndex {
    records.into_iter().map(|r| (r.fips, r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fips: u32, value: f64) -> EducationRecord {
        EducationRecord {
            fips,
            area_name: format!("County {}", fips),
            state: "XX".to_string(),
            bachelors_or_higher: value,
        }
    }

    #[test]
    fn index_joins_by_fips() {
        let index = build_education_index(vec![record(1001, 12.5), record(1003, 30.0)]);
        assert_eq!(index.len(), 2);
        assert_eq!(index[&1001].bachelors_or_higher, 12.5);
        assert!(index.get(&9999).is_none());
    }

    #[test]
    fn duplicate_fips_keeps_last_record() {
        let index = build_education_index(vec![record(1001, 12.5), record(1001, 40.0)]);
        assert_eq!(index.len(), 1);
        assert_eq!(index[&1001].bachelors_or_higher, 40.0);
    }

    #[test]
    fn education_record_decodes_wire_field_names() {
        let json = r#"{"fips":1001,"area_name":"Autauga County","state":"AL","bachelorsOrHigher":21.9}"#;
        let record: EducationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.fips, 1001);
        assert_eq!(record.state, "AL");
        assert_eq!(record.bachelors_or_higher, 21.9);
    }
}
