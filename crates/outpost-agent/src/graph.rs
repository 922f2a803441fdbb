//! State queries against the game's GraphQL indexer.
//!
//! The indexer reports resource fields in thousandths (`milliEnergyCap` and
//! friends) and timestamps in Unix seconds. Numeric fields may arrive as
//! JSON numbers or as decimal strings, depending on how the indexer encodes
//! big integers; both are accepted. The world radius is not indexed and is
//! read from the relay instead.

use std::time::Duration;

use chrono::DateTime;
use outpost_core::collaborators::{Page, StateQuery};
use outpost_core::error::QueryError;
use outpost_types::{AssetId, AssetSnapshot, AssetType, Identity, Owner};
use serde_json::Value;
use tracing::debug;

use crate::error::AgentError;

const OWNER_QUERY: &str = "query ownedPlanets($owner: String!, $first: Int!, $skip: Int!) {
  planets(where: { owner: $owner }, first: $first, skip: $skip, orderBy: id) {
    id owner { id } defense lastUpdated milliEnergyLazy milliEnergyGrowth
    milliEnergyCap planetLevel planetType range
  }
}";

const IDS_QUERY: &str = "query planetsById($ids: [String!]!, $first: Int!) {
  planets(where: { id_in: $ids }, first: $first) {
    id owner { id } defense lastUpdated milliEnergyLazy milliEnergyGrowth
    milliEnergyCap planetLevel planetType range
  }
}";

/// [`StateQuery`] over the GraphQL indexer and the relay.
#[derive(Debug, Clone)]
pub struct GraphStateQuery {
    client: reqwest::Client,
    graph_url: String,
    relay_url: String,
}

impl GraphStateQuery {
    /// Create a query client. Every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Http`] if the HTTP client cannot be built.
    pub fn new(graph_url: &str, relay_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Http(format!("graph client: {e}")))?;
        Ok(Self {
            client,
            graph_url: graph_url.to_owned(),
            relay_url: relay_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn planets(&self, query: &str, variables: Value) -> Result<Vec<AssetSnapshot>, QueryError> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let response = self
            .client
            .post(&self.graph_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::Transport(format!("graph request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(QueryError::Transport(format!(
                "graph returned {status}: {error_body}"
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| QueryError::Decode(format!("graph response parse failed: {e}")))?;
        parse_planets(&json)
    }
}

impl StateQuery for GraphStateQuery {
    async fn query_by_owner(
        &self,
        owner: &Identity,
        page: Page,
    ) -> Result<Vec<AssetSnapshot>, QueryError> {
        let variables = serde_json::json!({
            "owner": owner.to_prefixed(),
            "first": page.first,
            "skip": page.skip,
        });
        let planets = self.planets(OWNER_QUERY, variables).await?;
        debug!(owner = %owner, skip = page.skip, returned = planets.len(), "owned planets page");
        Ok(planets)
    }

    async fn query_by_ids(
        &self,
        ids: &[AssetId],
        limit: usize,
    ) -> Result<Vec<AssetSnapshot>, QueryError> {
        let ids: Vec<&str> = ids.iter().map(AssetId::as_str).collect();
        let variables = serde_json::json!({ "ids": ids, "first": limit });
        self.planets(IDS_QUERY, variables).await
    }

    async fn world_radius(&self) -> Result<f64, QueryError> {
        let url = format!("{}/world/radius", self.relay_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QueryError::Transport(format!("radius request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Transport(format!("relay returned {status}")));
        }
        let json: Value = response
            .json()
            .await
            .map_err(|e| QueryError::Decode(format!("radius response parse failed: {e}")))?;
        json.get("radius")
            .and_then(number)
            .filter(|radius| radius.is_finite() && *radius >= 0.0)
            .ok_or_else(|| QueryError::Decode("radius response missing a radius".to_owned()))
    }
}

/// Extract the planet list of a GraphQL response.
fn parse_planets(json: &Value) -> Result<Vec<AssetSnapshot>, QueryError> {
    if let Some(errors) = json.get("errors").filter(|e| !e.is_null()) {
        return Err(QueryError::Transport(format!("graph reported errors: {errors}")));
    }
    let planets = json
        .get("data")
        .and_then(|d| d.get("planets"))
        .and_then(Value::as_array)
        .ok_or_else(|| QueryError::Decode("graph response missing data.planets".to_owned()))?;
    planets.iter().map(parse_planet).collect()
}

/// Convert one indexer planet into a snapshot.
fn parse_planet(planet: &Value) -> Result<AssetSnapshot, QueryError> {
    let id = planet
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| QueryError::Decode("planet without id".to_owned()))?;
    let field = |name: &str| {
        planet
            .get(name)
            .and_then(number)
            .ok_or_else(|| QueryError::Decode(format!("planet {id} missing {name}")))
    };

    let owner = planet
        .get("owner")
        .and_then(|o| o.get("id"))
        .and_then(Value::as_str)
        .map_or(Owner::Unclaimed, |address| Owner::from(address.to_owned()));
    let last_updated = DateTime::from_timestamp(whole(field("lastUpdated")?), 0)
        .ok_or_else(|| QueryError::Decode(format!("planet {id} has an invalid lastUpdated")))?;

    Ok(AssetSnapshot {
        id: AssetId::new(id),
        owner,
        level: u32::try_from(whole(field("planetLevel")?)).unwrap_or(0),
        asset_type: planet
            .get("planetType")
            .map_or(AssetType::Planet, asset_type),
        defense: field("defense")?,
        resource_current: field("milliEnergyLazy")? / 1000.0,
        resource_cap: field("milliEnergyCap")? / 1000.0,
        resource_growth: field("milliEnergyGrowth")? / 1000.0,
        last_updated,
        range: field("range")?,
    })
}

/// A JSON number or a numeric string.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn whole(value: f64) -> i64 {
    value.trunc() as i64
}

fn asset_type(value: &Value) -> AssetType {
    match value {
        Value::String(name) => match name.as_str() {
            "SILVER_MINE" | "MINE" => AssetType::Mine,
            "RUINS" => AssetType::Ruins,
            "TRADING_POST" => AssetType::TradingPost,
            "SILVER_BANK" | "RESERVOIR" => AssetType::Reservoir,
            other => other
                .parse::<u8>()
                .ok()
                .and_then(AssetType::from_code)
                .unwrap_or(AssetType::Planet),
        },
        Value::Number(code) => code
            .as_u64()
            .and_then(|c| u8::try_from(c).ok())
            .and_then(AssetType::from_code)
            .unwrap_or(AssetType::Planet),
        _ => AssetType::Planet,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn response(planets: &Value) -> Value {
        serde_json::json!({ "data": { "planets": planets } })
    }

    #[test]
    fn converts_milli_units_and_owner() {
        let json = response(&serde_json::json!([{
            "id": "00000a1f",
            "owner": { "id": "0xBEEF" },
            "defense": 400,
            "lastUpdated": "1700000000",
            "milliEnergyLazy": "80000",
            "milliEnergyGrowth": 1500,
            "milliEnergyCap": "100000",
            "planetLevel": 3,
            "planetType": "PLANET",
            "range": 500
        }]));
        let planets = parse_planets(&json).unwrap();

        assert_eq!(planets.len(), 1);
        let planet = &planets[0];
        assert_eq!(planet.id, AssetId::new("00000a1f"));
        assert!(planet.owner.is(&Identity::new("beef")));
        assert_eq!(planet.resource_current, 80.0);
        assert_eq!(planet.resource_cap, 100.0);
        assert_eq!(planet.resource_growth, 1.5);
        assert_eq!(planet.level, 3);
        assert_eq!(planet.last_updated.timestamp(), 1_700_000_000);
    }

    #[test]
    fn zero_address_and_missing_type_mean_unclaimed_planet() {
        let json = response(&serde_json::json!([{
            "id": "ab",
            "owner": { "id": "0x0000000000000000000000000000000000000000" },
            "defense": 100,
            "lastUpdated": 0,
            "milliEnergyLazy": 0,
            "milliEnergyGrowth": 0,
            "milliEnergyCap": 1000,
            "planetLevel": 0,
            "range": 99
        }]));
        let planet = &parse_planets(&json).unwrap()[0];

        assert!(planet.owner.is_unclaimed());
        assert_eq!(planet.asset_type, AssetType::Planet);
    }

    #[test]
    fn reservoir_names_map_to_reservoir() {
        assert_eq!(asset_type(&Value::from("SILVER_BANK")), AssetType::Reservoir);
        assert_eq!(asset_type(&Value::from(4)), AssetType::Reservoir);
        assert_eq!(asset_type(&Value::from("SILVER_MINE")), AssetType::Mine);
    }

    #[test]
    fn graph_errors_and_missing_fields_are_errors() {
        let errors = serde_json::json!({ "errors": [{ "message": "boom" }] });
        assert!(matches!(parse_planets(&errors), Err(QueryError::Transport(_))));

        let incomplete = response(&serde_json::json!([{ "id": "ab" }]));
        assert!(matches!(parse_planets(&incomplete), Err(QueryError::Decode(_))));
    }
}
