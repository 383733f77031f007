//! Cascading region → subregion → intermediate region → country lookups.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::reference::{CountryMeta, CountryTable};
use crate::selection::GeoFilter;

#[derive(Debug, Clone)]
pub struct GeoHierarchy {
    countries: Vec<CountryMeta>,
    iso3: HashMap<String, String>,
}

impl GeoHierarchy {
    pub fn new(table: &CountryTable) -> Self {
        Self::from_countries(table.countries().to_vec())
    }

    pub fn from_countries(countries: Vec<CountryMeta>) -> Self {
        let iso3 = countries
            .iter()
            .map(|c| (c.name.clone(), c.iso3.clone()))
            .collect();
        Self { countries, iso3 }
    }

    pub fn regions(&self) -> Vec<String> {
        sorted_unique(self.countries.iter().map(|c| Some(c.region.as_str())))
    }

    /// Subregions, optionally restricted to one region.
    pub fn subregions_for(&self, region: Option<&str>) -> Vec<String> {
        sorted_unique(
            self.countries
                .iter()
                .filter(|c| matches(&c.region, region))
                .map(|c| c.subregion.as_deref()),
        )
    }

    pub fn intermediate_regions_for(
        &self,
        region: Option<&str>,
        subregion: Option<&str>,
    ) -> Vec<String> {
        sorted_unique(
            self.countries
                .iter()
                .filter(|c| matches(&c.region, region))
                .filter(|c| matches_opt(&c.subregion, subregion))
                .map(|c| c.intermediate_region.as_deref()),
        )
    }

    pub fn countries_for(
        &self,
        region: Option<&str>,
        subregion: Option<&str>,
        intermediate_region: Option<&str>,
    ) -> Vec<String> {
        sorted_unique(
            self.members(region, subregion, intermediate_region)
                .map(|c| Some(c.name.as_str())),
        )
    }

    /// Concrete country set for a geographic selection.
    ///
    /// A country selects exactly itself (even without a metadata row). An
    /// ancestor filter that matches nothing yields an empty set, never "all".
    pub fn resolve_selection(&self, geo: &GeoFilter) -> BTreeSet<String> {
        if let Some(country) = &geo.country {
            return BTreeSet::from([country.clone()]);
        }
        let resolved: BTreeSet<String> = self
            .members(
                geo.region.as_deref(),
                geo.subregion.as_deref(),
                geo.intermediate_region.as_deref(),
            )
            .map(|c| c.name.clone())
            .collect();
        if resolved.is_empty() && !geo.is_unfiltered() {
            debug!(?geo, "geographic selection matched no countries");
        }
        resolved
    }

    pub fn iso3(&self, name: &str) -> Option<&str> {
        self.iso3.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    fn members<'a>(
        &'a self,
        region: Option<&'a str>,
        subregion: Option<&'a str>,
        intermediate_region: Option<&'a str>,
    ) -> impl Iterator<Item = &'a CountryMeta> + 'a {
        self.countries.iter().filter(move |c| {
            matches(&c.region, region)
                && matches_opt(&c.subregion, subregion)
                && matches_opt(&c.intermediate_region, intermediate_region)
        })
    }
}

fn matches(value: &str, wanted: Option<&str>) -> bool {
    wanted.is_none_or(|w| value == w)
}

fn matches_opt(value: &Option<String>, wanted: Option<&str>) -> bool {
    wanted.is_none_or(|w| value.as_deref() == Some(w))
}

fn sorted_unique<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    values
        .flatten()
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
