// src/filter.rs
//! Request payload shared by the territories and houses report endpoints.
//!
//! A `RequestFilter` is built once per run and never mutated; pagination
//! derives per-page copies with [`RequestFilter::page`].

use serde::{Deserialize, Serialize};

use crate::config::FetchOptions;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerritoryCategory {
    #[default]
    Administrative,
    Municipal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFilter {
    pub management_types: Vec<String>,
    pub operation_year_from: i32,
    pub operation_year_to: i32,
    pub territories: Vec<String>,
    pub with_federal_districts: bool,
    pub territory_category: TerritoryCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_asc: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl RequestFilter {
    pub fn new(year_from: i32, year_to: i32) -> Self {
        Self {
            management_types: Vec::new(),
            operation_year_from: year_from,
            operation_year_to: year_to,
            territories: Vec::new(),
            with_federal_districts: false,
            territory_category: TerritoryCategory::Administrative,
            sort_by: None,
            sort_asc: None,
            page_number: None,
            page_size: None,
        }
    }

    /// Filter for the territories report (no sort, no paging).
    pub fn territories_report(opts: &FetchOptions) -> Self {
        Self {
            management_types: opts.management_types.clone(),
            territories: opts.report_territories.clone(),
            with_federal_districts: opts.with_federal_districts,
            territory_category: opts.territory_category,
            ..Self::new(opts.year_from, opts.year_to)
        }
    }

    /// Filter for the house listing. Sort is fixed here and carried unchanged
    /// onto every page.
    pub fn house_listing(opts: &FetchOptions) -> Self {
        Self {
            management_types: opts.management_types.clone(),
            territories: opts.house_territories.clone(),
            with_federal_districts: opts.with_federal_districts,
            territory_category: opts.territory_category,
            ..Self::new(opts.year_from, opts.year_to)
        }
        .sorted(&opts.sort_by, opts.sort_asc)
    }

    pub fn with_territories<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.territories = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_federal_districts(mut self, yes: bool) -> Self {
        self.with_federal_districts = yes;
        self
    }

    pub fn sorted(mut self, field: &str, asc: bool) -> Self {
        self.sort_by = Some(field.to_string());
        self.sort_asc = Some(asc);
        self
    }

    /// Copy of this filter addressing one page (1-based).
    pub fn page(&self, number: u32, size: u32) -> Self {
        Self { page_number: Some(number), page_size: Some(size), ..self.clone() }
    }

    pub fn is_sorted(&self) -> bool {
        self.sort_by.is_some() && self.sort_asc.is_some()
    }
}
