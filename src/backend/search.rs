//! Team-scoped search endpoint.

use serde::{Deserialize, Serialize};

use super::client::{ApiClient, RequestOptions};
use super::error::BackendResult;
use super::models::SearchResults;
use crate::auth::BearerToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchObjectType {
    Boards,
    Cards,
    Pages,
    Projects,
}

impl SearchObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boards => "boards",
            Self::Cards => "cards",
            Self::Pages => "pages",
            Self::Projects => "projects",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Title,
    Content,
}

impl SearchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Content => "content",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Backlog,
    Committed,
    Started,
    Completed,
    Cancelled,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Committed => "committed",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Search filters. Only `query` is required.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub query: String,
    pub cursor: Option<String>,
    pub count: Option<u32>,
    pub types: Option<Vec<SearchObjectType>>,
    pub fields: Option<Vec<SearchField>>,
    pub archived: Option<bool>,
    pub statuses: Option<Vec<CardStatus>>,
    pub project_id: Option<String>,
    pub grouped: Option<bool>,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_types(mut self, types: Vec<SearchObjectType>) -> Self {
        self.types = Some(types);
        self
    }

    /// Query string pairs in the order the API documents them.
    /// List filters are comma-joined; unset filters are omitted.
    pub fn to_query(&self) -> Vec<(String, String)> {
        fn join<T>(items: &[T], f: impl Fn(&T) -> &'static str) -> String {
            items.iter().map(f).collect::<Vec<_>>().join(",")
        }

        let mut pairs = vec![("query".to_string(), self.query.clone())];

        if let Some(cursor) = &self.cursor {
            pairs.push(("cursor".into(), cursor.clone()));
        }
        if let Some(count) = self.count.filter(|c| *c > 0) {
            pairs.push(("count".into(), count.to_string()));
        }
        if let Some(types) = &self.types {
            pairs.push(("types".into(), join(types, SearchObjectType::as_str)));
        }
        if let Some(fields) = &self.fields {
            pairs.push(("fields".into(), join(fields, SearchField::as_str)));
        }
        if let Some(archived) = self.archived {
            pairs.push(("archived".into(), archived.to_string()));
        }
        if let Some(statuses) = &self.statuses {
            pairs.push(("statuses".into(), join(statuses, CardStatus::as_str)));
        }
        if let Some(project_id) = &self.project_id {
            pairs.push(("project_id".into(), project_id.clone()));
        }
        if let Some(grouped) = self.grouped {
            pairs.push(("grouped".into(), grouped.to_string()));
        }

        pairs
    }
}

/// Search one team.
pub async fn search(
    client: &ApiClient,
    team_id: &str,
    token: &BearerToken,
    options: &SearchOptions,
) -> BackendResult<SearchResults> {
    let request = RequestOptions {
        query: options.to_query(),
        ..RequestOptions::get()
    };
    client
        .request_as(&format!("/{team_id}/search"), token, request)
        .await
}
