//! Query façade over a case's collections.
//!
//! Natural-language queries are encoded in the space of the collection they
//! target and run as vector searches; substring queries go straight to the
//! store. Every error converts to the `{"error", "code"}` payload the agent
//! boundary expects.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::embedding::{EmbeddingProvider, QuerySpace};
use crate::error::{RetrievalError, RetrievalResult};
use crate::store::{CollectionInfo, Hit, OutputField, SearchRequest, StoreGateway};
use crate::types::{CaseCollections, Modality};
use crate::vector::{ImageSpace, TextSpace};

pub const DEFAULT_LIMIT: usize = 5;

/// A collection as shown to callers choosing where to search.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modality: Option<Modality>,
    pub row_count: u64,
}

/// Runs queries for one case.
pub struct Retriever<'a> {
    provider: &'a EmbeddingProvider,
    gateway: &'a StoreGateway,
    collections: CaseCollections,
    limit: usize,
    output_fields: Vec<OutputField>,
}

impl<'a> Retriever<'a> {
    pub fn new(provider: &'a EmbeddingProvider, gateway: &'a StoreGateway, case_name: &str) -> Self {
        Self {
            provider,
            gateway,
            collections: CaseCollections::for_case(case_name),
            limit: DEFAULT_LIMIT,
            output_fields: OutputField::DEFAULT.to_vec(),
        }
    }

    /// Retriever with the `[search]` defaults from `settings`.
    pub fn from_settings(
        provider: &'a EmbeddingProvider,
        gateway: &'a StoreGateway,
        settings: &Settings,
    ) -> Self {
        let fields = settings.search.parsed_output_fields().unwrap_or_else(|e| {
            warn!("Ignoring search.output_fields: {e}");
            OutputField::DEFAULT.to_vec()
        });
        Self::new(provider, gateway, &settings.case_name)
            .with_limit(settings.search.limit)
            .with_output_fields(&fields)
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_output_fields(mut self, fields: &[OutputField]) -> Self {
        self.output_fields = fields.to_vec();
        self
    }

    pub fn collections(&self) -> &CaseCollections {
        &self.collections
    }

    /// The embedding space a collection's vectors live in.
    pub fn space_of(&self, collection: &str) -> RetrievalResult<Modality> {
        self.collections
            .modality_of(collection)
            .ok_or_else(|| RetrievalError::UnknownCollectionSpace {
                collection: collection.to_string(),
            })
    }

    /// Encodes `query` for `collection` and returns its nearest records.
    ///
    /// `None` for `limit` or `fields` falls back to the retriever defaults.
    pub fn search_by_text(
        &self,
        query: &str,
        collection: &str,
        limit: Option<usize>,
        fields: Option<&[OutputField]>,
    ) -> RetrievalResult<Vec<Hit>> {
        match self.space_of(collection)? {
            Modality::Image => self.search_in::<ImageSpace>(query, collection, limit, fields),
            Modality::Text => self.search_in::<TextSpace>(query, collection, limit, fields),
        }
    }

    /// Vector search with the query encoded in space `S`.
    pub fn search_in<S: QuerySpace>(
        &self,
        query: &str,
        collection: &str,
        limit: Option<usize>,
        fields: Option<&[OutputField]>,
    ) -> RetrievalResult<Vec<Hit>> {
        let vector = S::encode_query(self.provider, query)?;
        let request = SearchRequest::new(collection, vector.into_inner())
            .limit(limit.unwrap_or(self.limit))
            .output_fields(fields.unwrap_or(&self.output_fields));
        let hits = self.gateway.search(&request)?;
        debug!(collection, space = S::NAME, hits = hits.len(), "Vector search");
        Ok(hits)
    }

    /// Searches this case's image collection.
    pub fn search_images(&self, query: &str, limit: Option<usize>) -> RetrievalResult<Vec<Hit>> {
        self.search_in::<ImageSpace>(query, &self.collections.image, limit, None)
    }

    /// Searches this case's text collection.
    pub fn search_texts(&self, query: &str, limit: Option<usize>) -> RetrievalResult<Vec<Hit>> {
        self.search_in::<TextSpace>(query, &self.collections.text, limit, None)
    }

    /// Records whose `field` contains `substring`, in insertion order.
    pub fn text_search(
        &self,
        collection: &str,
        substring: &str,
        field: OutputField,
        limit: Option<usize>,
        fields: Option<&[OutputField]>,
    ) -> RetrievalResult<Vec<Hit>> {
        Ok(self.gateway.pattern_query(
            collection,
            field,
            substring,
            limit.unwrap_or(self.limit),
            fields.unwrap_or(&self.output_fields),
        )?)
    }

    /// Every collection in the store with its description.
    pub fn list_collections(&self) -> RetrievalResult<Vec<CollectionSummary>> {
        let mut summaries = Vec::new();
        for name in self.gateway.list_collections()? {
            let info = self.gateway.describe(&name)?;
            summaries.push(CollectionSummary {
                modality: self.collections.modality_of(&name),
                description: info.schema.description,
                row_count: info.row_count,
                name,
            });
        }
        Ok(summaries)
    }

    pub fn describe(&self, collection: &str) -> RetrievalResult<CollectionInfo> {
        Ok(self.gateway.describe(collection)?)
    }
}
