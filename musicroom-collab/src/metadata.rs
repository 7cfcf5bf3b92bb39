use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::join_all;
use log::warn;
use thiserror::Error;

use crate::{TrackId, TrackMetadata};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Track {0} could not be found")]
    NotFound(TrackId),
    #[error("Track metadata lookup failed: {0}")]
    Lookup(String),
}

/// Represents a type that can resolve a track id into its title, artist, and duration
#[async_trait]
pub trait MetadataResolver
where
    Self: Send + Sync + 'static,
{
    async fn resolve(&self, track_id: &TrackId) -> Result<TrackMetadata, MetadataError>;
}

/// The outcome of resolving several track ids at once
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved tracks, in the order they were requested
    pub resolved: Vec<TrackMetadata>,
    pub unresolved: Vec<TrackId>,
}

/// Resolves all the given ids concurrently. Failures are logged and reported as unresolved.
pub async fn resolve_tracks(resolver: &dyn MetadataResolver, track_ids: &[TrackId]) -> Resolution {
    let results = join_all(track_ids.iter().map(|id| resolver.resolve(id))).await;
    let mut resolution = Resolution::default();

    for (track_id, result) in track_ids.iter().zip(results) {
        match result {
            Ok(metadata) => resolution.resolved.push(metadata),
            Err(error) => {
                warn!("Could not resolve track {}: {}", track_id, error);
                resolution.unresolved.push(track_id.clone());
            }
        }
    }

    resolution
}

/// An in-memory catalog of known tracks
#[derive(Debug, Default)]
pub struct StaticCatalog {
    tracks: DashMap<TrackId, TrackMetadata>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, metadata: TrackMetadata) {
        self.tracks.insert(metadata.id.clone(), metadata);
    }
}

impl FromIterator<TrackMetadata> for StaticCatalog {
    fn from_iter<T: IntoIterator<Item = TrackMetadata>>(iter: T) -> Self {
        let catalog = Self::new();

        for metadata in iter {
            catalog.insert(metadata);
        }

        catalog
    }
}

#[async_trait]
impl MetadataResolver for StaticCatalog {
    async fn resolve(&self, track_id: &TrackId) -> Result<TrackMetadata, MetadataError> {
        self.tracks
            .get(track_id)
            .map(|t| t.clone())
            .ok_or_else(|| MetadataError::NotFound(track_id.clone()))
    }
}
