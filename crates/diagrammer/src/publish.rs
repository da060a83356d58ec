//! Publishing of rendered artifacts and their sources.

use std::sync::Arc;

use log::{debug, info};
use uuid::Uuid;

use diagrammer_core::family::Family;

use crate::{
    materialize::RenderedArtifact,
    store::{ObjectStore, StoreError},
};

const SOURCE_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Public locations of an uploaded diagram and its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPair {
    diagram_id: String,
    diagram_key: String,
    source_key: String,
    diagram_url: String,
    source_url: String,
}

impl PublishedPair {
    /// `<family>_<uuid>`, shared by both keys.
    pub fn diagram_id(&self) -> &str {
        &self.diagram_id
    }

    pub fn diagram_key(&self) -> &str {
        &self.diagram_key
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn diagram_url(&self) -> &str {
        &self.diagram_url
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

/// Uploads artifacts to one bucket.
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    region: String,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            region: region.into(),
        }
    }

    /// Public URL of `key` in the publisher's bucket.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use diagrammer::{publish::Publisher, store::MemoryStore};
    /// let publisher = Publisher::new(Arc::new(MemoryStore::new()), "media", "eu-west-1");
    /// assert_eq!(
    ///     publisher.object_url("diagrams/aws_1.png"),
    ///     "https://media.s3.eu-west-1.amazonaws.com/diagrams/aws_1.png"
    /// );
    /// ```
    pub fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{key}",
            self.bucket, self.region
        )
    }

    /// Uploads the artifact, then the source text, under fresh keys.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`]. Nothing is retried; a diagram
    /// uploaded before a failed source upload is left in place.
    pub fn publish(
        &self,
        artifact: &RenderedArtifact,
        source_text: &str,
        family: Family,
    ) -> Result<PublishedPair, StoreError> {
        let diagram_id = format!("{}_{}", family.as_str(), Uuid::new_v4());
        let format = artifact.format();
        let diagram_key = format!("diagrams/{diagram_id}.{}", format.extension());
        let source_key = format!("source_codes/{diagram_id}.{}", family.source_extension());

        self.store
            .upload_file(&self.bucket, &diagram_key, artifact.path(), format.content_type())?;
        debug!(key = diagram_key.as_str(); "Diagram uploaded");

        self.store.put_object(
            &self.bucket,
            &source_key,
            source_text.as_bytes(),
            SOURCE_CONTENT_TYPE,
        )?;
        debug!(key = source_key.as_str(); "Source uploaded");

        info!(diagram_id = diagram_id.as_str(), bucket = self.bucket.as_str(); "Diagram published");
        Ok(PublishedPair {
            diagram_url: self.object_url(&diagram_key),
            source_url: self.object_url(&source_key),
            diagram_id,
            diagram_key,
            source_key,
        })
    }
}
