//! # Descriptor Source
//!
//! This module handles the loading of Protobuf `FileDescriptorSet`s, either from a file on disk,
//! from an in-memory buffer, or from protos fetched through server reflection.
//!
//! A [`DescriptorSet`] keeps both the resolved [`DescriptorPool`] (used to build dynamic messages
//! and the method table) and the raw file protos, which the server publishes back to clients
//! through the reflection service.
use prost::Message;
use prost_reflect::{DescriptorPool, MethodDescriptor, ServiceDescriptor};
use prost_types::FileDescriptorSet;
use std::path::{Path, PathBuf};

use crate::reflection::client::ReflectionError;

#[derive(thiserror::Error, Debug)]
pub enum DescriptorError {
    #[error("Descriptor file '{path}' is unavailable: '{source}'")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Descriptor set is corrupt: '{0}'")]
    Corrupt(#[from] prost::DecodeError),
    #[error("Descriptor set cannot be resolved: '{0}'")]
    Unresolved(#[from] prost_reflect::DescriptorError),
    #[error("Failed to fetch descriptors from peer: '{0}'")]
    FetchFailed(#[from] ReflectionError),
}

/// An immutable set of service and message descriptors.
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    pool: DescriptorPool,
    files: FileDescriptorSet,
}

impl DescriptorSet {
    /// Reads an encoded `FileDescriptorSet` from disk.
    ///
    /// Missing, unreadable and corrupt files are all reported, the caller is expected
    /// to treat any of them as fatal.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| DescriptorError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;

        let set = Self::from_bytes(&bytes)?;

        tracing::info!(
            path = %path.display(),
            files = set.files.file.len(),
            "loaded descriptor set"
        );

        Ok(set)
    }

    /// Decodes an encoded `FileDescriptorSet` held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DescriptorError> {
        let files = FileDescriptorSet::decode(bytes)?;
        Self::from_file_descriptor_set(files)
    }

    /// Builds a set from already decoded file protos, e.g. the ones returned by a reflection call.
    pub fn from_file_descriptor_set(files: FileDescriptorSet) -> Result<Self, DescriptorError> {
        let pool = DescriptorPool::from_file_descriptor_set(files.clone())?;
        Ok(Self { pool, files })
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// The raw protos this set was built from.
    pub fn file_descriptor_set(&self) -> &FileDescriptorSet {
        &self.files
    }

    /// Enumerates all services, file by file, in declaration order.
    pub fn services(&self) -> impl ExactSizeIterator<Item = ServiceDescriptor> + '_ {
        self.pool.services()
    }

    /// Resolves a full method path (e.g. `helloworld.Greeter/SayHello`).
    pub fn method_by_path(&self, method_path: &str) -> Option<MethodDescriptor> {
        let (service_name, method_name) = method_path.trim_start_matches('/').split_once('/')?;

        self.pool
            .get_service_by_name(service_name)?
            .methods()
            .find(|m| m.name() == method_name)
    }
}
