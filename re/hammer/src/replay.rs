//! Recording and replaying derivations.
//!
//! A recording captures every `(scope, active set) -> image` request seen by a
//! backend, so that a campaign can later be re-run without the vendor tools.

use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Mutex;

use itertools::Itertools;
use prjsense_types::{ConfigImage, TileCoord};
use serde::{Deserialize, Serialize};
use simple_error::SimpleError;

use crate::{ActiveSet, Backend, DerivationError};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RecordedDerivation {
    pub scope: Vec<TileCoord>,
    pub active: ActiveSet,
    pub image: ConfigImage,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub derivations: Vec<RecordedDerivation>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let f = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(f)?)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let f = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(f, self)?;
        Ok(())
    }

    pub fn lookup(&self, scope: &[TileCoord], active: &ActiveSet) -> Option<&ConfigImage> {
        self.derivations
            .iter()
            .find(|d| d.scope == scope && d.active == *active)
            .map(|d| &d.image)
    }

    /// Adds a derivation unless the same request is already present.
    pub fn insert(&mut self, scope: &[TileCoord], active: &ActiveSet, image: ConfigImage) {
        if self.lookup(scope, active).is_some() {
            return;
        }
        self.derivations.push(RecordedDerivation {
            scope: scope.to_vec(),
            active: active.clone(),
            image,
        });
    }
}

/// Answers requests from a recording. An unrecorded request is an error.
#[derive(Debug)]
pub struct ReplayBackend {
    recording: Recording,
}

impl ReplayBackend {
    pub fn new(recording: Recording) -> Self {
        ReplayBackend { recording }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        Ok(Self::new(Recording::from_file(path)?))
    }
}

impl Backend for ReplayBackend {
    fn derive_image(
        &self,
        scope: &[TileCoord],
        active: &ActiveSet,
    ) -> Result<ConfigImage, DerivationError> {
        match self.recording.lookup(scope, active) {
            Some(image) => Ok(image.clone()),
            None => {
                Err(Box::new(SimpleError::new(format!(
                    "no recorded derivation for [{}] with [{}]",
                    scope.iter().join(","),
                    active.iter().join(" ")
                ))))
            }
        }
    }
}

/// Passes requests through to another backend and records the answers.
#[derive(Debug)]
pub struct RecordingBackend<B: Backend> {
    inner: B,
    recording: Mutex<Recording>,
}

impl<B: Backend> RecordingBackend<B> {
    pub fn new(inner: B) -> Self {
        RecordingBackend {
            inner,
            recording: Mutex::new(Recording::new()),
        }
    }

    pub fn into_recording(self) -> Recording {
        self.recording.into_inner().unwrap()
    }
}

impl<B: Backend> Backend for RecordingBackend<B> {
    fn derive_image(
        &self,
        scope: &[TileCoord],
        active: &ActiveSet,
    ) -> Result<ConfigImage, DerivationError> {
        let image = self.inner.derive_image(scope, active)?;
        self.recording
            .lock()
            .unwrap()
            .insert(scope, active, image.clone());
        Ok(image)
    }
}
