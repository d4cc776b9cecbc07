use std::{
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use fs_err as fs;
use packos::{BinSnapshot, Packer, PackingOptions};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::config::check_options;

static SESSION_FILENAME: &str = "texpack-session.json";

/// Bumped whenever the shape of a saved session changes.
pub const SESSION_VERSION: u32 = 1;

/// The saved state of a packer, including every bin's free space, so that a
/// later run can keep adding to the same pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackSession<T> {
    pub version: u32,

    /// The options the packer was using when the session was saved.
    pub options: PackingOptions,

    pub bins: Vec<BinSnapshot<T>>,
}

impl<T> PackSession<T> {
    pub fn capture(packer: &Packer<T>) -> Self
    where
        T: Clone,
    {
        Self {
            version: SESSION_VERSION,
            options: *packer.options(),
            bins: packer.save(),
        }
    }

    /// Creates a packer that continues where this session left off.
    ///
    /// Restored bins keep the options they were saved with; `options` only
    /// applies to bins opened from here on.
    pub fn resume(self, options: PackingOptions) -> Packer<T> {
        if options != self.options {
            log::debug!(
                "Packing options changed since the session was saved, {} existing bins keep their old layout",
                self.bins.len()
            );
        }

        let mut packer = Packer::new(options);
        packer.load(self.bins);
        packer
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), SessionError>
    where
        T: Serialize,
    {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self, SessionError>
    where
        T: DeserializeOwned,
    {
        let value: serde_json::Value = serde_json::from_reader(reader)?;

        let found = value.get("version").and_then(serde_json::Value::as_u64);
        if found != Some(u64::from(SESSION_VERSION)) {
            return Err(SessionError::UnsupportedVersion { found });
        }

        let session: Self = serde_json::from_value(value)?;
        session.validate()?;

        Ok(session)
    }

    pub fn write_to_folder<P: AsRef<Path>>(&self, folder_path: P) -> Result<(), SessionError>
    where
        T: Serialize,
    {
        let folder_path = folder_path.as_ref();
        let file_path = &folder_path.join(SESSION_FILENAME);

        let mut file = BufWriter::new(fs::File::create(file_path)?);
        self.write_to(&mut file)?;
        file.flush()?;

        log::trace!("Saved session to {}", file_path.display());

        Ok(())
    }

    /// Reads the session saved in `folder_path`. A folder that has never had
    /// a session saved to it gives `Ok(None)`.
    pub fn read_from_folder<P: AsRef<Path>>(folder_path: P) -> Result<Option<Self>, SessionError>
    where
        T: DeserializeOwned,
    {
        let folder_path = folder_path.as_ref();
        let file_path = &folder_path.join(SESSION_FILENAME);

        let file = match fs::File::open(file_path) {
            Ok(file) => file,
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let session = Self::read_from(BufReader::new(file))?;

        log::trace!(
            "Read session with {} bins from {}",
            session.bins.len(),
            file_path.display()
        );

        Ok(Some(session))
    }

    /// Rejects snapshots that would trip the packer's own assertions.
    fn validate(&self) -> Result<(), SessionError> {
        check_options(&self.options).map_err(|reason| SessionError::Corrupt { reason })?;

        for (index, bin) in self.bins.iter().enumerate() {
            let corrupt = |reason: String| SessionError::Corrupt {
                reason: format!("bin {}: {}", index, reason),
            };

            if bin.oversized {
                if bin.rects.len() != 1 {
                    return Err(corrupt(format!(
                        "oversized bins hold exactly one rect, found {}",
                        bin.rects.len()
                    )));
                }
            } else {
                check_options(&bin.options).map_err(&corrupt)?;
            }

            if let Some(free) = bin
                .free_rects
                .iter()
                .find(|rect| rect.width <= 0 || rect.height <= 0)
            {
                return Err(corrupt(format!("free rect {:?} is empty", free)));
            }

            if let Some(rect) = bin
                .rects
                .iter()
                .find(|rect| rect.width() <= 0 || rect.height() <= 0)
            {
                return Err(corrupt(format!(
                    "rect {:?} is {}x{}",
                    rect.id(),
                    rect.width(),
                    rect.height()
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unsupported session version {found:?}, expected {}", SESSION_VERSION)]
    UnsupportedVersion { found: Option<u64> },

    #[error("Session is corrupt: {reason}")]
    Corrupt { reason: String },

    #[error(transparent)]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io {
        #[from]
        source: io::Error,
    },
}

#[cfg(test)]
mod test {
    use super::*;

    use packos::PlacedRect;

    fn options() -> PackingOptions {
        PackingOptions::new()
            .with_max_size((256, 256))
            .with_padding(0, 0)
            .with_edge_border(0)
    }

    fn packed() -> Packer<String> {
        let mut packer = Packer::new(options());

        packer.add_many(vec![
            PlacedRect::with_data((128, 128), "grass".to_owned()),
            PlacedRect::with_data((128, 64), "dirt".to_owned()),
            PlacedRect::with_data((300, 10), "sky".to_owned()),
        ]);

        packer
    }

    #[test]
    fn round_trip_through_json() {
        let packer = packed();
        let session = PackSession::capture(&packer);

        let mut buffer = Vec::new();
        session.write_to(&mut buffer).unwrap();

        let restored: PackSession<String> = PackSession::read_from(buffer.as_slice()).unwrap();
        assert_eq!(restored, session);

        let resumed = restored.resume(options());
        assert_eq!(resumed.placements(), packer.placements());
        assert_eq!(resumed.bins().len(), 2);
        assert!(resumed.bins()[0].is_oversized());
    }

    #[test]
    fn resumed_packer_places_like_the_original() {
        let mut original = packed();
        let mut resumed = PackSession::capture(&original).resume(options());

        let a = original.add((64, 64), "a".to_owned());
        let b = resumed.add((64, 64), "a".to_owned());

        assert_eq!((a.bin_index, a.x, a.y), (b.bin_index, b.x, b.y));
    }

    #[test]
    fn rejects_other_versions() {
        let mut session = PackSession::capture(&packed());
        session.version = SESSION_VERSION + 1;

        let mut buffer = Vec::new();
        session.write_to(&mut buffer).unwrap();

        match PackSession::<String>::read_from(buffer.as_slice()) {
            Err(SessionError::UnsupportedVersion { found }) => {
                assert_eq!(found, Some(u64::from(SESSION_VERSION + 1)))
            }
            other => panic!("expected a version error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_missing_version() {
        let result = PackSession::<()>::read_from(r#"{ "bins": [] }"#.as_bytes());

        assert!(matches!(
            result,
            Err(SessionError::UnsupportedVersion { found: None })
        ));
    }

    #[test]
    fn rejects_empty_free_rects() {
        let mut session = PackSession::capture(&packed());
        let regular = session.bins.iter_mut().find(|bin| !bin.oversized).unwrap();
        regular.free_rects.push(packos::Rect::new(0, 0, 0, 10));

        let mut buffer = Vec::new();
        session.write_to(&mut buffer).unwrap();

        let err = PackSession::<String>::read_from(buffer.as_slice()).unwrap_err();
        assert!(matches!(err, SessionError::Corrupt { .. }), "{}", err);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let result = PackSession::<()>::read_from("not json".as_bytes());

        assert!(matches!(result, Err(SessionError::Json { .. })));
    }

    #[test]
    fn missing_session_reads_as_none() {
        let folder = std::env::temp_dir().join("texpack-session-test-does-not-exist");

        let session = PackSession::<()>::read_from_folder(&folder).unwrap();
        assert!(session.is_none());
    }

    #[test]
    fn write_and_read_folder() {
        let folder = std::env::temp_dir().join(format!("texpack-session-test-{}", std::process::id()));
        fs::create_dir_all(&folder).unwrap();

        let session = PackSession::capture(&packed());
        session.write_to_folder(&folder).unwrap();

        let restored = PackSession::<String>::read_from_folder(&folder).unwrap();
        assert_eq!(restored, Some(session));

        fs::remove_dir_all(&folder).unwrap();
    }
}
