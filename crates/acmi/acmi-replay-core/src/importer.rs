//! Importer: drives the parser and builder over a source and returns a finished [`Recording`].
//!
//! Loading is one sequential pass. An optional cancellation flag is checked between records;
//! a cancelled load returns [`LoadError::Cancelled`] and its partial state is dropped.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::error::LoadError;
use crate::geo::{GeodeticConverter, Wgs84Enu};
use crate::parser::RecordParser;
use crate::recording::{Recording, RecordingBuilder};

/// Import settings plus the geodetic converter used for local positions.
#[derive(Clone, Debug)]
pub struct Importer {
    cfg: Config,
    converter: Arc<dyn GeodeticConverter>,
}

impl Default for Importer {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Importer {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            converter: Arc::new(Wgs84Enu),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn GeodeticConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn load_path(
        &self,
        path: impl AsRef<Path>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Recording, LoadError> {
        let path = path.as_ref();
        log::debug!("opening {}", path.display());
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_reader(BufReader::new(file), cancel)
    }

    pub fn load_reader<R: BufRead>(
        &self,
        reader: R,
        cancel: Option<&AtomicBool>,
    ) -> Result<Recording, LoadError> {
        self.load_lines(reader.lines(), cancel)
    }

    pub fn load_str(&self, text: &str) -> Result<Recording, LoadError> {
        self.load_reader(Cursor::new(text.as_bytes()), None)
    }

    /// Core loop over any line source.
    pub fn load_lines<I>(&self, lines: I, cancel: Option<&AtomicBool>) -> Result<Recording, LoadError>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        let mut parser = RecordParser::new(lines)
            .with_converter(Arc::clone(&self.converter))
            .with_origin_policy(self.cfg.origin);
        let mut builder = RecordingBuilder::new(&self.cfg);

        loop {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                log::debug!("load cancelled after {} lines", parser.lines_read());
                return Err(LoadError::Cancelled);
            }
            let Some(item) = parser.next() else { break };
            builder.push(item)?;
        }

        if let Some(source) = parser.take_io_error() {
            return Err(LoadError::Read {
                line: parser.lines_read(),
                source,
            });
        }
        builder.finish(parser.origin())
    }
}

/// Load a file with the given configuration.
pub fn load_path(path: impl AsRef<Path>, cfg: &Config) -> Result<Recording, LoadError> {
    Importer::new(cfg.clone()).load_path(path, None)
}

/// Load an in-memory recording with the given configuration.
pub fn load_str(text: &str, cfg: &Config) -> Result<Recording, LoadError> {
    Importer::new(cfg.clone()).load_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::GeoPoint;

    const SMALL: &str = "FileType=text/acmi/tacview\nFileVersion=2.1\n#0\n1,T=1|2|3\n#1\n1,T=1.001|2|3\n";

    #[test]
    fn load_str_builds_recording() {
        let rec = load_str(SMALL, &Config::default()).unwrap();
        assert_eq!(rec.registry().len(), 1);
        assert_eq!(rec.origin(), Some(GeoPoint::new(1.0, 2.0, 3.0)));
        assert_eq!(rec.end(), 1.0);
    }

    #[test]
    fn missing_file_is_open_error() {
        let err = Importer::default()
            .load_path("/definitely/not/here.acmi", None)
            .unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
    }

    #[test]
    fn cancelled_flag_aborts() {
        let flag = AtomicBool::new(true);
        let err = Importer::default()
            .load_reader(Cursor::new(SMALL.as_bytes()), Some(&flag))
            .unwrap_err();
        assert!(matches!(err, LoadError::Cancelled));
    }

    #[test]
    fn read_error_is_fatal() {
        let lines = vec![
            Ok("FileType=text/acmi/tacview".to_string()),
            Ok("FileVersion=2.1".to_string()),
            Err(io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8")),
            Ok("#0".to_string()),
        ];
        let err = Importer::default().load_lines(lines.into_iter(), None).unwrap_err();
        match err {
            LoadError::Read { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
