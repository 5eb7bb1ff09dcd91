use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// An uploaded file from a `multipart/form-data` body.
///
/// The payload is spooled to an anonymous temporary file and the stream is
/// positioned at its first byte. The stream is released by the request cleanup
/// phase through [`MultipartFile::close`]; closing twice is a no-op.
#[derive(Debug)]
pub struct MultipartFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub file_length: u64,
    stream: Option<File>,
}

impl MultipartFile {
    /// Spool `payload` to a temporary file and return a descriptor positioned at its start.
    pub fn spool(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<String>,
        payload: &[u8],
    ) -> io::Result<Self> {
        let mut file = tempfile::tempfile()?;
        file.write_all(payload)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            content_type,
            file_length: payload.len() as u64,
            stream: Some(file),
        })
    }

    /// Readable stream over the payload, `None` once closed.
    pub fn input_stream(&mut self) -> Option<&mut File> {
        self.stream.as_mut()
    }

    /// Read the whole payload, leaving the stream rewound to the start.
    pub fn bytes(&mut self) -> io::Result<Vec<u8>> {
        let file = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "upload stream is closed"))?;
        file.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::with_capacity(self.file_length as usize);
        file.read_to_end(&mut buf)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(buf)
    }

    /// Release the stream. Returns `false` when it was already closed.
    pub fn close(&mut self) -> bool {
        self.stream.take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}
