use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::Result;

/// Unified input reader over a file or a stdin pipe.
pub struct InputReader {
    reader: Box<dyn Read>,
    is_pipe: bool,
}

impl InputReader {
    /// Opens the given path, or stdin when the path is "-".
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let is_pipe = input_path.as_ref().to_string_lossy() == "-";

        let reader: Box<dyn Read> = if is_pipe {
            Box::new(io::stdin().lock())
        } else {
            Box::new(BufReader::new(File::open(input_path)?))
        };

        Ok(Self { reader, is_pipe })
    }

    /// Reads one chunk into `buffer`; 0 indicates EOF.
    pub fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.reader.read(buffer)?)
    }

    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }
}
