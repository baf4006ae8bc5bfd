//! Compression method abstraction: a push-style streaming transform (§4.5) plus a registry
//! mapping numeric method to processor, in both compress (write) and decompress (read)
//! directions.
//!
//! The teacher crate wraps `flate2`'s `Read`/`Write` adapters (`DeflateEncoder`/`DeflateDecoder`).
//! Those don't fit the spec's push/pull contract — in particular the "empty output does not
//! mean EOF" invariant (§4.3, §8 property 6) needs explicit control over when the underlying
//! deflate stream is flushed versus finished, which the `Read`/`Write` wrappers paper over. This
//! module instead drives `flate2`'s lower-level `Compress`/`Decompress` state machines directly,
//! still the same crate and dependency the teacher already carries.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use std::collections::VecDeque;

use crate::constants::{METHOD_DEFLATE, METHOD_STORE};
use crate::error::{FluxZipError, Result};

/// A push-style streaming transform.
///
/// Contract (§4.5, §4.3): `push` feeds input incrementally; `finish` signals end of input;
/// `pull` drains whatever output has been produced so far and reports whether the processor is
/// completely done (no more output will ever be produced). An empty `pull` result with
/// `done == false` means "needs more input", not end-of-stream.
pub trait DataProcessor {
    /// Feed a chunk of input.
    fn push(&mut self, input: &[u8]) -> Result<()>;
    /// Signal that no more input will be pushed.
    fn finish(&mut self) -> Result<()>;
    /// Drain currently available output. `done` is true only once all output has been
    /// delivered and `finish` has been called.
    fn pull(&mut self) -> Result<(Vec<u8>, bool)>;
}

/// Store: identity passthrough.
#[derive(Default)]
pub struct StoreProcessor {
    queue: VecDeque<u8>,
    finished: bool,
}

impl DataProcessor for StoreProcessor {
    fn push(&mut self, input: &[u8]) -> Result<()> {
        self.queue.extend(input.iter().copied());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn pull(&mut self) -> Result<(Vec<u8>, bool)> {
        let out: Vec<u8> = self.queue.drain(..).collect();
        let done = self.finished && self.queue.is_empty();
        Ok((out, done))
    }
}

const PROCESSOR_BUF: usize = 32 * 1024;

/// Raw-DEFLATE compressor driving `flate2::Compress` directly.
pub struct DeflateCompressProcessor {
    inner: Compress,
    pending_input: VecDeque<u8>,
    finished_input: bool,
    exhausted: bool,
}

impl DeflateCompressProcessor {
    pub fn new(level: Compression) -> Self {
        Self {
            inner: Compress::new(level, false),
            pending_input: VecDeque::new(),
            finished_input: false,
            exhausted: false,
        }
    }
}

impl DataProcessor for DeflateCompressProcessor {
    fn push(&mut self, input: &[u8]) -> Result<()> {
        self.pending_input.extend(input.iter().copied());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished_input = true;
        Ok(())
    }

    fn pull(&mut self) -> Result<(Vec<u8>, bool)> {
        if self.exhausted {
            return Ok((Vec::new(), true));
        }
        let (input_contig, _) = self.pending_input.as_slices();
        let input_owned;
        let input: &[u8] = if self.pending_input.is_contiguous() {
            input_contig
        } else {
            input_owned = self.pending_input.iter().copied().collect::<Vec<u8>>();
            &input_owned
        };

        let mut out = vec![0u8; PROCESSOR_BUF];
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let flush = if self.finished_input {
            FlushCompress::Finish
        } else {
            FlushCompress::None
        };
        let status = self
            .inner
            .compress(input, &mut out, flush)
            .map_err(|e| FluxZipError::BackendError(e.to_string()))?;
        let consumed = (self.inner.total_in() - before_in) as usize;
        let produced = (self.inner.total_out() - before_out) as usize;
        for _ in 0..consumed {
            self.pending_input.pop_front();
        }
        out.truncate(produced);

        let done = matches!(status, Status::StreamEnd);
        if done {
            self.exhausted = true;
        }
        Ok((out, done))
    }
}

/// Raw-DEFLATE decompressor driving `flate2::Decompress` directly.
pub struct DeflateDecompressProcessor {
    inner: Decompress,
    pending_input: VecDeque<u8>,
    finished_input: bool,
    exhausted: bool,
}

impl DeflateDecompressProcessor {
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(false),
            pending_input: VecDeque::new(),
            finished_input: false,
            exhausted: false,
        }
    }
}

impl Default for DeflateDecompressProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProcessor for DeflateDecompressProcessor {
    fn push(&mut self, input: &[u8]) -> Result<()> {
        self.pending_input.extend(input.iter().copied());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished_input = true;
        Ok(())
    }

    fn pull(&mut self) -> Result<(Vec<u8>, bool)> {
        if self.exhausted {
            return Ok((Vec::new(), true));
        }
        let input_owned: Vec<u8>;
        let input: &[u8] = if self.pending_input.is_contiguous() {
            self.pending_input.as_slices().0
        } else {
            input_owned = self.pending_input.iter().copied().collect();
            &input_owned
        };

        let mut out = vec![0u8; PROCESSOR_BUF];
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let flush = if self.finished_input {
            FlushDecompress::Finish
        } else {
            FlushDecompress::None
        };
        let status = self
            .inner
            .decompress(input, &mut out, flush)
            .map_err(|e| FluxZipError::BackendError(e.to_string()))?;
        let consumed = (self.inner.total_in() - before_in) as usize;
        let produced = (self.inner.total_out() - before_out) as usize;
        for _ in 0..consumed {
            self.pending_input.pop_front();
        }
        out.truncate(produced);

        let done = matches!(status, Status::StreamEnd);
        if done {
            self.exhausted = true;
        }
        Ok((out, done))
    }
}

/// Maps numeric compression method to a processor constructor, one registry per direction.
pub struct CompressionRegistry {
    #[allow(clippy::type_complexity)]
    decoders: std::collections::HashMap<u16, Box<dyn Fn() -> Box<dyn DataProcessor>>>,
    #[allow(clippy::type_complexity)]
    encoders: std::collections::HashMap<u16, Box<dyn Fn(Compression) -> Box<dyn DataProcessor>>>,
}

impl CompressionRegistry {
    /// Default registry: Store and Deflate in both directions, per §1/§4.5.
    pub fn with_defaults() -> Self {
        let mut reg = Self {
            decoders: std::collections::HashMap::new(),
            encoders: std::collections::HashMap::new(),
        };
        reg.register_decoder(METHOD_STORE, || Box::new(StoreProcessor::default()));
        reg.register_decoder(METHOD_DEFLATE, || {
            Box::new(DeflateDecompressProcessor::new())
        });
        reg.register_encoder(METHOD_STORE, |_level| Box::new(StoreProcessor::default()));
        reg.register_encoder(METHOD_DEFLATE, |level| {
            Box::new(DeflateCompressProcessor::new(level))
        });
        reg
    }

    pub fn register_decoder(
        &mut self,
        method: u16,
        factory: impl Fn() -> Box<dyn DataProcessor> + 'static,
    ) {
        self.decoders.insert(method, Box::new(factory));
    }

    pub fn register_encoder(
        &mut self,
        method: u16,
        factory: impl Fn(Compression) -> Box<dyn DataProcessor> + 'static,
    ) {
        self.encoders.insert(method, Box::new(factory));
    }

    pub fn decoder_for(&self, method: u16) -> Result<Box<dyn DataProcessor>> {
        self.decoders
            .get(&method)
            .map(|f| f())
            .ok_or(FluxZipError::UnsupportedMethod(method))
    }

    pub fn encoder_for(&self, method: u16, level: Compression) -> Result<Box<dyn DataProcessor>> {
        self.encoders
            .get(&method)
            .map(|f| f(level))
            .ok_or(FluxZipError::UnsupportedMethod(method))
    }
}

impl Default for CompressionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_round_trip(data: &[u8]) -> Vec<u8> {
        let registry = CompressionRegistry::with_defaults();
        let mut enc = registry
            .encoder_for(METHOD_DEFLATE, Compression::default())
            .unwrap();
        let mut compressed = Vec::new();
        enc.push(data).unwrap();
        enc.finish().unwrap();
        loop {
            let (chunk, done) = enc.pull().unwrap();
            compressed.extend(chunk);
            if done {
                break;
            }
        }

        let mut dec = registry.decoder_for(METHOD_DEFLATE).unwrap();
        let mut out = Vec::new();
        dec.push(&compressed).unwrap();
        dec.finish().unwrap();
        loop {
            let (chunk, done) = dec.pull().unwrap();
            out.extend(chunk);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn deflate_round_trips_small_buffer() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        assert_eq!(run_round_trip(&data), data);
    }

    #[test]
    fn store_is_identity() {
        let registry = CompressionRegistry::with_defaults();
        let mut enc = registry
            .encoder_for(METHOD_STORE, Compression::default())
            .unwrap();
        enc.push(b"raw bytes").unwrap();
        enc.finish().unwrap();
        let mut out = Vec::new();
        loop {
            let (chunk, done) = enc.pull().unwrap();
            out.extend(chunk);
            if done {
                break;
            }
        }
        assert_eq!(out, b"raw bytes");
    }

    #[test]
    fn unknown_method_is_rejected() {
        let registry = CompressionRegistry::with_defaults();
        assert!(matches!(
            registry.decoder_for(99),
            Err(FluxZipError::UnsupportedMethod(99))
        ));
    }
}
